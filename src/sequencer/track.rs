// Track - A named, kind-typed output channel
// Patterns carry one sequence per track, in track order

use std::fmt;

/// Unique identifier for tracks
pub type TrackId = u64;

/// What a track emits. Fixed when the track is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Midi,
    Cv,
    Control,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackKind::Midi => "midi",
            TrackKind::Cv => "cv",
            TrackKind::Control => "control",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    id: TrackId,
    name: String,
    kind: TrackKind,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_creation() {
        let track = Track::new(7, "bd", TrackKind::Midi);
        assert_eq!(track.id(), 7);
        assert_eq!(track.name(), "bd");
        assert_eq!(track.kind(), TrackKind::Midi);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TrackKind::Cv.to_string(), "cv");
        assert_eq!(TrackKind::Control.to_string(), "control");
    }
}
