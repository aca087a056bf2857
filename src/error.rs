// Error types - Control-thread failures of the sequencing core
// The audio thread never produces these: it degrades to emitting nothing.

use thiserror::Error;

use crate::sequencer::track::TrackKind;

/// Result type for control-thread operations
pub type Result<T> = std::result::Result<T, SequencerError>;

/// Errors raised synchronously by the control-thread API
///
/// Every operation validates before applying, so an error always leaves the
/// working copy exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencerError {
    #[error("Track name already in use: {0}")]
    DuplicateName(String),

    #[error("Index {index} is invalid (current count: {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Tick {tick} is out of range (pattern length: {length})")]
    OutOfRange { tick: u32, length: u32 },

    #[error("Pattern shape {found:?} does not match track set {expected:?}")]
    ShapeMismatch {
        expected: Vec<TrackKind>,
        found: Vec<TrackKind>,
    },

    #[error("Event kind {found:?} does not match track kind {expected:?}")]
    KindMismatch { expected: TrackKind, found: TrackKind },

    #[error("Tempo must be a positive finite number, got {0}")]
    InvalidTempo(f64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Loop range end must lie after its start")]
    InvalidLoopRange,

    #[error("Pattern length must be between 1 and {} ticks", crate::sequencer::Pattern::MAX_LENGTH)]
    InvalidLength,

    #[error("Audio processor is gone")]
    Disconnected,

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SequencerError::InvalidIndex { index: 3, len: 1 };
        assert_eq!(err.to_string(), "Index 3 is invalid (current count: 1)");

        let err = SequencerError::KindMismatch {
            expected: TrackKind::Midi,
            found: TrackKind::Cv,
        };
        assert!(err.to_string().contains("Midi"));
        assert!(err.to_string().contains("Cv"));
    }
}
