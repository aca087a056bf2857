// Sequence store - Tracks and patterns owned by the control thread
// Patterns and the track list are shared copy-on-write with published snapshots

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::sequencer::event::{ControlEvent, CvEvent, Event, MidiEvent};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::track::{Track, TrackId, TrackKind};

/// How `insert_track` treats the requested index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackIndexPolicy {
    /// The index must be the first free slot; occupied slots and gaps are rejected
    #[default]
    Reject,
    /// Any index up to the track count; later tracks shift up by one
    Shift,
}

/// Construction-time options of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub unique_track_names: bool,
    pub track_index_policy: TrackIndexPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            unique_track_names: true,
            track_index_policy: TrackIndexPolicy::Reject,
        }
    }
}

/// Either a prebuilt pattern or a length to build an empty one from
#[derive(Debug, Clone, PartialEq)]
pub enum PatternSource {
    Built(Pattern),
    Length(u32),
}

impl From<Pattern> for PatternSource {
    fn from(pattern: Pattern) -> Self {
        PatternSource::Built(pattern)
    }
}

/// An empty pattern of `Pattern::DEFAULT_LENGTH` ticks
impl Default for PatternSource {
    fn default() -> Self {
        PatternSource::Length(Pattern::DEFAULT_LENGTH)
    }
}

impl From<u32> for PatternSource {
    fn from(length: u32) -> Self {
        PatternSource::Length(length)
    }
}

/// Working copy of all sequencing data
///
/// Only the control thread touches this. Mutations go through `Arc::make_mut`,
/// so patterns still referenced by a published snapshot are cloned instead of
/// being modified under the audio thread.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    options: StoreOptions,
    tracks: Arc<Vec<Track>>,
    patterns: Vec<Arc<Pattern>>,
    next_track_id: TrackId,
    /// Bumped on every change to the track set
    track_generation: u64,
    dirty: bool,
}

impl SequenceStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            tracks: Arc::new(Vec::new()),
            patterns: Vec::new(),
            next_track_id: 1,
            track_generation: 0,
            dirty: false,
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    // ---- Tracks ----

    /// Insert a track at `index`
    ///
    /// Every existing pattern gains an empty sequence for the new track, and
    /// patterns created before this call can no longer be inserted.
    pub fn insert_track(&mut self, name: &str, kind: TrackKind, index: usize) -> Result<TrackId> {
        if self.options.unique_track_names && self.track_index(name).is_some() {
            return Err(SequencerError::DuplicateName(name.to_string()));
        }

        let len = self.tracks.len();
        let valid = match self.options.track_index_policy {
            TrackIndexPolicy::Reject => index == len,
            TrackIndexPolicy::Shift => index <= len,
        };
        if !valid {
            return Err(SequencerError::InvalidIndex { index, len });
        }

        let id = self.next_track_id;
        self.next_track_id += 1;

        Arc::make_mut(&mut self.tracks).insert(index, Track::new(id, name, kind));
        for pattern in &mut self.patterns {
            Arc::make_mut(pattern).insert_sequence(index, kind);
        }
        self.bump_track_generation();
        Ok(id)
    }

    pub fn insert_midi_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.insert_track(name, TrackKind::Midi, index)
    }

    pub fn insert_cv_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.insert_track(name, TrackKind::Cv, index)
    }

    pub fn insert_control_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.insert_track(name, TrackKind::Control, index)
    }

    /// Remove the track at `index` together with its sequences
    pub fn remove_track(&mut self, index: usize) -> Result<Track> {
        self.check_track_index(index)?;

        let track = Arc::make_mut(&mut self.tracks).remove(index);
        for pattern in &mut self.patterns {
            Arc::make_mut(pattern).remove_sequence(index);
        }
        self.bump_track_generation();
        Ok(track)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Index of the first track called `name`
    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name() == name)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track kinds in track order
    pub fn kinds(&self) -> Vec<TrackKind> {
        self.tracks.iter().map(Track::kind).collect()
    }

    pub fn track_generation(&self) -> u64 {
        self.track_generation
    }

    // ---- Patterns ----

    /// Build an empty pattern shaped for the current track set
    ///
    /// The store is not modified. The track set must stay unchanged until the
    /// pattern is inserted.
    pub fn create_pattern(&self, length: u32) -> Result<Pattern> {
        Pattern::for_track_set(length, &self.kinds(), self.track_generation)
    }

    /// Insert a pattern at `index`, shifting later patterns
    pub fn insert_pattern(&mut self, index: usize, source: impl Into<PatternSource>) -> Result<()> {
        let len = self.patterns.len();
        if index > len {
            return Err(SequencerError::InvalidIndex { index, len });
        }

        let pattern = self.accept_pattern(source.into())?;
        self.patterns.insert(index, Arc::new(pattern));
        self.dirty = true;
        Ok(())
    }

    /// Replace the pattern at `index`
    pub fn set_pattern(&mut self, index: usize, source: impl Into<PatternSource>) -> Result<()> {
        self.check_pattern_index(index)?;

        let pattern = self.accept_pattern(source.into())?;
        self.patterns[index] = Arc::new(pattern);
        self.dirty = true;
        Ok(())
    }

    pub fn remove_pattern(&mut self, index: usize) -> Result<Arc<Pattern>> {
        self.check_pattern_index(index)?;

        let pattern = self.patterns.remove(index);
        self.dirty = true;
        Ok(pattern)
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index).map(Arc::as_ref)
    }

    pub fn patterns(&self) -> &[Arc<Pattern>] {
        &self.patterns
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn pattern_lengths(&self) -> Vec<u32> {
        self.patterns.iter().map(|p| p.length()).collect()
    }

    // ---- Events ----

    /// Set the event on `track` in `pattern` at `tick`, replacing any previous one
    pub fn set_event(&mut self, track: usize, pattern: usize, tick: u32, event: Event) -> Result<Option<Event>> {
        self.check_track_index(track)?;
        self.check_pattern_index(pattern)?;

        let expected = self.tracks[track].kind();
        if event.kind() != expected {
            return Err(SequencerError::KindMismatch {
                expected,
                found: event.kind(),
            });
        }
        self.check_tick_index(pattern, tick)?;

        let previous = Arc::make_mut(&mut self.patterns[pattern]).set_event(track, tick, event)?;
        self.dirty = true;
        Ok(previous)
    }

    pub fn set_midi_event(&mut self, track: usize, pattern: usize, tick: u32, event: MidiEvent) -> Result<Option<Event>> {
        self.set_event(track, pattern, tick, Event::Midi(event))
    }

    pub fn set_cv_event(&mut self, track: usize, pattern: usize, tick: u32, event: CvEvent) -> Result<Option<Event>> {
        self.set_event(track, pattern, tick, Event::Cv(event))
    }

    pub fn set_control_event(
        &mut self,
        track: usize,
        pattern: usize,
        tick: u32,
        event: ControlEvent,
    ) -> Result<Option<Event>> {
        self.set_event(track, pattern, tick, Event::Control(event))
    }

    pub fn clear_event(&mut self, track: usize, pattern: usize, tick: u32) -> Result<Option<Event>> {
        self.check_track_index(track)?;
        self.check_tick_index(pattern, tick)?;

        if self.patterns[pattern].event(track, tick).is_none() {
            return Ok(None);
        }
        let previous = Arc::make_mut(&mut self.patterns[pattern]).clear_event(track, tick)?;
        self.dirty = true;
        Ok(previous)
    }

    pub fn event(&self, track: usize, pattern: usize, tick: u32) -> Option<Event> {
        self.patterns.get(pattern).and_then(|p| p.event(track, tick))
    }

    // ---- Publication bookkeeping ----

    /// True if anything changed since the last commit
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Shared handles for building a snapshot
    pub(crate) fn shared_parts(&self) -> (Arc<Vec<Track>>, Vec<Arc<Pattern>>) {
        (Arc::clone(&self.tracks), self.patterns.clone())
    }

    // ---- Validation ----

    fn accept_pattern(&self, source: PatternSource) -> Result<Pattern> {
        let mut pattern = match source {
            PatternSource::Length(length) => return self.create_pattern(length),
            PatternSource::Built(pattern) => pattern,
        };

        if let Some(generation) = pattern.track_generation() {
            if generation != self.track_generation {
                return Err(SequencerError::InvalidState(format!(
                    "track set changed since the pattern was created (generation {} -> {})",
                    generation, self.track_generation
                )));
            }
        }

        let expected = self.kinds();
        let found = pattern.shape();
        if expected != found {
            return Err(SequencerError::ShapeMismatch { expected, found });
        }

        pattern.stamp(self.track_generation);
        Ok(pattern)
    }

    fn bump_track_generation(&mut self) {
        self.track_generation += 1;
        self.dirty = true;
    }

    fn check_track_index(&self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(SequencerError::InvalidIndex {
                index,
                len: self.tracks.len(),
            });
        }
        Ok(())
    }

    fn check_pattern_index(&self, index: usize) -> Result<()> {
        if index >= self.patterns.len() {
            return Err(SequencerError::InvalidIndex {
                index,
                len: self.patterns.len(),
            });
        }
        Ok(())
    }

    fn check_tick_index(&self, pattern: usize, tick: u32) -> Result<()> {
        self.check_pattern_index(pattern)?;
        let length = self.patterns[pattern].length();
        if tick >= length {
            return Err(SequencerError::OutOfRange { tick, length });
        }
        Ok(())
    }
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}
