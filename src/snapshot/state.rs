// Sequencer state - What one published snapshot contains

use std::sync::Arc;

use crate::sequencer::pattern::Pattern;
use crate::sequencer::store::SequenceStore;
use crate::sequencer::track::Track;
use crate::sequencer::transport::TransportSettings;

/// Immutable store + transport configuration read by the audio thread
///
/// Built from shared handles of the control thread's working copy, so
/// publishing is a handful of reference-count increments. Patterns the
/// control thread edits afterwards are cloned on write, never changed in place.
#[derive(Debug, Clone, Default)]
pub struct SequencerState {
    tracks: Arc<Vec<Track>>,
    patterns: Vec<Arc<Pattern>>,
    transport: TransportSettings,
}

impl SequencerState {
    pub fn new(tracks: Arc<Vec<Track>>, patterns: Vec<Arc<Pattern>>, transport: TransportSettings) -> Self {
        Self {
            tracks,
            patterns,
            transport,
        }
    }

    /// Share the current contents of `store`
    pub fn from_store(store: &SequenceStore, transport: TransportSettings) -> Self {
        let (tracks, patterns) = store.shared_parts();
        Self::new(tracks, patterns, transport)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn patterns(&self) -> &[Arc<Pattern>] {
        &self.patterns
    }

    pub fn pattern(&self, index: u32) -> Option<&Pattern> {
        self.patterns.get(index as usize).map(Arc::as_ref)
    }

    pub fn pattern_length(&self, index: u32) -> Option<u32> {
        self.pattern(index).map(Pattern::length)
    }

    pub fn pattern_count(&self) -> u32 {
        self.patterns.len() as u32
    }

    pub fn transport(&self) -> &TransportSettings {
        &self.transport
    }

    /// Every pattern has exactly one sequence per track with the track's kind
    pub fn is_consistent(&self) -> bool {
        self.patterns.iter().all(|pattern| {
            pattern.sequences().len() == self.tracks.len()
                && pattern
                    .sequences()
                    .iter()
                    .zip(self.tracks.iter())
                    .all(|(sequence, track)| {
                        sequence.kind() == track.kind() && sequence.len() == pattern.length() as usize
                    })
        })
    }
}
