// Pattern - Fixed-length container of per-track event sequences
// A pattern is like a "clip" spanning every track at once

use crate::error::{Result, SequencerError};
use crate::sequencer::event::{ControlEvent, CvEvent, Event, MidiEvent};
use crate::sequencer::track::TrackKind;

/// Events of one track within one pattern, indexed by tick
///
/// Storage is dense: one slot per tick, so the audio thread looks an event up
/// with a bounds-checked index and never walks a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Sequence {
    Midi(Vec<Option<MidiEvent>>),
    Cv(Vec<Option<CvEvent>>),
    Control(Vec<Option<ControlEvent>>),
}

impl Sequence {
    /// Create an empty sequence of the given kind and length
    pub(crate) fn empty(kind: TrackKind, length: u32) -> Self {
        let length = length as usize;
        match kind {
            TrackKind::Midi => Sequence::Midi(vec![None; length]),
            TrackKind::Cv => Sequence::Cv(vec![None; length]),
            TrackKind::Control => Sequence::Control(vec![None; length]),
        }
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            Sequence::Midi(_) => TrackKind::Midi,
            Sequence::Cv(_) => TrackKind::Cv,
            Sequence::Control(_) => TrackKind::Control,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Sequence::Midi(events) => events.len(),
            Sequence::Cv(events) => events.len(),
            Sequence::Control(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    /// Event at `tick`, if any. Out-of-range ticks yield `None`.
    pub fn get(&self, tick: u32) -> Option<Event> {
        let tick = tick as usize;
        match self {
            Sequence::Midi(events) => events.get(tick).copied().flatten().map(Event::Midi),
            Sequence::Cv(events) => events.get(tick).copied().flatten().map(Event::Cv),
            Sequence::Control(events) => {
                events.get(tick).copied().flatten().map(Event::Control)
            }
        }
    }

    /// Store `event` at `tick`, replacing whatever was there
    pub fn set(&mut self, tick: u32, event: Event) -> Result<Option<Event>> {
        let length = self.len() as u32;
        if tick >= length {
            return Err(SequencerError::OutOfRange { tick, length });
        }

        let slot = tick as usize;
        let previous = self.get(tick);
        match (self, event) {
            (Sequence::Midi(events), Event::Midi(e)) => events[slot] = Some(e),
            (Sequence::Cv(events), Event::Cv(e)) => events[slot] = Some(e),
            (Sequence::Control(events), Event::Control(e)) => events[slot] = Some(e),
            (sequence, event) => {
                return Err(SequencerError::KindMismatch {
                    expected: sequence.kind(),
                    found: event.kind(),
                });
            }
        }
        Ok(previous)
    }

    /// Remove the event at `tick`
    pub fn clear(&mut self, tick: u32) -> Result<Option<Event>> {
        let length = self.len() as u32;
        if tick >= length {
            return Err(SequencerError::OutOfRange { tick, length });
        }

        let previous = self.get(tick);
        let slot = tick as usize;
        match self {
            Sequence::Midi(events) => events[slot] = None,
            Sequence::Cv(events) => events[slot] = None,
            Sequence::Control(events) => events[slot] = None,
        }
        Ok(previous)
    }

    /// Number of ticks holding an event
    pub fn event_count(&self) -> usize {
        match self {
            Sequence::Midi(events) => events.iter().flatten().count(),
            Sequence::Cv(events) => events.iter().flatten().count(),
            Sequence::Control(events) => events.iter().flatten().count(),
        }
    }
}

/// A pattern holding one sequence per track
///
/// Patterns are built by `SequenceStore::create_pattern`, which stamps them
/// with the track set they were shaped for. Inserting a pattern after the
/// track set changed is rejected instead of silently misaligning sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    length: u32,
    sequences: Vec<Sequence>,
    /// Track-set generation the pattern was created against (None if built by hand)
    track_generation: Option<u64>,
}

impl Pattern {
    /// Length used when callers don't specify one
    pub const DEFAULT_LENGTH: u32 = 128;

    /// Longest pattern accepted. Storage is one slot per tick and track.
    pub const MAX_LENGTH: u32 = 1 << 20;

    /// Build a pattern for an explicit list of track kinds
    pub fn with_kinds(length: u32, kinds: &[TrackKind]) -> Result<Self> {
        if length == 0 || length > Self::MAX_LENGTH {
            return Err(SequencerError::InvalidLength);
        }

        Ok(Self {
            length,
            sequences: kinds
                .iter()
                .map(|&kind| Sequence::empty(kind, length))
                .collect(),
            track_generation: None,
        })
    }

    pub(crate) fn for_track_set(length: u32, kinds: &[TrackKind], generation: u64) -> Result<Self> {
        let mut pattern = Self::with_kinds(length, kinds)?;
        pattern.track_generation = Some(generation);
        Ok(pattern)
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn sequence(&self, track: usize) -> Option<&Sequence> {
        self.sequences.get(track)
    }

    pub fn track_generation(&self) -> Option<u64> {
        self.track_generation
    }

    /// Track kinds in sequence order
    pub fn shape(&self) -> Vec<TrackKind> {
        self.sequences.iter().map(Sequence::kind).collect()
    }

    /// Set an event on the sequence for `track`
    pub fn set_event(&mut self, track: usize, tick: u32, event: Event) -> Result<Option<Event>> {
        let len = self.sequences.len();
        let sequence = self
            .sequences
            .get_mut(track)
            .ok_or(SequencerError::InvalidIndex { index: track, len })?;
        sequence.set(tick, event)
    }

    pub fn set_midi_event(&mut self, track: usize, tick: u32, event: MidiEvent) -> Result<Option<Event>> {
        self.set_event(track, tick, Event::Midi(event))
    }

    pub fn set_cv_event(&mut self, track: usize, tick: u32, event: CvEvent) -> Result<Option<Event>> {
        self.set_event(track, tick, Event::Cv(event))
    }

    pub fn set_control_event(
        &mut self,
        track: usize,
        tick: u32,
        event: ControlEvent,
    ) -> Result<Option<Event>> {
        self.set_event(track, tick, Event::Control(event))
    }

    /// Remove the event on `track` at `tick`
    pub fn clear_event(&mut self, track: usize, tick: u32) -> Result<Option<Event>> {
        let len = self.sequences.len();
        let sequence = self
            .sequences
            .get_mut(track)
            .ok_or(SequencerError::InvalidIndex { index: track, len })?;
        sequence.clear(tick)
    }

    /// Event on `track` at `tick`, if any
    pub fn event(&self, track: usize, tick: u32) -> Option<Event> {
        self.sequences.get(track).and_then(|s| s.get(tick))
    }

    /// Total number of events across all sequences
    pub fn event_count(&self) -> usize {
        self.sequences.iter().map(Sequence::event_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    pub(crate) fn insert_sequence(&mut self, index: usize, kind: TrackKind) {
        self.sequences.insert(index, Sequence::empty(kind, self.length));
    }

    pub(crate) fn remove_sequence(&mut self, index: usize) {
        self.sequences.remove(index);
    }

    pub(crate) fn stamp(&mut self, generation: u64) {
        self.track_generation = Some(generation);
    }
}
