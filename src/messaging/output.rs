// Output events - What the scheduler emits for one block

use crate::sequencer::event::{ControlEvent, CvEvent, MidiEvent};

/// MIDI event stamped with its track index and sample offset in the block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMidiEvent {
    pub track: usize,
    pub offset: u32,
    pub event: MidiEvent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedCvEvent {
    pub track: usize,
    pub offset: u32,
    pub event: CvEvent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedControlEvent {
    pub track: usize,
    pub offset: u32,
    pub event: ControlEvent,
}

/// Destination of scheduled events
///
/// Called from the audio thread: implementations must not block or allocate.
/// Returning false means the event was dropped (e.g. a full queue).
pub trait EventSink {
    fn midi(&mut self, event: TimedMidiEvent) -> bool;
    fn cv(&mut self, event: TimedCvEvent) -> bool;
    fn control(&mut self, event: TimedControlEvent) -> bool;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn midi(&mut self, _event: TimedMidiEvent) -> bool {
        true
    }

    fn cv(&mut self, _event: TimedCvEvent) -> bool {
        true
    }

    fn control(&mut self, _event: TimedControlEvent) -> bool {
        true
    }
}

/// Collects events in vectors. Allocates, so meant for tests and offline rendering.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub midi: Vec<TimedMidiEvent>,
    pub cv: Vec<TimedCvEvent>,
    pub control: Vec<TimedControlEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.midi.is_empty() && self.cv.is_empty() && self.control.is_empty()
    }

    pub fn clear(&mut self) {
        self.midi.clear();
        self.cv.clear();
        self.control.clear();
    }
}

impl EventSink for RecordingSink {
    fn midi(&mut self, event: TimedMidiEvent) -> bool {
        self.midi.push(event);
        true
    }

    fn cv(&mut self, event: TimedCvEvent) -> bool {
        self.cv.push(event);
        true
    }

    fn control(&mut self, event: TimedControlEvent) -> bool {
        self.control.push(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::new();
        assert!(sink.is_empty());

        assert!(sink.midi(TimedMidiEvent {
            track: 0,
            offset: 12,
            event: MidiEvent::note_on(60, 100),
        }));
        assert!(sink.cv(TimedCvEvent {
            track: 1,
            offset: 0,
            event: CvEvent::one_shot(0.5),
        }));

        assert_eq!(sink.midi.len(), 1);
        assert_eq!(sink.midi[0].offset, 12);
        assert_eq!(sink.cv.len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
