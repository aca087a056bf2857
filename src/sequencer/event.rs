// Sequencer events - Closed set of payloads a sequence can hold
// One variant per track kind, so every consumer matches exhaustively

use crate::midi::event::MidiMessage;
use crate::sequencer::track::TrackKind;

/// MIDI controller number for "All Notes Off"
pub const ALL_NOTES_OFF_CC: u8 = 123;

/// MIDI event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventType {
    On,
    Off,
    Cc,
    PitchBend,
}

/// A MIDI event stored in a MIDI track sequence
///
/// `value` is the note number for On/Off, the controller for Cc and the
/// 14-bit bend amount for PitchBend. `velocity_or_cc_value` is the velocity for
/// On/Off and the controller value for Cc; PitchBend ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub kind: MidiEventType,
    pub value: u16,
    pub velocity_or_cc_value: u8,
}

impl MidiEvent {
    pub fn new(kind: MidiEventType, value: u16, velocity_or_cc_value: u8) -> Self {
        Self {
            kind,
            value,
            velocity_or_cc_value,
        }
    }

    pub fn note_on(note: u8, velocity: u8) -> Self {
        Self::new(MidiEventType::On, note as u16, velocity)
    }

    pub fn note_off(note: u8, velocity: u8) -> Self {
        Self::new(MidiEventType::Off, note as u16, velocity)
    }

    pub fn cc(controller: u8, value: u8) -> Self {
        Self::new(MidiEventType::Cc, controller as u16, value)
    }

    /// Pitch bend, 0..=16383 with 8192 as center
    pub fn pitch_bend(value: u16) -> Self {
        Self::new(MidiEventType::PitchBend, value.min(0x3FFF), 0)
    }

    pub fn all_notes_off() -> Self {
        Self::cc(ALL_NOTES_OFF_CC, 0)
    }

    pub fn is_all_notes_off(&self) -> bool {
        self.kind == MidiEventType::Cc && self.value == ALL_NOTES_OFF_CC as u16
    }

    /// Convert to a wire-level message on the given channel
    pub fn to_message(&self, channel: u8) -> MidiMessage {
        let channel = channel & 0x0F;
        let data1 = (self.value & 0x7F) as u8;
        let data2 = self.velocity_or_cc_value & 0x7F;

        match self.kind {
            MidiEventType::On => MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            MidiEventType::Off => MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            },
            MidiEventType::Cc => MidiMessage::ControlChange {
                channel,
                controller: data1,
                value: data2,
            },
            MidiEventType::PitchBend => MidiMessage::PitchBend {
                channel,
                value: self.value & 0x3FFF,
            },
        }
    }
}

/// CV event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvEventType {
    /// Move from `value` towards `target` until the next event on the track
    Interval,
    /// Jump to `value` once; `target` is ignored
    OneShot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvEvent {
    pub kind: CvEventType,
    pub target: f32,
    pub value: f32,
}

impl CvEvent {
    pub fn new(kind: CvEventType, target: f32, value: f32) -> Self {
        Self {
            kind,
            target,
            value,
        }
    }

    pub fn interval(value: f32, target: f32) -> Self {
        Self::new(CvEventType::Interval, target, value)
    }

    pub fn one_shot(value: f32) -> Self {
        Self::new(CvEventType::OneShot, value, value)
    }
}

/// Control event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEventType {
    /// Replace the running tempo with `value` ticks per second
    GlobalTempo,
    /// Run the next tick at `value` ticks per second, then revert
    GlobalTempoOneShot,
    /// Run at the global tempo multiplied by `value`
    RelativeTempo,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    pub kind: ControlEventType,
    pub value: f64,
    pub aux: f64,
}

impl ControlEvent {
    pub fn new(kind: ControlEventType, value: f64, aux: f64) -> Self {
        Self { kind, value, aux }
    }

    pub fn global_tempo(ticks_per_second: f64) -> Self {
        Self::new(ControlEventType::GlobalTempo, ticks_per_second, 0.0)
    }

    pub fn global_tempo_one_shot(ticks_per_second: f64) -> Self {
        Self::new(ControlEventType::GlobalTempoOneShot, ticks_per_second, 0.0)
    }

    pub fn relative_tempo(factor: f64) -> Self {
        Self::new(ControlEventType::RelativeTempo, factor, 0.0)
    }
}

/// Any event a sequence can hold, tagged by track kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Midi(MidiEvent),
    Cv(CvEvent),
    Control(ControlEvent),
}

impl Event {
    /// The track kind this event belongs on
    pub fn kind(&self) -> TrackKind {
        match self {
            Event::Midi(_) => TrackKind::Midi,
            Event::Cv(_) => TrackKind::Cv,
            Event::Control(_) => TrackKind::Control,
        }
    }
}

impl From<MidiEvent> for Event {
    fn from(event: MidiEvent) -> Self {
        Event::Midi(event)
    }
}

impl From<CvEvent> for Event {
    fn from(event: CvEvent) -> Self {
        Event::Cv(event)
    }
}

impl From<ControlEvent> for Event {
    fn from(event: ControlEvent) -> Self {
        Event::Control(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::from(MidiEvent::note_on(60, 100)).kind(), TrackKind::Midi);
        assert_eq!(Event::from(CvEvent::one_shot(0.5)).kind(), TrackKind::Cv);
        assert_eq!(
            Event::from(ControlEvent::global_tempo(8.0)).kind(),
            TrackKind::Control
        );
    }

    #[test]
    fn test_all_notes_off() {
        let event = MidiEvent::all_notes_off();
        assert!(event.is_all_notes_off());
        assert!(!MidiEvent::cc(7, 0).is_all_notes_off());
        assert_eq!(
            event.to_message(0).to_bytes(),
            [0xB0, ALL_NOTES_OFF_CC, 0x00]
        );
    }

    #[test]
    fn test_midi_event_to_message() {
        let on = MidiEvent::note_on(60, 100).to_message(2);
        assert_eq!(on.to_bytes(), [0x92, 60, 100]);

        // Out-of-range data bytes are masked to 7 bits
        let off = MidiEvent::new(MidiEventType::Off, 200, 255).to_message(0);
        assert_eq!(off.to_bytes(), [0x80, 200 & 0x7F, 0x7F]);

        let bend = MidiEvent::pitch_bend(8192).to_message(0);
        assert_eq!(bend.to_bytes(), [0xE0, 0x00, 0x40]);
    }

    #[test]
    fn test_pitch_bend_clamped() {
        assert_eq!(MidiEvent::pitch_bend(u16::MAX).value, 0x3FFF);
    }
}
