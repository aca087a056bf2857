// MIDI wire messages - 3-byte channel messages as written to a MIDI port

/// A raw MIDI channel message
///
/// This is what the audio-I/O layer writes into its port buffer. The
/// sequencer stores `sequencer::event::MidiEvent` and converts on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Every channel message we emit is three bytes long
    pub const SIZE: usize = 3;

    /// Render the message into its wire representation
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            MidiMessage::PitchBend { channel, value } => [
                0xE0 | (channel & 0x0F),
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ],
        }
    }

    /// Parse a raw MIDI message
    ///
    /// Note On with velocity 0 is reported as Note Off, as MIDI running-status
    /// senders expect.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }

        let status = bytes[0];
        let channel = status & 0x0F;

        match status & 0xF0 {
            0x90 => {
                let note = bytes[1];
                let velocity = bytes[2];
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: bytes[1],
                velocity: bytes[2],
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            }),
            0xE0 => {
                let lsb = (bytes[1] & 0x7F) as u16;
                let msb = (bytes[2] & 0x7F) as u16;
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }
}
