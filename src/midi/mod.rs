// MIDI module - Wire format for emitted MIDI events

pub mod event;

pub use event::MidiMessage;
