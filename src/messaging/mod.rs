// Messaging module - Lock-free output of scheduled events

pub mod channels;
pub mod output;

pub use channels::{OutputReceiver, RingBufferSink, create_output_channel};
pub use output::{EventSink, NullSink, RecordingSink, TimedControlEvent, TimedCvEvent, TimedMidiEvent};
