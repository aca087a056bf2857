// Tickseq - Real-time pattern sequencing core
// Library exports for the demo, tests and benchmarks

pub mod audio;
pub mod config;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use audio::{Engine, EngineProcessor, EngineStatus};
pub use config::EngineConfig;
pub use error::{Result, SequencerError};
pub use messaging::{
    EventSink, NullSink, OutputReceiver, RecordingSink, RingBufferSink, TimedControlEvent,
    TimedCvEvent, TimedMidiEvent, create_output_channel,
};
pub use midi::MidiMessage;
pub use sequencer::{
    BlockContext, BlockReport, ControlEvent, ControlEventType, CvEvent, CvEventType,
    EndOfSongPolicy, Event, LoopRange, LoopRangeSpec, MidiEvent, MidiEventType, Pattern,
    PatternSource, Tempo, Track, TrackId, TrackIndexPolicy, TrackKind, TransportPosition,
    TransportSource, TransportState,
};
pub use snapshot::{Generation, SnapshotStats};
