// Sequencer module
// Tracks, patterns, events, transport and the real-time scheduler

pub mod event;
pub mod pattern;
pub mod scheduler;
pub mod store;
pub mod timeline;
pub mod track;
pub mod transport;

pub use event::{
    ControlEvent, ControlEventType, CvEvent, CvEventType, Event, MidiEvent, MidiEventType,
};
pub use pattern::{Pattern, Sequence};
pub use scheduler::{BlockContext, BlockReport, Scheduler, SchedulerConfig};
pub use store::{PatternSource, SequenceStore, StoreOptions, TrackIndexPolicy};
pub use timeline::Tempo;
pub use track::{Track, TrackId, TrackKind};
pub use transport::{
    AbsoluteLoop, EndOfSongPolicy, LoopRange, LoopRangeSpec, TickStep, TransportPosition, TransportSettings,
    TransportSource, TransportState,
};
