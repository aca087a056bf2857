// Snapshot module - Copy-on-write publication of sequencing state
// to the audio thread, with client-driven reclaim

pub mod publisher;
pub mod state;

pub use publisher::{
    Generation, Snapshot, SnapshotPublisher, SnapshotReader, SnapshotStats, snapshot_channel,
};
pub use state::SequencerState;
