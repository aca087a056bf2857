// Processor - Audio-thread half of the engine
// Called from the audio callback once per block

use crate::audio::status::EngineStatus;
use crate::messaging::output::EventSink;
use crate::sequencer::scheduler::{BlockContext, BlockReport, Scheduler};
use crate::snapshot::publisher::SnapshotReader;
use crate::snapshot::state::SequencerState;

/// Moved into the audio callback. Reads the current snapshot, runs the
/// scheduler and reports back through `EngineStatus`.
pub struct EngineProcessor {
    reader: SnapshotReader<SequencerState>,
    scheduler: Scheduler,
    status: EngineStatus,
}

impl EngineProcessor {
    pub(crate) fn new(reader: SnapshotReader<SequencerState>, scheduler: Scheduler, status: EngineStatus) -> Self {
        Self {
            reader,
            scheduler,
            status,
        }
    }

    /// Warm up the calling thread. Call once on the audio thread before the
    /// first real-time block, e.g. from the host's prepare/activate hook;
    /// otherwise the first `process` call may allocate.
    pub fn prepare(&self) {
        self.reader.prepare();
    }

    /// Process one block of `block.frames` frames, writing due events to `sink`
    ///
    /// Real-time safe as long as `sink` is and `prepare` ran on this thread:
    /// one atomic load of the snapshot, no allocation, no lock.
    pub fn process<S: EventSink>(&mut self, block: BlockContext, sink: &mut S) -> BlockReport {
        let scheduler = &mut self.scheduler;
        let report = self
            .reader
            .read(|snapshot| scheduler.process(snapshot.value(), block, sink));
        self.status.publish(&self.scheduler, &report);
        report
    }

    /// Internal clock block of `frames` frames
    pub fn process_frames<S: EventSink>(&mut self, frames: u32, sink: &mut S) -> BlockReport {
        self.process(BlockContext::new(frames), sink)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }
}

impl Drop for EngineProcessor {
    fn drop(&mut self) {
        self.status.mark_detached();
    }
}
