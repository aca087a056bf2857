// Status du moteur - Readback of the audio thread's state
// Written by the processor after every block, read by the control thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use crate::audio::parameters::AtomicF64;
use crate::sequencer::scheduler::{BlockReport, Scheduler};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::{TransportPosition, TransportState};

#[derive(Debug, Default)]
struct StatusInner {
    state: AtomicU8,
    /// (pattern << 32) | tick
    position: AtomicU64,
    applied_position_seq: AtomicU64,
    applied_state_seq: AtomicU64,
    blocks_processed: AtomicU64,
    ticks: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    detached: AtomicBool,
}

/// Atomic wrapper pour partager le status entre threads
#[derive(Debug, Clone)]
pub struct EngineStatus {
    inner: Arc<StatusInner>,
    tempo: AtomicF64,
}

impl EngineStatus {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            inner: Arc::new(StatusInner::default()),
            tempo: AtomicF64::new(tempo.ticks_per_second()),
        }
    }

    /// Record the scheduler state after a block (audio thread)
    ///
    /// The applied sequence numbers are stored last with Release: a reader
    /// that loads a sequence number with Acquire and then the position or
    /// state sees values at least as recent as that request.
    pub(crate) fn publish(&self, scheduler: &Scheduler, report: &BlockReport) {
        let inner = &self.inner;
        inner.state.store(scheduler.state().into(), Ordering::Relaxed);
        inner.position.store(pack(scheduler.position()), Ordering::Relaxed);
        self.tempo.set(scheduler.tempo().ticks_per_second());
        inner.ticks.fetch_add(report.ticks as u64, Ordering::Relaxed);
        inner.emitted.fetch_add(report.emitted as u64, Ordering::Relaxed);
        inner.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        inner
            .applied_position_seq
            .store(scheduler.applied_position_seq(), Ordering::Release);
        inner
            .applied_state_seq
            .store(scheduler.applied_state_seq(), Ordering::Release);
        // Release: everything above is visible once the block count moves
        inner.blocks_processed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn mark_detached(&self) {
        self.inner.detached.store(true, Ordering::Release);
    }

    pub fn state(&self) -> TransportState {
        TransportState::from(self.inner.state.load(Ordering::Acquire))
    }

    pub fn position(&self) -> TransportPosition {
        unpack(self.inner.position.load(Ordering::Acquire))
    }

    /// Tempo the audio thread is running at, control events included
    pub fn tempo(&self) -> f64 {
        self.tempo.get()
    }

    pub fn applied_position_seq(&self) -> u64 {
        self.inner.applied_position_seq.load(Ordering::Acquire)
    }

    pub fn applied_state_seq(&self) -> u64 {
        self.inner.applied_state_seq.load(Ordering::Acquire)
    }

    pub fn blocks_processed(&self) -> u64 {
        self.inner.blocks_processed.load(Ordering::Acquire)
    }

    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    pub fn emitted(&self) -> u64 {
        self.inner.emitted.load(Ordering::Relaxed)
    }

    /// Events lost because an output queue was full
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// True once the processor has been dropped
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::new(Tempo::default())
    }
}

fn pack(position: TransportPosition) -> u64 {
    ((position.pattern as u64) << 32) | position.tick as u64
}

fn unpack(value: u64) -> TransportPosition {
    TransportPosition::new((value >> 32) as u32, value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::scheduler::SchedulerConfig;

    #[test]
    fn test_position_packing() {
        let position = TransportPosition::new(3, 127);
        assert_eq!(unpack(pack(position)), position);

        let large = TransportPosition::new(u32::MAX, u32::MAX - 1);
        assert_eq!(unpack(pack(large)), large);
    }

    #[test]
    fn test_publish_counts_blocks() {
        let status = EngineStatus::default();
        let scheduler = Scheduler::new(SchedulerConfig::default(), Tempo::default());
        let report = BlockReport {
            ticks: 2,
            emitted: 3,
            dropped: 1,
        };

        status.publish(&scheduler, &report);
        status.publish(&scheduler, &report);

        assert_eq!(status.blocks_processed(), 2);
        assert_eq!(status.ticks(), 4);
        assert_eq!(status.emitted(), 6);
        assert_eq!(status.dropped(), 2);
        assert_eq!(status.state(), TransportState::Stopped);
        assert_eq!(status.tempo(), 4.0);
        assert!(!status.is_detached());
    }
}
