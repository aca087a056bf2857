// Snapshot publisher - Wait-free handoff of immutable state to the audio thread
//
// The control thread publishes a new `Arc<Snapshot<T>>` with one atomic swap.
// Superseded snapshots are parked in a retired list instead of being dropped,
// so the audio thread never releases the last reference and never frees
// memory. `gc()` frees retired snapshots once the audio thread has
// acknowledged a newer generation, i.e. finished a whole block after the swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use log::{debug, warn};

/// Generation number of a published snapshot. Strictly increasing.
pub type Generation = u64;

/// Counts snapshots that are still allocated, for leak checks
#[derive(Debug)]
struct LiveToken {
    live: Arc<AtomicUsize>,
}

impl LiveToken {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            live: Arc::clone(live),
        }
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// An immutable, fully-formed value tagged with its generation
#[derive(Debug)]
pub struct Snapshot<T> {
    generation: Generation,
    value: T,
    _token: LiveToken,
}

impl<T> Snapshot<T> {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Publication and reclaim counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotStats {
    /// Snapshots published since creation, the initial one included
    pub published: u64,
    /// Snapshots freed by `gc()`
    pub reclaimed: u64,
    /// Superseded snapshots waiting for `gc()`
    pub retained: usize,
    /// Snapshots still allocated anywhere (current + retained + stray handles)
    pub live: usize,
    /// Last generation the reader finished a block with
    pub acknowledged: Generation,
    pub current: Generation,
}

/// Control-thread half: publishes snapshots and reclaims old ones
pub struct SnapshotPublisher<T> {
    current: Arc<ArcSwap<Snapshot<T>>>,
    retired: Vec<Arc<Snapshot<T>>>,
    acknowledged: Arc<AtomicU64>,
    live: Arc<AtomicUsize>,
    next_generation: Generation,
    published: u64,
    reclaimed: u64,
    retained_warning_threshold: usize,
    warned: bool,
}

/// Audio-thread half: reads the current snapshot
pub struct SnapshotReader<T> {
    current: Arc<ArcSwap<Snapshot<T>>>,
    acknowledged: Arc<AtomicU64>,
}

/// Create a publisher/reader pair with `initial` published as generation 0
pub fn snapshot_channel<T>(initial: T) -> (SnapshotPublisher<T>, SnapshotReader<T>) {
    let live = Arc::new(AtomicUsize::new(0));
    let first = Arc::new(Snapshot {
        generation: 0,
        value: initial,
        _token: LiveToken::new(&live),
    });
    let current = Arc::new(ArcSwap::new(first));
    let acknowledged = Arc::new(AtomicU64::new(0));

    let publisher = SnapshotPublisher {
        current: Arc::clone(&current),
        retired: Vec::new(),
        acknowledged: Arc::clone(&acknowledged),
        live,
        next_generation: 1,
        published: 1,
        reclaimed: 0,
        retained_warning_threshold: usize::MAX,
        warned: false,
    };
    let reader = SnapshotReader {
        current,
        acknowledged,
    };
    (publisher, reader)
}

impl<T> SnapshotPublisher<T> {
    /// Log a warning when more than `threshold` snapshots await reclaim
    pub fn with_retained_warning(mut self, threshold: usize) -> Self {
        self.retained_warning_threshold = threshold;
        self
    }

    /// Make `value` the current snapshot
    ///
    /// The previous snapshot is retired, not freed: the reader may still be
    /// using it for the block in progress.
    pub fn publish(&mut self, value: T) -> Generation {
        let generation = self.next_generation;
        self.next_generation += 1;

        let snapshot = Arc::new(Snapshot {
            generation,
            value,
            _token: LiveToken::new(&self.live),
        });
        let previous = self.current.swap(snapshot);
        self.retired.push(previous);
        self.published += 1;

        if self.retired.len() > self.retained_warning_threshold {
            if !self.warned {
                warn!(
                    "{} superseded snapshots are waiting for gc()",
                    self.retired.len()
                );
                self.warned = true;
            }
        } else {
            self.warned = false;
        }

        generation
    }

    /// Free every retired snapshot the reader can no longer hold
    ///
    /// A snapshot is freed when its generation is older than the one the reader
    /// last acknowledged and no other handle to it exists. The current
    /// snapshot is never in the retired list. Returns the number freed.
    pub fn gc(&mut self) -> usize {
        let acknowledged = self.acknowledged.load(Ordering::Acquire);
        let before = self.retired.len();

        self.retired
            .retain(|snapshot| snapshot.generation >= acknowledged || Arc::strong_count(snapshot) > 1);

        let freed = before - self.retired.len();
        self.reclaimed += freed as u64;
        if freed > 0 {
            debug!(
                "gc: freed {} snapshot(s), {} retained (acknowledged generation {})",
                freed,
                self.retired.len(),
                acknowledged
            );
        }
        freed
    }

    /// Full handle to the current snapshot (control-thread inspection)
    pub fn current(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    pub fn current_generation(&self) -> Generation {
        self.next_generation - 1
    }

    pub fn acknowledged_generation(&self) -> Generation {
        self.acknowledged.load(Ordering::Acquire)
    }

    pub fn retained(&self) -> usize {
        self.retired.len()
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            published: self.published,
            reclaimed: self.reclaimed,
            retained: self.retired.len(),
            live: self.live.load(Ordering::Relaxed),
            acknowledged: self.acknowledged_generation(),
            current: self.current_generation(),
        }
    }
}

impl<T> SnapshotReader<T> {
    /// Register the calling thread with arc-swap without acknowledging anything
    ///
    /// The first load on a thread sets up its thread-local debt node, which
    /// may allocate. Call this on the reading thread before real-time reads.
    pub fn prepare(&self) {
        let _guard = self.current.load();
    }

    /// Run `f` against the current snapshot and acknowledge its generation
    ///
    /// One atomic load, no lock, and no allocation once `prepare` ran on this
    /// thread. The acknowledgement is stored after `f` returns and the guard
    /// is released, so it means "the reader is done with everything older
    /// than this".
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot<T>) -> R) -> R {
        let guard = self.current.load();
        let generation = guard.generation;
        let result = f(&**guard);
        drop(guard);
        self.acknowledged.store(generation, Ordering::Release);
        result
    }

    /// Generation last acknowledged by this reader
    pub fn acknowledged_generation(&self) -> Generation {
        self.acknowledged.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let (publisher, reader) = snapshot_channel(7u32);

        assert_eq!(publisher.current_generation(), 0);
        assert_eq!(reader.read(|s| *s.value()), 7);
        assert_eq!(publisher.stats().live, 1);
    }

    #[test]
    fn test_prepare_does_not_acknowledge() {
        let (mut publisher, reader) = snapshot_channel(1u32);
        publisher.publish(2);

        let reader = std::thread::spawn(move || {
            reader.prepare();
            reader
        })
        .join()
        .unwrap();

        assert_eq!(reader.acknowledged_generation(), 0);
        assert_eq!(publisher.gc(), 0);
        assert_eq!(reader.read(|snapshot| **snapshot), 2);
        assert_eq!(publisher.gc(), 1);
    }

    #[test]
    fn test_publish_retains_previous() {
        let (mut publisher, reader) = snapshot_channel(0u32);

        let generation = publisher.publish(1);

        assert_eq!(generation, 1);
        assert_eq!(publisher.retained(), 1);
        assert_eq!(publisher.stats().live, 2);
        assert_eq!(reader.read(|s| (s.generation(), **s)), (1, 1));
    }

    #[test]
    fn test_gc_waits_for_acknowledgement() {
        let (mut publisher, reader) = snapshot_channel(0u32);
        publisher.publish(1);
        publisher.publish(2);

        // Reader hasn't run since the swaps: nothing can be freed
        assert_eq!(publisher.gc(), 0);
        assert_eq!(publisher.retained(), 2);

        reader.read(|_| ());
        assert_eq!(publisher.acknowledged_generation(), 2);
        assert_eq!(publisher.gc(), 2);
        assert_eq!(publisher.stats().live, 1);
        assert_eq!(publisher.stats().reclaimed, 2);
    }

    #[test]
    fn test_gc_keeps_externally_held_snapshot() {
        let (mut publisher, reader) = snapshot_channel(0u32);
        let held = publisher.current();
        publisher.publish(1);
        reader.read(|_| ());

        assert_eq!(publisher.gc(), 0);
        drop(held);
        assert_eq!(publisher.gc(), 1);
    }

    #[test]
    fn test_gc_is_noop_without_garbage() {
        let (mut publisher, _reader) = snapshot_channel(0u32);
        assert_eq!(publisher.gc(), 0);
        assert_eq!(publisher.stats().reclaimed, 0);
    }

    #[test]
    fn test_dropping_everything_frees_all() {
        let (mut publisher, reader) = snapshot_channel(String::from("a"));
        publisher.publish(String::from("b"));
        let live = Arc::clone(&publisher.live);

        drop(reader);
        drop(publisher);
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }
}
