// Moteur de séquence - Control-thread handle of the engine
//
// The engine owns the working copy (store + transport settings) and the
// snapshot publisher. Mutations are invisible to the audio thread until
// `commit()`; superseded snapshots are freed by `gc()`.
//
// `Engine::new` also returns the `EngineProcessor`, which must be moved to
// the audio callback. There is no global instance: several engines can live
// side by side.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::audio::processor::EngineProcessor;
use crate::audio::status::EngineStatus;
use crate::config::EngineConfig;
use crate::error::{Result, SequencerError};
use crate::sequencer::event::{ControlEvent, CvEvent, Event, MidiEvent};
use crate::sequencer::pattern::Pattern;
use crate::sequencer::scheduler::Scheduler;
use crate::sequencer::store::{PatternSource, SequenceStore};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::track::{Track, TrackId, TrackKind};
use crate::sequencer::transport::{
    AbsoluteLoop, LoopRange, LoopRangeSpec, TransportPosition, TransportSettings, TransportSource, TransportState,
};
use crate::snapshot::publisher::{Generation, SnapshotPublisher, SnapshotStats, snapshot_channel};
use crate::snapshot::state::SequencerState;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct Engine {
    config: EngineConfig,
    store: SequenceStore,
    transport: TransportSettings,
    transport_dirty: bool,
    publisher: SnapshotPublisher<SequencerState>,
    status: EngineStatus,
}

impl Engine {
    /// Create an engine and the processor for its audio callback
    pub fn new(config: EngineConfig) -> Result<(Self, EngineProcessor)> {
        config.validate()?;
        let tempo = Tempo::new(config.initial_tempo)?;

        let store = SequenceStore::new(config.store_options());
        let transport = TransportSettings::new(tempo);
        let (publisher, reader) = snapshot_channel(SequencerState::from_store(&store, transport.clone()));
        let publisher = publisher.with_retained_warning(config.retained_warning_threshold);

        let status = EngineStatus::new(tempo);
        let scheduler = Scheduler::new(config.scheduler_config(), tempo);
        let processor = EngineProcessor::new(reader, scheduler, status.clone());

        info!(
            "Sequencer engine created: {} Hz, {}, end of song: {:?}",
            config.sample_rate, tempo, config.end_of_song
        );

        let engine = Self {
            config,
            store,
            transport,
            transport_dirty: false,
            publisher,
            status,
        };
        Ok((engine, processor))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the working copy
    pub fn store(&self) -> &SequenceStore {
        &self.store
    }

    // ---- Tracks ----

    pub fn insert_track(&mut self, name: &str, kind: TrackKind, index: usize) -> Result<TrackId> {
        self.store.insert_track(name, kind, index)
    }

    pub fn insert_midi_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.store.insert_midi_track(name, index)
    }

    pub fn insert_cv_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.store.insert_cv_track(name, index)
    }

    pub fn insert_control_track(&mut self, name: &str, index: usize) -> Result<TrackId> {
        self.store.insert_control_track(name, index)
    }

    pub fn remove_track(&mut self, index: usize) -> Result<Track> {
        self.store.remove_track(index)
    }

    pub fn tracks(&self) -> &[Track] {
        self.store.tracks()
    }

    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.store.track_index(name)
    }

    // ---- Patterns ----

    /// Empty pattern shaped for the current tracks. Insert it before changing them.
    pub fn create_pattern(&self, length: u32) -> Result<Pattern> {
        self.store.create_pattern(length)
    }

    pub fn insert_pattern(&mut self, index: usize, source: impl Into<PatternSource>) -> Result<()> {
        self.store.insert_pattern(index, source)
    }

    pub fn set_pattern(&mut self, index: usize, source: impl Into<PatternSource>) -> Result<()> {
        self.store.set_pattern(index, source)
    }

    pub fn remove_pattern(&mut self, index: usize) -> Result<()> {
        self.store.remove_pattern(index).map(|_| ())
    }

    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.store.pattern(index)
    }

    pub fn pattern_count(&self) -> usize {
        self.store.pattern_count()
    }

    // ---- Events ----

    pub fn set_event(&mut self, track: usize, pattern: usize, tick: u32, event: Event) -> Result<Option<Event>> {
        self.store.set_event(track, pattern, tick, event)
    }

    pub fn set_midi_event(&mut self, track: usize, pattern: usize, tick: u32, event: MidiEvent) -> Result<Option<Event>> {
        self.store.set_midi_event(track, pattern, tick, event)
    }

    pub fn set_cv_event(&mut self, track: usize, pattern: usize, tick: u32, event: CvEvent) -> Result<Option<Event>> {
        self.store.set_cv_event(track, pattern, tick, event)
    }

    pub fn set_control_event(
        &mut self,
        track: usize,
        pattern: usize,
        tick: u32,
        event: ControlEvent,
    ) -> Result<Option<Event>> {
        self.store.set_control_event(track, pattern, tick, event)
    }

    pub fn clear_event(&mut self, track: usize, pattern: usize, tick: u32) -> Result<Option<Event>> {
        self.store.clear_event(track, pattern, tick)
    }

    pub fn event(&self, track: usize, pattern: usize, tick: u32) -> Option<Event> {
        self.store.event(track, pattern, tick)
    }

    // ---- Transport ----

    /// Loop range in ticks, mapped onto the current pattern layout
    pub fn loop_range(&self) -> LoopRange {
        match self.transport.loop_anchor() {
            Some(anchor) => anchor.to_range(&self.store.pattern_lengths()),
            None => self.transport.loop_range(),
        }
    }

    /// Set the loop range in ticks or samples
    ///
    /// Sample offsets are converted with the current global tempo, rounding
    /// down, and kept as absolute ticks: the loop is mapped onto patterns
    /// again at every commit, so it may be set before the song is built.
    pub fn set_loop_range(&mut self, range: impl Into<LoopRangeSpec>) -> Result<()> {
        match range.into() {
            LoopRangeSpec::Ticks(range) => self.transport.set_loop_range(range)?,
            LoopRangeSpec::Samples {
                start,
                end,
                enabled,
            } => {
                let anchor = AbsoluteLoop::from_samples(
                    start,
                    end,
                    enabled,
                    &self.transport.tempo(),
                    self.config.sample_rate,
                );
                self.transport
                    .set_absolute_loop(anchor, &self.store.pattern_lengths())?;
            }
        }
        self.transport_dirty = true;
        Ok(())
    }

    /// Playhead position: the uncommitted or unapplied request if there is
    /// one, otherwise where the audio thread is
    pub fn transport_position(&self) -> TransportPosition {
        if self.status.applied_position_seq() >= self.transport.position_seq() {
            self.status.position()
        } else {
            self.transport.position()
        }
    }

    /// Relocate the playhead. The tick at `position` is emitted on arrival.
    pub fn set_transport_position(&mut self, position: TransportPosition) {
        self.transport.set_position(position);
        self.transport_dirty = true;
    }

    pub fn transport_state(&self) -> TransportState {
        if self.status.applied_state_seq() >= self.transport.state_seq() {
            self.status.state()
        } else {
            self.transport.state()
        }
    }

    /// Start or stop. Requesting the current state does nothing; starting
    /// resumes from the current position.
    pub fn set_transport_state(&mut self, state: TransportState) {
        if self.transport_state() == state {
            return;
        }
        self.transport.request_state(state);
        self.transport_dirty = true;
    }

    pub fn transport_source(&self) -> TransportSource {
        self.transport.source()
    }

    /// Switch the clock source. Legal while playing; effective from the next block.
    pub fn set_transport_source(&mut self, source: TransportSource) {
        if self.transport.set_source(source) {
            self.transport_dirty = true;
        }
    }

    /// Global tempo as last set by the client
    pub fn global_tempo(&self) -> f64 {
        self.transport.tempo().ticks_per_second()
    }

    pub fn set_global_tempo(&mut self, ticks_per_second: f64) -> Result<()> {
        self.transport.set_tempo(ticks_per_second)?;
        self.transport_dirty = true;
        Ok(())
    }

    // ---- Publication ----

    /// True if there are changes `commit()` would publish
    pub fn has_uncommitted_changes(&self) -> bool {
        self.store.is_dirty() || self.transport_dirty
    }

    /// Publish the working copy to the audio thread
    ///
    /// Visible from the next block on. Returns the generation now current;
    /// nothing is published when there are no changes.
    pub fn commit(&mut self) -> Generation {
        if self.store.is_dirty() && self.transport.relayout_loop(&self.store.pattern_lengths()) {
            self.transport_dirty = true;
        }
        if !self.has_uncommitted_changes() {
            return self.publisher.current_generation();
        }

        let state = SequencerState::from_store(&self.store, self.transport.clone());
        let generation = self.publisher.publish(state);

        self.store.mark_clean();
        self.transport_dirty = false;
        debug!(
            "commit: generation {} ({} tracks, {} patterns, {} retained)",
            generation,
            self.store.track_count(),
            self.store.pattern_count(),
            self.publisher.retained()
        );
        generation
    }

    /// Free superseded snapshots the audio thread can no longer reach
    ///
    /// Safe to call at any time. Skipping it only delays reclaim.
    pub fn gc(&mut self) -> usize {
        self.publisher.gc()
    }

    pub fn snapshot_stats(&self) -> SnapshotStats {
        self.publisher.stats()
    }

    /// Audio-thread state, as of the last processed block
    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Block until the audio thread has processed a block with the latest
    /// commit
    ///
    /// Fails with `Disconnected` if the processor is dropped meanwhile.
    pub fn wait(&self) -> Result<()> {
        loop {
            if self.is_synchronized() {
                return Ok(());
            }
            if self.status.is_detached() {
                return Err(SequencerError::Disconnected);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Like `wait`, giving up after `timeout`. Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_synchronized() {
                return Ok(true);
            }
            if self.status.is_detached() {
                return Err(SequencerError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    fn is_synchronized(&self) -> bool {
        self.status.blocks_processed() > 0
            && self.publisher.acknowledged_generation() >= self.publisher.current_generation()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::messaging::output::{NullSink, RecordingSink};

    fn engine() -> (Engine, EngineProcessor) {
        Engine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            initial_tempo: 0.0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_changes_invisible_until_commit() {
        let (mut engine, processor) = engine();
        engine.insert_midi_track("foo", 0).unwrap();

        let published = engine.publisher.current();
        assert!(published.tracks().is_empty());
        drop(published);

        let generation = engine.commit();
        assert_eq!(generation, 1);
        assert_eq!(engine.publisher.current().tracks().len(), 1);
        drop(processor);
    }

    #[test]
    fn test_commit_without_changes_publishes_nothing() {
        let (mut engine, _processor) = engine();

        assert_eq!(engine.commit(), 0);
        engine.set_global_tempo(8.0).unwrap();
        assert_eq!(engine.commit(), 1);
        assert_eq!(engine.commit(), 1);
        assert_eq!(engine.snapshot_stats().published, 2);
    }

    #[test]
    fn test_transport_readback() {
        let (mut engine, mut processor) = engine();
        engine.insert_midi_track("foo", 0).unwrap();
        engine.insert_pattern(0, 16).unwrap();

        engine.set_transport_position(TransportPosition::new(0, 3));
        engine.set_transport_state(TransportState::Playing);
        // Requested but not applied yet
        assert_eq!(engine.transport_position(), TransportPosition::new(0, 3));
        assert_eq!(engine.transport_state(), TransportState::Playing);

        engine.commit();
        processor.process_frames(12001, &mut RecordingSink::new());

        assert_eq!(engine.transport_position(), TransportPosition::new(0, 4));
        assert_eq!(engine.transport_state(), TransportState::Playing);
    }

    #[test]
    fn test_relocation_readback_from_audio_thread() {
        let (mut engine, mut processor) = engine();
        engine.insert_midi_track("foo", 0).unwrap();
        engine.insert_pattern(0, 1024).unwrap();
        engine.commit();

        let done = Arc::new(AtomicBool::new(false));
        let done_audio = Arc::clone(&done);
        let audio = thread::spawn(move || {
            while !done_audio.load(Ordering::Acquire) {
                processor.process_frames(64, &mut NullSink);
            }
        });

        for k in 1..=200u32 {
            let target = TransportPosition::new(0, k * 5 % 1024);
            engine.set_transport_position(target);
            engine.commit();
            engine.wait().unwrap();

            // Stopped: once the request is applied the playhead stays on it
            assert_eq!(engine.transport_position(), target, "relocation {}", k);
            assert_eq!(engine.transport_state(), TransportState::Stopped);
        }

        done.store(true, Ordering::Release);
        audio.join().expect("audio thread panicked");
    }

    #[test]
    fn test_set_state_is_idempotent() {
        let (mut engine, _processor) = engine();

        engine.set_transport_state(TransportState::Stopped);
        assert!(!engine.has_uncommitted_changes());

        engine.set_transport_state(TransportState::Playing);
        engine.set_transport_state(TransportState::Playing);
        assert_eq!(engine.transport.state_seq(), 1);
    }

    #[test]
    fn test_sample_loop_range() {
        let (mut engine, _processor) = engine();
        engine.insert_pattern(0, 16).unwrap();

        // 12000 samples per tick
        engine
            .set_loop_range(LoopRangeSpec::Samples {
                start: 12000 * 2,
                end: 12000 * 6 + 11999,
                enabled: true,
            })
            .unwrap();

        let range = engine.loop_range();
        assert_eq!(range.start, TransportPosition::new(0, 2));
        assert_eq!(range.end, TransportPosition::new(0, 6));
    }

    #[test]
    fn test_invalid_tempo_keeps_previous() {
        let (mut engine, _processor) = engine();

        assert_eq!(engine.set_global_tempo(-2.0), Err(SequencerError::InvalidTempo(-2.0)));
        assert_eq!(engine.global_tempo(), 4.0);
        assert!(!engine.has_uncommitted_changes());
    }

    #[test]
    fn test_wait_after_block() {
        let (mut engine, mut processor) = engine();
        engine.insert_midi_track("foo", 0).unwrap();
        engine.commit();

        assert_eq!(engine.wait_timeout(Duration::from_millis(5)), Ok(false));

        processor.process_frames(64, &mut RecordingSink::new());
        assert_eq!(engine.wait(), Ok(()));
    }

    #[test]
    fn test_wait_fails_when_processor_dropped() {
        let (engine, processor) = engine();
        drop(processor);

        assert_eq!(engine.wait(), Err(SequencerError::Disconnected));
    }
}
