// Integration test: Snapshot publication and reclaim
//
// Superseded snapshots must survive until the reader has moved past them,
// then be freed by gc(). A reader running on another thread must only ever
// observe complete snapshots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rand::Rng;
use tickseq::sequencer::store::SequenceStore;
use tickseq::sequencer::transport::TransportSettings;
use tickseq::snapshot::{SequencerState, snapshot_channel};
use tickseq::{Engine, EngineConfig, MidiEvent, NullSink, TransportState};

#[test]
fn test_sequential_commits_then_gc() {
    const CYCLES: u64 = 50;
    let (mut engine, mut processor) = Engine::new(EngineConfig::default()).unwrap();
    engine.insert_midi_track("foo", 0).unwrap();
    engine.insert_pattern(0, 64).unwrap();
    engine.commit();
    processor.process_frames(64, &mut NullSink);
    engine.gc();

    for i in 0..CYCLES {
        engine
            .set_midi_event(0, 0, (i % 64) as u32, MidiEvent::note_on(i as u8, 100))
            .unwrap();
        engine.commit();
    }

    // The reader has not run since: every superseded snapshot is kept
    assert_eq!(engine.gc(), 0);
    let stats = engine.snapshot_stats();
    assert_eq!(stats.retained, CYCLES as usize);
    assert_eq!(stats.live, CYCLES as usize + 1);

    // One block later all of them are unreachable
    processor.process_frames(64, &mut NullSink);
    assert_eq!(engine.gc(), CYCLES as usize);

    let stats = engine.snapshot_stats();
    assert_eq!(stats.retained, 0);
    assert_eq!(stats.live, 1);
    assert_eq!(stats.published, stats.reclaimed + 1);
}

#[test]
fn test_snapshot_in_use_is_never_freed() {
    let (mut publisher, reader) = snapshot_channel(vec![0u64; 256]);
    publisher.publish(vec![1; 256]);

    reader.read(|held| {
        assert_eq!(held.generation(), 1);

        // Superseded while the reader is using it
        publisher.publish(vec![2; 256]);
        publisher.publish(vec![3; 256]);
        assert_eq!(publisher.gc(), 0);
        assert_eq!(publisher.stats().live, 4);

        assert!(held.iter().all(|&v| v == 1));
    });

    // Only what is older than the snapshot just used can go
    assert_eq!(publisher.gc(), 1);
    assert_eq!(publisher.stats().live, 3);

    reader.read(|current| assert_eq!(current[0], 3));
    assert_eq!(publisher.gc(), 2);
    assert_eq!(publisher.stats().live, 1);
}

#[test]
fn test_randomized_mutate_commit_gc() {
    let mut rng = rand::thread_rng();
    let (mut engine, mut processor) = Engine::new(EngineConfig::default()).unwrap();
    engine.insert_midi_track("t0", 0).unwrap();
    engine.insert_pattern(0, 16).unwrap();
    engine.set_transport_state(TransportState::Playing);
    engine.commit();

    let mut tracks = 1;
    for _ in 0..500 {
        match rng.gen_range(0..6) {
            0 if tracks < 8 => {
                engine.insert_midi_track(&format!("t{}", tracks), tracks).unwrap();
                tracks += 1;
            }
            1 => {
                let index = rng.gen_range(0..=engine.pattern_count());
                engine.insert_pattern(index, rng.gen_range(1..32u32)).unwrap();
            }
            2 => {
                let pattern = rng.gen_range(0..engine.pattern_count());
                let length = engine.pattern(pattern).unwrap().length();
                let track = rng.gen_range(0..tracks);
                engine
                    .set_midi_event(track, pattern, rng.gen_range(0..length), MidiEvent::note_on(60, 100))
                    .unwrap();
            }
            3 => {
                engine.commit();
            }
            4 => {
                processor.process_frames(rng.gen_range(1..2048), &mut NullSink);
            }
            _ => {
                let stats = engine.snapshot_stats();
                let freed = engine.gc();
                assert!(freed <= stats.retained);
            }
        }

        // Everything allocated is either current or waiting for gc
        let stats = engine.snapshot_stats();
        assert_eq!(stats.live, stats.retained + 1);
        assert!(stats.acknowledged <= stats.current);
    }

    engine.commit();
    processor.process_frames(64, &mut NullSink);
    engine.gc();
    let stats = engine.snapshot_stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.retained, 0);
}

#[test]
fn test_concurrent_reader_never_sees_torn_snapshot() {
    const VERSIONS: u64 = 2000;
    let (mut publisher, reader) = snapshot_channel(vec![0u64; 64]);
    let done = Arc::new(AtomicBool::new(false));
    let done_reader = Arc::clone(&done);

    let handle = thread::spawn(move || {
        let mut reads = 0u64;
        let mut last_seen = 0;
        while !done_reader.load(Ordering::Acquire) {
            let (generation, first) = reader.read(|snapshot| {
                let first = snapshot[0];
                assert_eq!(snapshot.len(), 64 + first as usize % 7);
                assert!(snapshot.iter().all(|&v| v == first), "torn snapshot");
                (snapshot.generation(), first)
            });
            assert_eq!(generation, first);
            assert!(generation >= last_seen);
            last_seen = generation;
            reads += 1;
        }
        reads
    });

    for version in 1..=VERSIONS {
        let len = 64 + version as usize % 7;
        publisher.publish(vec![version; len]);
        if version % 16 == 0 {
            publisher.gc();
        }
    }
    done.store(true, Ordering::Release);

    let reads = handle.join().expect("reader thread panicked");
    assert!(reads > 0);
}

#[test]
fn test_concurrent_reader_sees_consistent_store() {
    let mut store = SequenceStore::default();
    let (mut publisher, reader) =
        snapshot_channel(SequencerState::from_store(&store, TransportSettings::default()));
    let done = Arc::new(AtomicBool::new(false));
    let done_reader = Arc::clone(&done);

    let handle = thread::spawn(move || {
        while !done_reader.load(Ordering::Acquire) {
            reader.read(|snapshot| {
                assert!(snapshot.is_consistent());
                // Track names encode their position
                for (index, track) in snapshot.tracks().iter().enumerate() {
                    assert_eq!(track.name(), format!("track{}", index));
                }
            });
        }
    });

    for i in 0..200 {
        if i % 10 == 0 && store.track_count() < 16 {
            let index = store.track_count();
            store.insert_midi_track(&format!("track{}", index), index).unwrap();
        }
        if store.pattern_count() < 32 {
            store.insert_pattern(store.pattern_count(), 8).unwrap();
        }
        if store.track_count() > 0 {
            let track = i % store.track_count();
            let pattern = i % store.pattern_count();
            store
                .set_midi_event(track, pattern, (i % 8) as u32, MidiEvent::note_on(60, 100))
                .unwrap();
        }
        publisher.publish(SequencerState::from_store(&store, TransportSettings::default()));
        publisher.gc();
    }
    done.store(true, Ordering::Release);

    handle.join().expect("reader thread panicked");
}
