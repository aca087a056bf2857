// Quick demonstration of the sequencing core with a simulated audio thread
// Run with: cargo run --bin demo_sequencer [config.ron]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tickseq::{
    CvEvent, Engine, EngineConfig, LoopRange, MidiEvent, PatternSource, TransportPosition, TransportState,
    create_output_channel,
};

const BLOCK_FRAMES: u32 = 512;
const MIDI_CHANNEL: u8 = 0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let block_duration = Duration::from_secs_f64(BLOCK_FRAMES as f64 / config.sample_rate);

    println!("🎵 Tickseq - Sequencer Demo");
    println!("===========================");

    let (mut engine, mut processor) = Engine::new(config)?;
    let (mut sink, mut receiver) = create_output_channel(1024);

    // Simulated audio callback
    let running = Arc::new(AtomicBool::new(true));
    let running_audio = Arc::clone(&running);
    let audio_thread = thread::spawn(move || {
        processor.prepare();
        while running_audio.load(Ordering::Relaxed) {
            processor.process_frames(BLOCK_FRAMES, &mut sink);
            thread::sleep(block_duration);
        }
    });

    engine.set_loop_range(LoopRange::new(
        TransportPosition::new(0, 0),
        TransportPosition::new(1, 0),
        true,
    ))?;

    println!("Adding tracks...");
    engine.insert_midi_track("bd", 0)?;
    engine.insert_midi_track("bar", 1)?;
    engine.insert_cv_track("cv", 2)?;
    engine.insert_control_track("control", 3)?;

    // Patterns come from the engine so their sequences match the tracks
    let mut pattern = engine.create_pattern(16)?;
    pattern.set_cv_event(2, 0, CvEvent::interval(1.0, 1.0))?;
    for n in 0..16u8 {
        pattern.set_midi_event(0, n as u32, MidiEvent::note_on(n, 64))?;
        pattern.set_midi_event(1, n as u32, MidiEvent::cc(n, 64))?;
    }
    engine.insert_pattern(0, pattern)?;
    // Empty default-length pattern after it, outside the loop
    engine.insert_pattern(1, PatternSource::default())?;

    engine.commit();
    engine.wait()?;

    println!("Cleaning up some memory...");
    let freed = engine.gc();
    println!("   - Freed {} snapshot(s)", freed);

    engine.set_global_tempo(4.0)?;

    println!("Setting the transport position and starting playback...");
    engine.set_transport_position(TransportPosition::zero());
    engine.set_transport_state(TransportState::Playing);
    engine.commit();

    for _ in 0..40 {
        thread::sleep(Duration::from_millis(100));
        for timed in receiver.drain_midi() {
            let bytes = timed.event.to_message(MIDI_CHANNEL).to_bytes();
            println!(
                "   track {} @ {:>4}: {:02X} {:02X} {:02X}",
                timed.track, timed.offset, bytes[0], bytes[1], bytes[2]
            );
        }
        for timed in receiver.drain_cv() {
            println!("   track {} @ {:>4}: cv {:?}", timed.track, timed.offset, timed.event);
        }
        engine.gc();
    }

    engine.set_transport_state(TransportState::Stopped);
    engine.commit();
    engine.wait()?;

    let status = engine.status();
    println!("\n📊 Stopped at {:?}", engine.transport_position());
    println!("   - Blocks processed: {}", status.blocks_processed());
    println!("   - Events emitted: {}", status.emitted());
    println!("   - Events dropped: {}", status.dropped());
    println!("   - Snapshots: {:?}", engine.snapshot_stats());

    running.store(false, Ordering::Relaxed);
    audio_thread.join().map_err(|_| "audio thread panicked")?;

    Ok(())
}
