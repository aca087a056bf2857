// Integration test: Engine configuration files

use std::fs;

use tempfile::TempDir;
use tickseq::sequencer::store::TrackIndexPolicy;
use tickseq::{EndOfSongPolicy, Engine, EngineConfig, SequencerError};

#[test]
fn test_save_and_load_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.ron");

    let config = EngineConfig {
        sample_rate: 44100.0,
        unique_track_names: false,
        track_index_policy: TrackIndexPolicy::Shift,
        end_of_song: EndOfSongPolicy::Wrap,
        initial_tempo: 6.0,
        ..EngineConfig::default()
    };
    config.save(&path).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_loaded_config_drives_engine() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("engine.ron");
    fs::write(&path, "(unique_track_names: false, track_index_policy: Shift)").unwrap();

    let (mut engine, _processor) = Engine::new(EngineConfig::load(&path).unwrap()).unwrap();

    engine.insert_midi_track("same", 0).unwrap();
    engine.insert_midi_track("same", 0).unwrap();
    assert_eq!(engine.tracks().len(), 2);
}

#[test]
fn test_missing_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = EngineConfig::load(temp_dir.path().join("missing.ron"));

    assert!(matches!(result, Err(SequencerError::Config(_))));
}

#[test]
fn test_invalid_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.ron");
    fs::write(&path, "(sample_rate: \"fast\")").unwrap();

    assert!(matches!(EngineConfig::load(&path), Err(SequencerError::Config(_))));
}
