// Engine configuration - Construction-time options, persisted as RON

use std::fs;
use std::path::Path;

use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::sequencer::scheduler::SchedulerConfig;
use crate::sequencer::store::{StoreOptions, TrackIndexPolicy};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::EndOfSongPolicy;

/// Options fixed when an engine is created
///
/// Missing fields take their default when loading, so a config file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio sample rate in Hz
    pub sample_rate: f64,
    /// Reject a second track with an existing name
    pub unique_track_names: bool,
    pub track_index_policy: TrackIndexPolicy,
    pub end_of_song: EndOfSongPolicy,
    /// Global tempo at creation, in ticks per second
    pub initial_tempo: f64,
    pub all_notes_off_on_stop: bool,
    pub all_notes_off_on_loop: bool,
    pub max_ticks_per_block: u32,
    /// Warn when more superseded snapshots than this wait for `gc()`
    pub retained_warning_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            unique_track_names: true,
            track_index_policy: TrackIndexPolicy::Reject,
            end_of_song: EndOfSongPolicy::Stop,
            initial_tempo: 4.0,
            all_notes_off_on_stop: true,
            all_notes_off_on_loop: true,
            max_ticks_per_block: 4096,
            retained_warning_threshold: 64,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(SequencerError::Config(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        Tempo::new(self.initial_tempo)?;
        if self.max_ticks_per_block == 0 {
            return Err(SequencerError::Config(
                "max_ticks_per_block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)
            .map_err(|e| SequencerError::Config(format!("Failed to parse RON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        to_string_pretty(self, PrettyConfig::default())
            .map_err(|e| SequencerError::Config(format!("Failed to serialize to RON: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SequencerError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_ron_str(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_ron_string()?;
        fs::write(path, text)
            .map_err(|e| SequencerError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            unique_track_names: self.unique_track_names,
            track_index_policy: self.track_index_policy,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            sample_rate: self.sample_rate,
            end_of_song: self.end_of_song,
            all_notes_off_on_stop: self.all_notes_off_on_stop,
            all_notes_off_on_loop: self.all_notes_off_on_loop,
            max_ticks_per_block: self.max_ticks_per_block,
        }
    }
}
