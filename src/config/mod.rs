use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::session::SessionPolicy;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recording: RecordingConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Hard ceiling on recording length, in seconds.
    pub max_duration_secs: u64,
    /// Recordings shorter than this are discarded, in milliseconds.
    pub min_duration_ms: u64,
    /// Duration timer granularity, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 120,
            min_duration_ms: 1000,
            tick_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

impl From<&RecordingConfig> for SessionPolicy {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            max_duration: Duration::from_secs(config.max_duration_secs),
            min_duration: Duration::from_millis(config.min_duration_ms),
            tick_interval: Duration::from_millis(config.tick_interval_ms),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {path:?}"))
    }

    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("voxnote").join("config.toml"))
    }
}
