use crate::audio::AudioFormat;
use crate::store::file::validate_key;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_playback_poll_ms")]
    pub playback_poll_ms: u64,

    #[serde(default = "default_command_queue")]
    pub command_queue: usize,
}

fn default_data_dir() -> PathBuf {
    let base = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("clipdeck")
}

fn default_storage_key() -> String {
    "recordings".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u16 {
    1
}

fn default_playback_poll_ms() -> u64 {
    200
}

fn default_command_queue() -> usize {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_key: default_storage_key(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            playback_poll_ms: default_playback_poll_ms(),
            command_queue: default_command_queue(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/clipdeck/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("clipdeck").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_key(&self.storage_key).context("Invalid storage_key")?;

        if self.sample_rate == 0 {
            return Err(anyhow::anyhow!("sample_rate must be greater than zero"));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(anyhow::anyhow!("channels must be 1 or 2"));
        }

        if self.playback_poll_ms == 0 {
            return Err(anyhow::anyhow!("playback_poll_ms must be greater than zero"));
        }

        if self.command_queue == 0 {
            return Err(anyhow::anyhow!("command_queue must be greater than zero"));
        }

        Ok(())
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels)
    }

    /// Directory holding the persisted clip list.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Directory holding the recorded audio files.
    pub fn clips_dir(&self) -> PathBuf {
        self.data_dir.join("clips")
    }

    pub fn playback_poll(&self) -> Duration {
        Duration::from_millis(self.playback_poll_ms)
    }
}
