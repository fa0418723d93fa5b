// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::RawEncodeConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default encoder preset for new conversions
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Default audio bitrate in bits per second (unset = engine default)
    #[serde(default)]
    pub audio_bitrate_bps: Option<i64>,

    /// Default total size target in bits (unset = no bitrate targeting)
    #[serde(default)]
    pub target_size_bits: Option<i64>,

    /// Default frame-rate cap (unset = source frame rate)
    #[serde(default)]
    pub video_fps: Option<i64>,

    /// Default resolution ceiling, both or neither
    #[serde(default)]
    pub video_width: Option<i64>,
    #[serde(default)]
    pub video_height: Option<i64>,

    /// Whether a finished pass should signal playback
    #[serde(default)]
    pub autoplay: bool,

    /// Mirror engine log lines into progenc.log
    #[serde(default)]
    pub diagnostics: bool,
}

fn default_preset() -> String {
    "ultrafast".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            audio_bitrate_bps: None,
            target_size_bits: None,
            video_fps: None,
            video_width: None,
            video_height: None,
            autoplay: false,
            diagnostics: false,
        }
    }
}

impl Config {
    /// Path to the config file: `<config_dir>/progenc/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine config directory")?;
        Ok(base.join("progenc").join("config.toml"))
    }

    /// Load config from disk, or defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk, creating the directory if needed
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Express the persisted defaults as a raw config for validation.
    pub fn to_raw_config(&self) -> RawEncodeConfig {
        RawEncodeConfig {
            audio_bitrate_bps: self.defaults.audio_bitrate_bps,
            target_size_bits: self.defaults.target_size_bits,
            video_fps: self.defaults.video_fps,
            video_preset: Some(self.defaults.preset.clone()),
            video_ref_frames: None,
            video_width: self.defaults.video_width,
            video_height: self.defaults.video_height,
            worker_count: None,
            autoplay_on_complete: Some(self.defaults.autoplay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{validate, EncodeConfig, Preset};

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.defaults.preset, "ultrafast");
        assert!(!parsed.defaults.autoplay);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[defaults]\npreset = \"slow\"\n").unwrap();
        assert_eq!(parsed.defaults.preset, "slow");
        assert_eq!(parsed.defaults.video_fps, None);
    }

    #[test]
    fn test_raw_config_validates() {
        let mut config = Config::default();
        config.defaults.preset = "medium".to_string();
        config.defaults.video_width = Some(1280);
        config.defaults.video_height = Some(720);

        let validated = validate(&config.to_raw_config(), &EncodeConfig::default()).unwrap();
        assert_eq!(validated.video_preset, Preset::Medium);
        assert_eq!(validated.video_resolution, Some((1280, 720)));
    }
}
