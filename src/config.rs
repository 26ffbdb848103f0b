//! Player configuration and application paths
//!
//! `PlayerConfig` holds everything that is fixed once a sequence is loaded
//! (worker count, buffer window, texture caching, reverse-at-loop, decode mode)
//! plus the initial transport settings. It round-trips through JSON.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "seqplay.json";

/// Default look-ahead window (frames)
pub const DEFAULT_BUFFER_FRAMES: usize = 10;

/// Decode path for frame payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Still images decoded to raw pixels
    #[default]
    Pixels,
    /// DDS textures kept block-compressed
    Compressed,
}

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Background decode threads. 0 selects immediate (blocking) mode.
    pub workers: usize,
    /// Frames ahead of the playhead kept loaded
    pub buffer_frames: usize,
    /// Keep uploaded textures alive after their pixels are evicted
    pub persist_gpu_cache: bool,
    /// At the end of a loop, play backwards instead of wrapping to frame 0
    pub reverse_at_loop: bool,
    pub decode_mode: DecodeMode,
    pub loop_enabled: bool,
    pub playback_speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            persist_gpu_cache: false,
            reverse_at_loop: false,
            decode_mode: DecodeMode::Pixels,
            loop_enabled: true,
            playback_speed: 1.0,
        }
    }
}

/// 75% of CPU cores, leaving room for the host's own threads
pub fn default_workers() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

impl PlayerConfig {
    /// Read config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PlayerConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read config if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (SEQPLAY_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("SEQPLAY_CONFIG_DIR")
                .ok()
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SEQPLAY_CONFIG_DIR environment variable
/// 3. Local folder IF a config file exists there
/// 4. Platform-specific config directory from dirs-next (default)
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get the configuration directory
fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir() {
        if current_dir.join(CONFIG_FILE).exists() {
            return current_dir;
        }
    }

    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("seqplay");
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        let path = config_file("test.json", &config);
        assert_eq!(path, PathBuf::from("/custom/test.json"));
    }

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.buffer_frames, DEFAULT_BUFFER_FRAMES);
        assert_eq!(config.decode_mode, DecodeMode::Pixels);
        assert!(config.loop_enabled);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "workers": 0, "decode_mode": "compressed" }"#).unwrap();
        assert_eq!(config.workers, 0);
        assert_eq!(config.decode_mode, DecodeMode::Compressed);
        assert_eq!(config.buffer_frames, DEFAULT_BUFFER_FRAMES);
        assert_eq!(config.playback_speed, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let config = PlayerConfig {
            workers: 3,
            buffer_frames: 24,
            reverse_at_loop: true,
            ..PlayerConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(PlayerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlayerConfig::load_or_default(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config.buffer_frames, DEFAULT_BUFFER_FRAMES);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(PlayerConfig::load(&path).is_err());
    }
}
