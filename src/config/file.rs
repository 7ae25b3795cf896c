//! TOML configuration file loading
//!
//! Supports `~/.config/lumen/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LumenConfigFile {
    /// Backend connection
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Turn-taking behaviour
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Audio output
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Override for the data directory (preferences live here)
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Backend connection configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Base URL (e.g. "http://localhost:8000")
    pub url: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Conversation configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Resume listening automatically after each turn
    pub auto_listen: Option<bool>,

    /// Dominant emotion sent with every utterance (e.g. "neutral")
    pub default_emotion: Option<String>,
}

/// Audio output configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Play assistant speech through the speakers
    pub playback: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LumenConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LumenConfigFile {
    config_file_path().map_or_else(LumenConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> LumenConfigFile {
    if !path.exists() {
        return LumenConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                LumenConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            LumenConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lumen/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lumen").join("config.toml"))
}
