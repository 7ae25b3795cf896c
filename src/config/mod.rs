//! Configuration management for the Lumen voice client
//!
//! Priority: CLI overrides → environment → config file → defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};
use file::LumenConfigFile;

/// Backend URL used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default per-request timeout (transcription + LLM + TTS can be slow)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Lumen client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL
    pub api_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Resume listening automatically after each turn
    pub auto_listen: bool,

    /// Play assistant speech (off = muted)
    pub playback_enabled: bool,

    /// Data directory (preferences)
    pub data_dir: PathBuf,

    /// Dominant emotion attached to each utterance, if any
    pub default_emotion: Option<String>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub mute: bool,
    pub no_auto_listen: bool,
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let file = file::load_config_file();
        Self::resolve(&file, overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from explicit sources
    ///
    /// # Errors
    ///
    /// Returns error if the backend URL is not http(s) or the timeout is zero
    pub fn resolve(
        file: &LumenConfigFile,
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| env("LUMEN_API_URL"))
            .or_else(|| file.backend.url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend URL must be http(s): {api_url}"
            )));
        }

        let timeout_secs = match env("LUMEN_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("invalid LUMEN_REQUEST_TIMEOUT_SECS: {raw}"))
            })?),
            None => file.backend.timeout_secs,
        };
        let request_timeout = timeout_secs.map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);
        if request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }

        let auto_listen = !overrides.no_auto_listen
            && env("LUMEN_AUTO_LISTEN")
                .map(|v| parse_bool(&v))
                .or(file.conversation.auto_listen)
                .unwrap_or(true);

        let playback_enabled = !overrides.mute && file.audio.playback.unwrap_or(true);

        let default_emotion = env("LUMEN_DEFAULT_EMOTION")
            .or_else(|| file.conversation.default_emotion.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        // ~/.local/share/lumen on Linux
        let data_dir = env("LUMEN_DATA_DIR")
            .or_else(|| file.data_dir.clone())
            .map_or_else(default_data_dir, PathBuf::from);

        if overrides.mute {
            tracing::info!("playback muted via --mute");
        }

        Ok(Self {
            api_url,
            request_timeout,
            auto_listen,
            playback_enabled,
            data_dir,
            default_emotion,
        })
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("ai", "lumen", "lumen")
        .map_or_else(|| PathBuf::from(".lumen"), |d| d.data_dir().to_path_buf())
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::resolve(&LumenConfigFile::default(), &ConfigOverrides::default(), env_of(&[]))
                .unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.auto_listen);
        assert!(config.playback_enabled);
        assert!(config.default_emotion.is_none());
    }

    #[test]
    fn test_priority_cli_env_file() {
        let mut file = LumenConfigFile::default();
        file.backend.url = Some("http://file:1".to_string());

        let env = env_of(&[("LUMEN_API_URL", "http://env:2")]);
        let config = Config::resolve(&file, &ConfigOverrides::default(), &env).unwrap();
        assert_eq!(config.api_url, "http://env:2");

        let overrides = ConfigOverrides {
            api_url: Some("http://cli:3".to_string()),
            ..ConfigOverrides::default()
        };
        let config = Config::resolve(&file, &overrides, &env).unwrap();
        assert_eq!(config.api_url, "http://cli:3");

        let config = Config::resolve(&file, &ConfigOverrides::default(), env_of(&[])).unwrap();
        assert_eq!(config.api_url, "http://file:1");
    }

    #[test]
    fn test_rejects_non_http_url() {
        let overrides = ConfigOverrides {
            api_url: Some("localhost:8000".to_string()),
            ..ConfigOverrides::default()
        };
        let err = Config::resolve(&LumenConfigFile::default(), &overrides, env_of(&[]));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_timeout_from_env_and_validation() {
        let file = LumenConfigFile::default();
        let overrides = ConfigOverrides::default();

        let config =
            Config::resolve(&file, &overrides, env_of(&[("LUMEN_REQUEST_TIMEOUT_SECS", "5")]))
                .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        assert!(
            Config::resolve(&file, &overrides, env_of(&[("LUMEN_REQUEST_TIMEOUT_SECS", "0")]))
                .is_err()
        );
        assert!(
            Config::resolve(&file, &overrides, env_of(&[("LUMEN_REQUEST_TIMEOUT_SECS", "x")]))
                .is_err()
        );
    }

    #[test]
    fn test_flags_disable_features() {
        let mut file = LumenConfigFile::default();
        file.conversation.auto_listen = Some(true);

        let overrides = ConfigOverrides {
            mute: true,
            no_auto_listen: true,
            ..ConfigOverrides::default()
        };
        let config = Config::resolve(&file, &overrides, env_of(&[])).unwrap();
        assert!(!config.auto_listen);
        assert!(!config.playback_enabled);
    }

    #[test]
    fn test_default_emotion_trimmed() {
        let config = Config::resolve(
            &LumenConfigFile::default(),
            &ConfigOverrides::default(),
            env_of(&[("LUMEN_DEFAULT_EMOTION", " neutral ")]),
        )
        .unwrap();
        assert_eq!(config.default_emotion.as_deref(), Some("neutral"));
    }
}
