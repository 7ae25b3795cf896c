//! Error types for the Lumen voice client

use thiserror::Error;

/// Result type alias for Lumen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Lumen voice client
#[derive(Debug, Error)]
pub enum Error {
    /// Backend unreachable, or it refused to create a session
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend reachable but rejected the interaction
    #[error("interaction error: {0}")]
    Interaction(String),

    /// Capture collaborator did not produce an audio payload
    #[error("capture error: {0}")]
    Capture(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Preference store error
    #[error("preferences error: {0}")]
    Preferences(String),

    /// Controller runtime is no longer running
    #[error("controller stopped")]
    ControllerStopped,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Plain text suitable for the presentation error slot
    ///
    /// Backend and capture errors yield their message without the category prefix,
    /// so a rejected interaction reads exactly as the backend phrased it.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(msg)
            | Self::Interaction(msg)
            | Self::Capture(msg)
            | Self::Audio(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
