//! Error types for Careflow

use thiserror::Error;

/// Result type alias using the Careflow error
pub type Result<T> = std::result::Result<T, Error>;

/// Careflow error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server error: HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Unexpected status: HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Only transport failures and server-side (5xx) errors qualify. Business
    /// rejections such as 409 conflicts are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::ServerError { .. })
    }

    /// Whether this error must abort the whole run regardless of step flags
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Error::MissingDependency(key.into())
    }
}
