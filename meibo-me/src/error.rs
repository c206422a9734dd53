//! Error types for meibo-me

use meibo_core::Error as CoreError;
use thiserror::Error;

/// Avatar link errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Avatar backend not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<AvatarError> for CoreError {
    fn from(err: AvatarError) -> Self {
        match err {
            AvatarError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::Avatar(other.to_string()),
        }
    }
}
