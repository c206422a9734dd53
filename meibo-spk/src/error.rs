//! Error types for meibo-spk

use thiserror::Error;

/// Speech output errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Invalid text: {0}")]
    InvalidText(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpeechError> for meibo_core::Error {
    fn from(err: SpeechError) -> Self {
        meibo_core::Error::Speech(err.to_string())
    }
}
