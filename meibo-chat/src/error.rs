//! Error types for meibo-chat

use meibo_core::Error as CoreError;
use thiserror::Error;

/// Chat delivery errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Chat channel closed")]
    Closed,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ChatError> for CoreError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::Chat(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// A reply that was only partly delivered
#[derive(Error, Debug)]
#[error("Sent {sent} of {total} chunks: {source}")]
pub struct DispatchError {
    pub sent: usize,
    pub total: usize,
    #[source]
    pub source: ChatError,
}
