//! Inbound chat events and the outbound channel they reply through

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Outbound side of a chat channel.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Post one message. Messages longer than the platform limit may be
    /// rejected; callers chunk first.
    async fn send(&self, text: &str) -> Result<()>;

    /// Channel name for logging
    fn name(&self) -> &str;
}

/// A single chat message together with the means to answer it.
#[derive(Clone)]
pub struct ChatEvent {
    pub speaker: String,
    pub text: String,
    /// Moderator or broadcaster
    pub is_moderator: bool,
    pub channel: Arc<dyn ChatChannel>,
}

impl ChatEvent {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, channel: Arc<dyn ChatChannel>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            is_moderator: false,
            channel,
        }
    }

    pub fn moderator(mut self) -> Self {
        self.is_moderator = true;
        self
    }

    /// Same speaker and channel, different text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEvent")
            .field("speaker", &self.speaker)
            .field("text", &self.text)
            .field("is_moderator", &self.is_moderator)
            .field("channel", &self.channel.name())
            .finish()
    }
}
