//! Configuration for the reply pipeline

use meibo_core::SpeechPacing;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard per-message limit of the chat platform
pub const PLATFORM_MESSAGE_LIMIT: usize = 500;

pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, my connection is a bit glitchy right now... try again?";

/// Reply pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Substrings that make a message worth answering (case-insensitive)
    pub trigger_tokens: Vec<String>,

    /// The bot's own chat name; its messages are ignored
    pub bot_nick: String,

    /// Reply posted when generation fails
    pub fallback_reply: String,

    /// Longest chunk posted to chat, in characters
    pub max_chunk_len: usize,

    /// Delay between consecutive chunks of one reply
    pub chunk_pacing_ms: u64,

    /// Pause after handing the reply to speech and animation
    pub post_speech_buffer_ms: u64,

    /// Added to the word-count speech estimate
    pub speech_tail_ms: u64,

    /// Speaking rate for the speech estimate. Unset means the speech
    /// engine's rate is used, see `speech_pacing`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<SpeechPacing>,

    /// Minimum idle time between turns
    pub cooldown_ms: u64,

    /// Upper bound on reply generation and on each chat send
    pub step_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            trigger_tokens: vec!["meibo".to_string(), "mei".to_string()],
            bot_nick: "muei_bot".to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            max_chunk_len: 450,
            chunk_pacing_ms: 1000,
            post_speech_buffer_ms: 1000,
            speech_tail_ms: 1000,
            pacing: None,
            cooldown_ms: 3000,
            step_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_len == 0 || self.max_chunk_len > PLATFORM_MESSAGE_LIMIT {
            return Err(format!(
                "Max chunk length must be between 1 and {}",
                PLATFORM_MESSAGE_LIMIT
            ));
        }

        if self.trigger_tokens.iter().any(|t| t.trim().is_empty()) {
            return Err("Trigger tokens cannot be empty strings".to_string());
        }

        let fallback = self.fallback_reply.trim();
        if fallback.is_empty() {
            return Err("Fallback reply cannot be empty".to_string());
        }
        if fallback.chars().count() > self.max_chunk_len {
            return Err("Fallback reply must fit in a single chunk".to_string());
        }

        if self.step_timeout_secs == 0 || self.step_timeout_secs > 600 {
            return Err("Step timeout must be between 1 and 600 seconds".to_string());
        }

        for (label, ms) in [
            ("Chunk pacing", self.chunk_pacing_ms),
            ("Post-speech buffer", self.post_speech_buffer_ms),
            ("Speech tail", self.speech_tail_ms),
            ("Cooldown", self.cooldown_ms),
        ] {
            if ms > 600_000 {
                return Err(format!("{} too large (max 600000 ms)", label));
            }
        }

        if let Some(pacing) = &self.pacing {
            pacing.validate()?;
        }

        Ok(())
    }

    /// Speaking rate used for post-speech waits
    pub fn speech_pacing(&self) -> SpeechPacing {
        self.pacing.unwrap_or_default()
    }

    /// Fill in an unset speaking rate from the speech engine's words per minute
    pub fn follow_speech_rate(&mut self, words_per_minute: u32) {
        if self.pacing.is_none() {
            self.pacing = Some(SpeechPacing::from_words_per_minute(words_per_minute));
        }
    }

    pub fn chunk_pacing(&self) -> Duration {
        Duration::from_millis(self.chunk_pacing_ms)
    }

    pub fn post_speech_buffer(&self) -> Duration {
        Duration::from_millis(self.post_speech_buffer_ms)
    }

    pub fn speech_tail(&self) -> Duration {
        Duration::from_millis(self.speech_tail_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
