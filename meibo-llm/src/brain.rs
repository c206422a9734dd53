//! Reply generation with a persona prompt and rolling conversation history.

use crate::config::{ChatRequest, LlmConfig, Message, Provider};
use crate::error::{LLMError, Result};
use crate::providers::{AnthropicProvider, ProviderTrait};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Produces a chat reply for a (speaker, message) pair.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, speaker: &str, text: &str) -> Result<String>;

    /// Forget any conversation context kept between calls.
    fn clear_history(&self) {}
}

/// Language-model backed reply generator.
///
/// Keeps the last `history_depth` exchanges so replies can refer back to
/// earlier chat. Failed calls leave the history untouched.
pub struct ReplyBrain {
    provider: Arc<dyn ProviderTrait>,
    config: LlmConfig,
    history: Mutex<VecDeque<Message>>,
}

impl ReplyBrain {
    pub fn new(config: LlmConfig, provider: Arc<dyn ProviderTrait>) -> Result<Self> {
        config.validate().map_err(LLMError::Config)?;
        info!("Reply brain initialized with provider: {}", provider.name());
        Ok(Self {
            provider,
            config,
            history: Mutex::new(VecDeque::new()),
        })
    }

    /// Build the configured provider, reading its API key from the environment.
    pub fn from_env(config: LlmConfig) -> Result<Self> {
        let provider: Arc<dyn ProviderTrait> = match config.provider {
            Provider::Anthropic => {
                let key = std::env::var(Provider::Anthropic.env_var_name())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| LLMError::MissingApiKey(Provider::Anthropic.env_var_name().to_string()))?;
                Arc::new(
                    AnthropicProvider::with_api_key(key)
                        .with_timeout(Duration::from_secs(config.request_timeout_secs)),
                )
            }
        };
        Self::new(config, provider)
    }

    /// Generate a reply to `text` from `speaker`.
    pub async fn generate_response(&self, speaker: &str, text: &str) -> Result<String> {
        let user_prompt = format!("{}: {}", speaker, text);

        let mut messages = Vec::with_capacity(self.config.history_depth * 2 + 2);
        messages.push(Message::system(self.config.persona_prompt.clone()));
        messages.extend(self.history.lock().iter().cloned());
        messages.push(Message::user(user_prompt.clone()));

        let request = ChatRequest {
            messages,
            model: Some(self.config.model.clone()),
            temperature: self.config.temperature,
            max_tokens: Some(self.config.max_tokens),
        };

        let response = self.provider.chat(request).await?;
        let reply = response.content.trim().to_string();
        if reply.is_empty() {
            return Err(LLMError::InvalidResponse("Empty reply".to_string()));
        }

        self.update_history(user_prompt, reply.clone());
        debug!("Generated reply ({} chars) for {}", reply.len(), speaker);
        Ok(reply)
    }

    fn update_history(&self, user_message: String, assistant_message: String) {
        let mut history = self.history.lock();
        history.push_back(Message::user(user_message));
        history.push_back(Message::assistant(assistant_message));

        let limit = self.config.history_depth * 2;
        while history.len() > limit {
            history.pop_front();
        }
    }

    pub fn clear(&self) {
        self.history.lock().clear();
        info!("Conversation history cleared");
    }

    /// Messages currently kept as context (two per exchange).
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl ReplyGenerator for ReplyBrain {
    async fn generate_reply(&self, speaker: &str, text: &str) -> Result<String> {
        self.generate_response(speaker, text).await
    }

    fn clear_history(&self) {
        self.clear();
    }
}
