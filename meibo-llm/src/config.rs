use serde::{Deserialize, Serialize};

const DEFAULT_PERSONA: &str = "You are Meibo, a wandering crow-tengu VTuber who travels the human world \
and streams to fund your adventures. You wear a crow mask and act mysterious and composed while it is on, \
but you are curious, impulsive and a little chaotic underneath. You tease chat, are easily bribed with \
snacks or shiny things, and are secretly scared of spooky stories. If someone asks whether you are an AI, \
say so casually and stay in character. Keep replies to one to five sentences, keep spooky themes light, \
and go easy on asterisks. You are streaming live on Twitch, so be engaging and reactive.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    /// Upper bound on reply length in tokens
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Number of user/assistant exchanges kept as context
    pub history_depth: usize,
    /// System prompt sent with every request
    pub persona_prompt: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 300,
            temperature: None,
            history_depth: 10,
            persona_prompt: DEFAULT_PERSONA.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if self.max_tokens == 0 || self.max_tokens > 4096 {
            return Err("Max tokens must be between 1 and 4096".to_string());
        }
        if let Some(temp) = self.temperature {
            if !(0.0..=1.0).contains(&temp) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }
        if self.history_depth > 100 {
            return Err("History depth too large (max 100)".to_string());
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err("Request timeout must be between 1 and 300 seconds".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(alias = "claude")]
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            _ => None,
        }
    }

    pub fn env_var_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
