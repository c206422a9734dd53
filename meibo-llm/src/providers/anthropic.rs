use async_trait::async_trait;
use crate::config::*;
use crate::error::{LLMError, Result};
use crate::providers::trait_impl::Provider as ProviderTrait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicProvider {
    api_key: Option<String>,
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            api_key: None,
            client: Client::new(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(api_key: String) -> Self {
        let mut provider = Self::new();
        provider.api_key = Some(api_key).filter(|k| !k.is_empty());
        provider
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LLMError::MissingApiKey("Anthropic".to_string()))
    }

    fn build_body(request: &ChatRequest) -> serde_json::Value {
        // Validate and sanitize model name
        let model = request.model
            .as_ref()
            .map(|m| {
                let sanitized: String = m.chars()
                    .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
                    .take(100)
                    .collect();
                if sanitized.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    sanitized
                }
            })
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut messages = Vec::new();
        let mut system = None;

        for msg in &request.messages {
            match msg.role {
                MessageRole::System => {
                    system = Some(msg.content.clone());
                }
                MessageRole::User => {
                    messages.push(json!({
                        "role": "user",
                        "content": msg.content
                    }));
                }
                MessageRole::Assistant => {
                    messages.push(json!({
                        "role": "assistant",
                        "content": msg.content
                    }));
                }
            }
        }

        let max_tokens = request.max_tokens
            .map(|t| t.min(4096))
            .unwrap_or(1024);

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
        });

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp.clamp(0.0, 1.0)); // Anthropic temperature range
        }

        body
    }

    fn parse_response(json: &serde_json::Value, requested_model: &str) -> Result<ChatResponse> {
        // Replies may be split over several text blocks
        let content: String = json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"].as_str() == Some("text"))
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LLMError::InvalidResponse("Response contained no text".to_string()));
        }

        let usage = json.get("usage").and_then(|u| {
            Some(Usage {
                prompt_tokens: u["input_tokens"].as_u64()? as u32,
                completion_tokens: u["output_tokens"].as_u64()? as u32,
                total_tokens: (u["input_tokens"].as_u64()? + u["output_tokens"].as_u64()?) as u32,
            })
        });

        Ok(ChatResponse {
            content,
            model: json["model"].as_str().unwrap_or(requested_model).to_string(),
            usage,
            finish_reason: json["stop_reason"].as_str().map(|s| s.to_string()),
        })
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderTrait for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let api_key = self.get_api_key()?;

        if request.messages.iter().all(|m| m.role == MessageRole::System) {
            return Err(LLMError::InvalidRequest("Request has no conversation messages".to_string()));
        }

        let body = Self::build_body(&request);
        let model = body["model"].as_str().unwrap_or(DEFAULT_MODEL).to_string();

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == 429 {
            return Err(LLMError::RateLimit);
        }

        if status == 401 || status == 403 {
            return Err(LLMError::AuthenticationFailed);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(500).collect();
            return Err(LLMError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let json: serde_json::Value = response.json().await?;
        Self::parse_response(&json, &model)
    }
}
