use async_trait::async_trait;
use crate::config::*;
use crate::error::Result;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Check if API key is set
    fn has_api_key(&self) -> bool;

    /// Chat completion
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}
