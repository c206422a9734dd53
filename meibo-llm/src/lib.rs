//! meibo-llm: reply generation for live chat
//!
//! Wraps a language-model provider with a persona prompt and a bounded
//! conversation history, exposed through the `ReplyGenerator` trait.

pub mod config;
pub mod error;
pub mod providers;
pub mod brain;


pub use config::*;
pub use error::*;
pub use brain::{ReplyBrain, ReplyGenerator};
pub use providers::{AnthropicProvider, ProviderTrait};
