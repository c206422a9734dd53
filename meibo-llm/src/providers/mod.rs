pub mod trait_impl;
pub mod anthropic;

pub use trait_impl::Provider as ProviderTrait;
pub use anthropic::AnthropicProvider;
pub use crate::config::Provider;
