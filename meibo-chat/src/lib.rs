//! meibo-chat: live-chat reply pipeline
//!
//! Takes chat events in, decides which deserve a reply and runs each reply
//! as a serialized turn: generate, post in chat-sized chunks, speak, animate
//! the avatar, then cool down before the next one.

pub mod commands;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod pipeline;
pub mod trigger;

pub use commands::{Command, CommandAction, CommandRouter};
pub use config::PipelineConfig;
pub use cooldown::Cooldown;
pub use dispatcher::{chunk_reply, Dispatcher};
pub use error::{ChatError, DispatchError, Result};
pub use event::{ChatChannel, ChatEvent};
pub use orchestrator::{Orchestrator, TurnError, TurnReport};
pub use pipeline::ChatPipeline;
pub use trigger::TriggerFilter;
