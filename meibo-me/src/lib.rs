//! meibo-me: avatar lip sync for the reply pipeline
//!
//! Provides:
//! - An `AvatarBackend` seam for animation backends
//! - A VTube Studio backend speaking the public WebSocket API
//! - `AvatarLink`, the connection state machine with single-flight reconnects
//!   and word-count paced talking animation

pub mod backend;
pub mod config;
pub mod error;
pub mod link;
pub mod vts;

pub use backend::AvatarBackend;
pub use config::AvatarConfig;
pub use error::AvatarError;
pub use link::{AvatarLink, AvatarLinkState, ReconnectOutcome};
pub use vts::VtsBackend;
