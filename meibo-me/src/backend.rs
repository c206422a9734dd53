//! Avatar backend seam

use crate::error::AvatarError;
use async_trait::async_trait;

/// Trait for animation backends driven by the avatar link.
///
/// Implementations use interior mutability: the link calls them through a
/// shared reference, possibly from several tasks at once.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    /// Open the connection and complete any handshake
    async fn connect(&self) -> Result<(), AvatarError>;

    /// Set a single model parameter
    async fn set_parameter(&self, name: &str, value: f64) -> Result<(), AvatarError>;

    /// Drop the connection; closing an already closed backend is not an error
    async fn close(&self) -> Result<(), AvatarError>;

    fn name(&self) -> &str;
}
