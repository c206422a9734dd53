//! Avatar link - connection state machine over an avatar backend
//!
//! The link owns the connection state and the reconnect policy. Parameter
//! failures never propagate as panics or aborted turns: they flip the link to
//! `Disconnected`, kick off a single reconnect attempt and are handed back to
//! the caller as values.

use crate::backend::AvatarBackend;
use crate::config::AvatarConfig;
use crate::error::AvatarError;
use meibo_core::SpeechPacing;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection state of the avatar link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarLinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a reconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Another task is already reconnecting; nothing was done
    AlreadyInProgress,
    Connected,
    Failed,
}

/// Clears the reconnect flag however the attempt ends.
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AvatarLink {
    backend: Arc<dyn AvatarBackend>,
    config: Arc<AvatarConfig>,
    pacing: SpeechPacing,
    state: RwLock<AvatarLinkState>,
    reconnecting: AtomicBool,
}

impl AvatarLink {
    pub fn new(backend: Arc<dyn AvatarBackend>, config: AvatarConfig) -> Result<Self, AvatarError> {
        config.validate().map_err(AvatarError::Config)?;
        Ok(Self {
            backend,
            config: Arc::new(config),
            pacing: SpeechPacing::default(),
            state: RwLock::new(AvatarLinkState::Disconnected),
            reconnecting: AtomicBool::new(false),
        })
    }

    /// Use `pacing` to size talking animations. An out-of-range rate is
    /// ignored and the default kept.
    pub fn with_pacing(mut self, pacing: SpeechPacing) -> Self {
        match pacing.validate() {
            Ok(()) => self.pacing = pacing,
            Err(e) => warn!("Ignoring avatar speech pacing: {}", e),
        }
        self
    }

    pub fn state(&self) -> AvatarLinkState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == AvatarLinkState::Connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::Acquire)
    }

    fn set_state(&self, state: AvatarLinkState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!("Avatar link {:?} -> {:?}", previous, state);
        }
    }

    /// Connect to the backend.
    ///
    /// Failure leaves the link `Disconnected` and is returned to the caller;
    /// the pipeline keeps running without animation.
    pub async fn connect(&self) -> Result<(), AvatarError> {
        self.set_state(AvatarLinkState::Connecting);
        match self.backend.connect().await {
            Ok(()) => {
                self.set_state(AvatarLinkState::Connected);
                info!("Avatar link connected via {}", self.backend.name());
                Ok(())
            }
            Err(e) => {
                self.set_state(AvatarLinkState::Disconnected);
                warn!("Avatar link failed to connect via {}: {}", self.backend.name(), e);
                Err(e)
            }
        }
    }

    /// Close the backend connection
    pub async fn disconnect(&self) {
        if let Err(e) = self.backend.close().await {
            warn!("Avatar backend close failed: {}", e);
        }
        self.set_state(AvatarLinkState::Disconnected);
        info!("Avatar link disconnected");
    }

    /// Reconnect after a failure. Concurrent calls collapse into one attempt.
    pub async fn reconnect(&self) -> ReconnectOutcome {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Avatar reconnect already in progress");
            return ReconnectOutcome::AlreadyInProgress;
        }
        let _guard = ReconnectGuard(&self.reconnecting);

        info!("Avatar connection lost, reconnecting");
        if let Err(e) = self.backend.close().await {
            debug!("Closing stale avatar connection failed: {}", e);
        }
        self.set_state(AvatarLinkState::Disconnected);

        tokio::time::sleep(self.config.reconnect_backoff()).await;

        match self.connect().await {
            Ok(()) => ReconnectOutcome::Connected,
            Err(_) => ReconnectOutcome::Failed,
        }
    }

    /// Open the mouth to `level`, hold it for `hold`, then close it.
    ///
    /// A no-op unless connected. Any backend failure disconnects the link and
    /// triggers a reconnect before the error is returned.
    pub async fn set_mouth_openness(&self, level: f64, hold: Duration) -> Result<(), AvatarError> {
        if !self.is_connected() {
            return Ok(());
        }

        let result = self.pulse_mouth(level, hold).await;
        if let Err(ref e) = result {
            warn!("Avatar mouth control failed: {}", e);
            self.set_state(AvatarLinkState::Disconnected);
            self.reconnect().await;
        }
        result
    }

    async fn pulse_mouth(&self, level: f64, hold: Duration) -> Result<(), AvatarError> {
        let parameter = &self.config.mouth_parameter;
        self.backend.set_parameter(parameter, level).await?;
        tokio::time::sleep(hold).await;
        self.backend.set_parameter(parameter, self.config.closed_value).await
    }

    /// Flap the mouth for roughly as long as `text` takes to say.
    ///
    /// Returns the number of completed open/close cycles. When the link is
    /// down one reconnect is attempted first; if that does not bring it back
    /// the animation is skipped.
    pub async fn animate_talking(&self, text: &str) -> Result<usize, AvatarError> {
        if !self.is_connected() && !self.is_reconnecting() {
            self.reconnect().await;
        }
        if !self.is_connected() {
            info!("Avatar not connected, skipping animation");
            return Ok(0);
        }

        let half_cycle = self.config.mouth_cycle();
        let duration = self.pacing.estimate(text);
        let cycles = (duration.as_millis() / (2 * half_cycle.as_millis())) as usize;
        debug!("Animating {} mouth cycles over {:?}", cycles, duration);

        for completed in 0..cycles {
            if !self.is_connected() {
                info!("Avatar connection lost during animation after {} cycles", completed);
                return Ok(completed);
            }
            self.set_mouth_openness(self.config.open_value, half_cycle).await?;
            tokio::time::sleep(half_cycle).await;
        }

        Ok(cycles)
    }
}
