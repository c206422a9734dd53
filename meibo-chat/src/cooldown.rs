//! Minimum idle time between conversational turns

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Single next-eligible-time rate limiter.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    next_eligible: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_eligible: Mutex::new(None),
        }
    }

    /// Start a cooldown period from now
    pub fn begin(&self) -> Instant {
        let next = Instant::now() + self.period;
        *self.next_eligible.lock() = Some(next);
        next
    }

    /// Time left until the next turn may start
    pub fn remaining(&self) -> Duration {
        self.next_eligible
            .lock()
            .map(|next| next.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_ready(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleep until the cooldown has elapsed
    pub async fn wait_ready(&self) {
        let next = *self.next_eligible.lock();
        if let Some(next) = next {
            tokio::time::sleep_until(next).await;
        }
    }
}
