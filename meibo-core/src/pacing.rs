//! Word-count based speech duration estimate.
//!
//! Neither the speech engine nor the avatar backend reports how long playback
//! actually takes, so both the turn loop and the mouth animation size their
//! waits from the word count of the reply at a fixed speaking rate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slowest accepted speaking rate, about one word per minute
pub const MIN_WORDS_PER_SECOND: f64 = 0.01;

/// Fastest accepted speaking rate
pub const MAX_WORDS_PER_SECOND: f64 = 50.0;

/// Speaking rate used to estimate playback length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechPacing {
    /// Words spoken per second (150 WPM = 2.5)
    pub words_per_second: f64,
}

impl Default for SpeechPacing {
    fn default() -> Self {
        Self {
            words_per_second: 2.5,
        }
    }
}

impl SpeechPacing {
    pub fn new(words_per_second: f64) -> Self {
        Self { words_per_second }
    }

    /// Build from a words-per-minute rate, as speech engines are configured.
    pub fn from_words_per_minute(wpm: u32) -> Self {
        Self::new(f64::from(wpm) / 60.0)
    }

    /// Estimated time to speak `text`. Saturates instead of overflowing.
    pub fn estimate(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count();
        if words == 0 || !self.is_valid_rate() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(words as f64 / self.words_per_second).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.is_valid_rate() {
            return Err("Words per second must be a positive finite number".to_string());
        }
        if !(MIN_WORDS_PER_SECOND..=MAX_WORDS_PER_SECOND).contains(&self.words_per_second) {
            return Err(format!(
                "Words per second must be between {} and {}",
                MIN_WORDS_PER_SECOND, MAX_WORDS_PER_SECOND
            ));
        }
        Ok(())
    }

    fn is_valid_rate(&self) -> bool {
        self.words_per_second.is_finite() && self.words_per_second > 0.0
    }
}
