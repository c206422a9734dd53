pub mod error;
pub mod pacing;

pub use error::{Error, Result};
pub use pacing::{SpeechPacing, MAX_WORDS_PER_SECOND, MIN_WORDS_PER_SECOND};
