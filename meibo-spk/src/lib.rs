//! meibo-spk: Speech output for chat replies
//!
//! Provides text-to-speech playback with:
//! - Native TTS engines (espeak-ng on Linux, `say` on macOS, SAPI on Windows)
//! - A fire-and-forget `SpeechOutput` seam used by the reply pipeline
//! - Runtime on/off toggle

pub mod error;
pub mod config;
pub mod engines;
pub mod player;

pub use error::SpeechError;
pub use config::{SpeechConfig, VoiceConfig, TtsEngineKind};
pub use engines::TtsEngine;
pub use player::{SpeechOutput, SpeechPlayer};
