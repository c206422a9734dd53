//! Configuration for speech output

use serde::{Deserialize, Serialize};

/// Speech output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak replies aloud
    pub enabled: bool,

    /// Preferred TTS engine
    pub engine: TtsEngineKind,

    /// Voice settings
    pub voice: VoiceConfig,

    /// Speech rate (words per minute, 1-500, default 150)
    pub rate: u32,

    /// Volume (0.0-1.0, default 0.9)
    pub volume: f32,

    /// Maximum characters handed to the engine per utterance
    pub max_text_len: usize,
}

/// TTS Engine type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngineKind {
    /// Native platform TTS (espeak-ng, macOS `say`, Windows SAPI)
    Native,
}

/// Voice configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice name/identifier (engine specific, e.g. "en+f3" or "Samantha")
    pub name: Option<String>,

    /// Language code (e.g., "en-US", "es-ES"), picks the voice when no name is set
    pub language: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: TtsEngineKind::Native,
            voice: VoiceConfig::default(),
            rate: 150,
            volume: 0.9,
            max_text_len: 10_000,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            language: "en-US".to_string(),
        }
    }
}

impl VoiceConfig {
    /// Validate voice configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.language.is_empty() {
            return Err("Language code cannot be empty".to_string());
        }

        if self.language.len() > 32 {
            return Err("Language code too long (max 32 chars)".to_string());
        }

        if !self.language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("Language code contains invalid characters (only alphanumeric and '-' allowed)".to_string());
        }

        if let Some(ref name) = self.name {
            if name.is_empty() {
                return Err("Voice name cannot be empty if provided".to_string());
            }

            if name.len() > 256 {
                return Err("Voice name too long (max 256 chars)".to_string());
            }

            if name.chars().any(|c| c == '\0' || c.is_control()) {
                return Err("Voice name contains invalid characters".to_string());
            }
        }

        Ok(())
    }
}

impl SpeechConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate == 0 || self.rate > 500 {
            return Err("Speech rate must be between 1 and 500 WPM".to_string());
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err("Volume must be between 0.0 and 1.0".to_string());
        }

        if self.max_text_len == 0 || self.max_text_len > 100_000 {
            return Err("Max text length must be between 1 and 100000".to_string());
        }

        self.voice.validate()?;

        Ok(())
    }
}
