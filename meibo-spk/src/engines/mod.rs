//! TTS engine implementations

pub mod native;

use crate::config::VoiceConfig;
use crate::error::SpeechError;
use async_trait::async_trait;

/// Trait for TTS engines that play speech on the local audio device
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Speak `text`, returning once playback has finished
    async fn speak(&self, text: &str, voice: &VoiceConfig) -> Result<(), SpeechError>;

    /// Check if engine is available
    fn is_available(&self) -> bool;

    /// Get engine name
    fn name(&self) -> &str;
}

/// Strip characters that engines either choke on or would read as options.
pub fn sanitize_text(text: &str, max_len: usize) -> Result<String, SpeechError> {
    if text.contains('\0') {
        return Err(SpeechError::InvalidText("Text contains null bytes".to_string()));
    }

    let sanitized: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max_len)
        .collect();
    let sanitized = sanitized
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .trim_end();

    if sanitized.is_empty() {
        return Err(SpeechError::InvalidText("Text is empty after sanitization".to_string()));
    }
    Ok(sanitized.to_string())
}
