//! Fire-and-forget speech playback for the reply pipeline

use crate::config::{SpeechConfig, TtsEngineKind, VoiceConfig};
use crate::engines::native::NativeTtsEngine;
use crate::engines::TtsEngine;
use crate::error::SpeechError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Speech output as seen by the reply pipeline.
///
/// `speak` must return immediately; playback happens elsewhere and its
/// outcome is only logged.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Flip speech on/off, returning the new state
    fn toggle(&self) -> bool;

    fn is_enabled(&self) -> bool;
}

/// Plays replies through a TTS engine on detached tasks.
///
/// Utterances never overlap: each task waits for the previous one to finish
/// before starting playback.
pub struct SpeechPlayer {
    engine: Option<Arc<dyn TtsEngine>>,
    voice: Arc<VoiceConfig>,
    enabled: AtomicBool,
    playback: Arc<Semaphore>,
    max_text_len: usize,
}

impl SpeechPlayer {
    /// Create a player for the configured engine.
    ///
    /// A missing engine is not an error: the player starts disabled and
    /// `speak` becomes a no-op.
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;

        let engine: Option<Arc<dyn TtsEngine>> = match config.engine {
            TtsEngineKind::Native => {
                let native = NativeTtsEngine::new_with_config(config.rate, config.volume);
                if native.is_available() {
                    Some(Arc::new(native))
                } else {
                    None
                }
            }
        };

        let enabled = config.enabled && engine.is_some();
        if config.enabled && engine.is_none() {
            warn!("Speech enabled in config but no engine is available, disabling");
        }
        info!("Speech output {}", if enabled { "enabled" } else { "disabled" });

        Ok(Self::from_parts(engine, config, enabled))
    }

    /// Create a player around an explicit engine
    pub fn with_engine(engine: Arc<dyn TtsEngine>, config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;
        let enabled = config.enabled;
        Ok(Self::from_parts(Some(engine), config, enabled))
    }

    fn from_parts(engine: Option<Arc<dyn TtsEngine>>, config: SpeechConfig, enabled: bool) -> Self {
        Self {
            engine,
            voice: Arc::new(config.voice),
            enabled: AtomicBool::new(enabled),
            playback: Arc::new(Semaphore::new(1)),
            max_text_len: config.max_text_len,
        }
    }

    /// Speak and wait for playback to finish.
    pub async fn speak_and_wait(&self, text: &str) -> Result<(), SpeechError> {
        let engine = self.engine()?;
        let text = self.prepare(text)?;
        let _permit = self
            .playback
            .acquire()
            .await
            .map_err(|e| SpeechError::Playback(format!("Playback queue closed: {}", e)))?;
        engine.speak(&text, &self.voice).await
    }

    /// Whether an utterance is currently playing
    pub fn is_playing(&self) -> bool {
        self.playback.available_permits() == 0
    }

    fn engine(&self) -> Result<Arc<dyn TtsEngine>, SpeechError> {
        self.engine
            .clone()
            .ok_or_else(|| SpeechError::Engine("No TTS engine available".to_string()))
    }

    fn prepare(&self, text: &str) -> Result<String, SpeechError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SpeechError::InvalidText("Text cannot be empty".to_string()));
        }
        Ok(trimmed.chars().take(self.max_text_len).collect())
    }
}

impl SpeechOutput for SpeechPlayer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if !self.is_enabled() {
            debug!("Speech disabled, skipping utterance");
            return Ok(());
        }

        let engine = self.engine()?;
        let text = self.prepare(text)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Playback(format!("No async runtime for playback: {}", e)))?;

        let voice = Arc::clone(&self.voice);
        let playback = Arc::clone(&self.playback);

        runtime.spawn(async move {
            let _permit = match playback.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Speech playback queue closed: {}", e);
                    return;
                }
            };
            if let Err(e) = engine.speak(&text, &voice).await {
                error!("Speech playback failed via {}: {}", engine.name(), e);
            }
        });

        Ok(())
    }

    fn toggle(&self) -> bool {
        if self.engine.is_none() {
            warn!("Cannot enable speech: no TTS engine available");
            return false;
        }
        let enabled = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        info!("Speech {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
