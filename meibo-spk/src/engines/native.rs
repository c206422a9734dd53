//! Native platform TTS engine
//!
//! Drives the platform's command-line speech tool and plays straight to the
//! default audio device: espeak-ng on Linux, `say` on macOS, SAPI through
//! PowerShell on Windows.

use crate::config::VoiceConfig;
use crate::engines::{sanitize_text, TtsEngine};
use crate::error::SpeechError;
use async_trait::async_trait;
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Command-line speech tool used by the native engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeBackend {
    Espeak,
    Say,
    Sapi,
}

/// Native TTS engine (platform-specific)
pub struct NativeTtsEngine {
    backend: Option<NativeBackend>,
    rate: u32,
    volume: f32,
    max_text_len: usize,
}

impl NativeTtsEngine {
    pub fn new() -> Self {
        Self::new_with_config(150, 0.9)
    }

    pub fn new_with_config(rate: u32, volume: f32) -> Self {
        let backend = detect_backend();
        match backend {
            Some(b) => info!("Native TTS engine initialized ({:?})", b),
            None => warn!("No native TTS tool found, speech output unavailable"),
        }
        Self::with_backend(backend, rate, volume)
    }

    pub fn with_backend(backend: Option<NativeBackend>, rate: u32, volume: f32) -> Self {
        Self {
            backend,
            rate: rate.clamp(1, 500),
            volume: volume.clamp(0.0, 1.0),
            max_text_len: 100_000,
        }
    }

    pub fn backend(&self) -> Option<NativeBackend> {
        self.backend
    }

    /// Program and arguments that speak `text` with the given backend.
    pub fn command_for(
        &self,
        backend: NativeBackend,
        text: &str,
        voice: &VoiceConfig,
    ) -> (String, Vec<String>) {
        let voice_name = voice.name.as_deref().map(sanitize_voice_name).filter(|v| !v.is_empty());

        match backend {
            NativeBackend::Espeak => {
                let mut args = vec!["-s".to_string(), self.rate.to_string()];
                // espeak-ng amplitude is 0-200, 100 is normal
                let amplitude = (self.volume * 200.0).round() as u32;
                args.push("-a".to_string());
                args.push(amplitude.min(200).to_string());
                // espeak-ng takes either a voice or a language code
                args.push("-v".to_string());
                args.push(voice_name.unwrap_or_else(|| voice.language.to_lowercase()));
                args.push(text.to_string());
                ("espeak-ng".to_string(), args)
            }
            NativeBackend::Say => {
                // `say` selects voices by name only
                let mut args = vec!["-r".to_string(), self.rate.to_string()];
                if let Some(v) = voice_name {
                    args.push("-v".to_string());
                    args.push(v);
                }
                args.push(text.to_string());
                ("say".to_string(), args)
            }
            NativeBackend::Sapi => {
                // SAPI rate is -10..10 around a ~150 WPM default
                let sapi_rate = ((self.rate as i32 - 150) / 25).clamp(-10, 10);
                let sapi_volume = (self.volume * 100.0).round() as u32;
                let mut script = format!(
                    "Add-Type -AssemblyName System.Speech; \
                     $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                     $s.Rate = {}; $s.Volume = {}; ",
                    sapi_rate,
                    sapi_volume.min(100)
                );
                match voice_name {
                    Some(v) => script.push_str(&format!("$s.SelectVoice(\"{}\"); ", escape_powershell(&v))),
                    None => script.push_str(&format!(
                        "$s.SelectVoiceByHints('NotSet', 'NotSet', 0, \
                         [System.Globalization.CultureInfo]::GetCultureInfo(\"{}\")); ",
                        escape_powershell(&voice.language)
                    )),
                }
                script.push_str(&format!("$s.Speak(\"{}\")", escape_powershell(text)));
                (
                    "powershell".to_string(),
                    vec!["-NoProfile".to_string(), "-Command".to_string(), script],
                )
            }
        }
    }
}

impl Default for NativeTtsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsEngine for NativeTtsEngine {
    async fn speak(&self, text: &str, voice: &VoiceConfig) -> Result<(), SpeechError> {
        let backend = self
            .backend
            .ok_or_else(|| SpeechError::Engine("Native TTS engine not available".to_string()))?;

        let sanitized = sanitize_text(text, self.max_text_len)?;
        let (program, args) = self.command_for(backend, &sanitized, voice);
        debug!("Speaking {} chars via {}", sanitized.len(), program);

        let output = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SpeechError::Engine(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr).chars().take(500).collect();
            return Err(SpeechError::Playback(format!("{} failed: {}", program, stderr.trim())));
        }

        Ok(())
    }

    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn name(&self) -> &str {
        "native"
    }
}

fn detect_backend() -> Option<NativeBackend> {
    #[cfg(target_os = "linux")]
    {
        let available = std::process::Command::new("espeak-ng")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        return available.then_some(NativeBackend::Espeak);
    }

    #[cfg(target_os = "macos")]
    {
        return Some(NativeBackend::Say);
    }

    #[cfg(target_os = "windows")]
    {
        return Some(NativeBackend::Sapi);
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

fn sanitize_voice_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '+' | '.'))
        .take(256)
        .collect::<String>()
        .trim()
        .to_string()
}

fn escape_powershell(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("`\""),
            '$' => escaped.push_str("`$"),
            '`' => escaped.push_str("``"),
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}
