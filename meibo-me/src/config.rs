//! Configuration for the avatar link

use crate::error::AvatarError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Avatar link configuration (VTube Studio plugin settings)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Drive the avatar at all; when off the pipeline skips animation
    pub enabled: bool,

    /// VTube Studio API host
    pub host: String,

    /// VTube Studio API port (default 8001)
    pub port: u16,

    /// Plugin name shown in the VTube Studio permission prompt
    pub plugin_name: String,

    /// Plugin developer shown in the VTube Studio permission prompt
    pub plugin_developer: String,

    /// File caching the authentication token between runs
    pub token_path: PathBuf,

    /// Parameter driven for lip sync
    pub mouth_parameter: String,

    /// Parameter value for an open mouth
    pub open_value: f64,

    /// Parameter value for a closed mouth
    pub closed_value: f64,

    /// Length of each open and each closed half of a mouth cycle
    pub mouth_cycle_ms: u64,

    /// Wait before reconnecting after a failure
    pub reconnect_backoff_ms: u64,

    /// Timeout for a single API request, handshake steps included
    pub request_timeout_secs: u64,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 8001,
            plugin_name: "Project Mei".to_string(),
            plugin_developer: "MeiDev".to_string(),
            token_path: PathBuf::from("token.txt"),
            mouth_parameter: "MouthOpen".to_string(),
            open_value: 1.0,
            closed_value: 0.0,
            mouth_cycle_ms: 125,
            reconnect_backoff_ms: 1000,
            request_timeout_secs: 10,
        }
    }
}

impl AvatarConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() || self.host.len() > 253 {
            return Err("Avatar host must be 1-253 characters".to_string());
        }
        if self.port == 0 {
            return Err("Avatar port cannot be 0".to_string());
        }

        // VTube Studio limits plugin name and developer to 3-32 characters
        for (label, value) in [
            ("Plugin name", &self.plugin_name),
            ("Plugin developer", &self.plugin_developer),
        ] {
            let len = value.chars().count();
            if !(3..=32).contains(&len) {
                return Err(format!("{} must be 3-32 characters", label));
            }
        }

        if self.token_path.as_os_str().is_empty() {
            return Err("Token path cannot be empty".to_string());
        }

        if self.mouth_parameter.is_empty() || self.mouth_parameter.len() > 64 {
            return Err("Mouth parameter must be 1-64 characters".to_string());
        }
        if !self
            .mouth_parameter
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err("Mouth parameter contains invalid characters".to_string());
        }

        for (label, value) in [("Open value", self.open_value), ("Closed value", self.closed_value)] {
            if !(-1_000_000.0..=1_000_000.0).contains(&value) {
                return Err(format!("{} out of range", label));
            }
        }

        if self.mouth_cycle_ms == 0 || self.mouth_cycle_ms > 10_000 {
            return Err("Mouth cycle must be between 1 and 10000 ms".to_string());
        }
        if self.reconnect_backoff_ms > 60_000 {
            return Err("Reconnect backoff too large (max 60000 ms)".to_string());
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err("Request timeout must be between 1 and 300 seconds".to_string());
        }

        Ok(())
    }

    /// WebSocket endpoint of the VTube Studio API
    pub fn endpoint(&self) -> Result<Url, AvatarError> {
        let url = Url::parse(&format!("ws://{}:{}", self.host, self.port))?;
        Ok(url)
    }

    pub fn mouth_cycle(&self) -> Duration {
        Duration::from_millis(self.mouth_cycle_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
