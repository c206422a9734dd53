//! Layered settings: defaults, then `meibo.toml`, then `MEIBO__*` variables

use config::{Config, Environment, File, FileFormat};
use meibo_chat::PipelineConfig;
use meibo_core::Error as CoreError;
use meibo_llm::LlmConfig;
use meibo_me::AvatarConfig;
use meibo_spk::SpeechConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "meibo.toml";
pub const ENV_PREFIX: &str = "MEIBO";

/// Every setting of the bot, one section per crate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeiboSettings {
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub avatar: AvatarConfig,
    pub pipeline: PipelineConfig,
}

impl MeiboSettings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };

        let defaults = Config::try_from(&MeiboSettings::default()).map_err(config_error)?;
        let mut settings: MeiboSettings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(file).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pipeline.trigger_tokens"),
            )
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        // Speech waits and mouth animation track the engine rate unless pinned
        settings.pipeline.follow_speech_rate(settings.speech.rate);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let sections = [
            ("llm", self.llm.validate()),
            ("speech", self.speech.validate()),
            ("avatar", self.avatar.validate()),
            ("pipeline", self.pipeline.validate()),
        ];
        for (section, result) in sections {
            result.map_err(|e| CoreError::Configuration(format!("[{}] {}", section, e)))?;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Configuration(e.to_string()))
    }
}

fn config_error(err: config::ConfigError) -> CoreError {
    CoreError::Configuration(err.to_string())
}
