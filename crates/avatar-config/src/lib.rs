//! Configuration for the avatar engine
//!
//! Settings load from YAML files plus `AVATAR__`-prefixed environment
//! variables and are validated before use. Credentials and endpoints are
//! injected here — never compiled into the engine.

mod settings;

pub use settings::{
    load_settings, AnimationSettings, AvatarSettings, ChatSettings, LipSyncSettings,
    ObservabilitySettings, Settings, SpeechSettings, TtsSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),
}

impl From<ConfigError> for avatar_core::Error {
    fn from(err: ConfigError) -> Self {
        avatar_core::Error::Config(err.to_string())
    }
}
