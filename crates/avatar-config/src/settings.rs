//! Main settings module

use std::collections::HashMap;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use avatar_core::{BlendShape, EmotionTag};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Chat-completion service
    #[serde(default)]
    pub chat: ChatSettings,

    /// Speech-synthesis service
    #[serde(default)]
    pub tts: TtsSettings,

    /// Speech recognition
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Loaded avatar model
    #[serde(default)]
    pub avatar: AvatarSettings,

    /// Motion assets and expression tuning
    #[serde(default)]
    pub animation: AnimationSettings,

    /// Lip-sync tuning
    #[serde(default)]
    pub lipsync: LipSyncSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings. Unknown blend-shape or emotion names are rejected
    /// here, at load time, instead of becoming silent runtime no-ops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "chat.endpoint".to_string(),
                message: "chat endpoint must not be empty".to_string(),
            });
        }
        if self.tts.endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "tts.endpoint".to_string(),
                message: "tts endpoint must not be empty".to_string(),
            });
        }

        for (field, value) in [
            ("lipsync.loudness_smoothing", self.lipsync.loudness_smoothing),
            ("lipsync.brightness_smoothing", self.lipsync.brightness_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("smoothing factor must be in (0, 1], got {value}"),
                });
            }
        }
        for (field, value) in [
            ("lipsync.open_gain", self.lipsync.open_gain),
            ("lipsync.wide_gain", self.lipsync.wide_gain),
            ("lipsync.smile_gain", self.lipsync.smile_gain),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("gain must be positive, got {value}"),
                });
            }
        }

        self.expression_overrides().map(|_| ())
    }

    /// The typed expression-override table. Every key must be a known
    /// emotion tag and every value a known blend shape.
    pub fn expression_overrides(
        &self,
    ) -> Result<HashMap<EmotionTag, Vec<BlendShape>>, ConfigError> {
        let mut table = HashMap::new();
        for (tag_name, shape_names) in &self.animation.expression_overrides {
            let tag = EmotionTag::from_name(tag_name).ok_or_else(|| ConfigError::InvalidValue {
                field: "animation.expression_overrides".to_string(),
                message: format!("unknown emotion tag '{tag_name}'"),
            })?;
            let mut shapes = Vec::with_capacity(shape_names.len());
            for name in shape_names {
                let shape: BlendShape =
                    name.parse().map_err(|_| ConfigError::InvalidValue {
                        field: "animation.expression_overrides".to_string(),
                        message: format!("unknown blend shape '{name}' for '{tag_name}'"),
                    })?;
                shapes.push(shape);
            }
            table.insert(tag, shapes);
        }
        Ok(table)
    }
}

/// Chat-completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Chat endpoint URL
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API key (set via AVATAR__CHAT__API_KEY; never checked in)
    #[serde(default)]
    pub api_key: Option<String>,

    /// System prompt for the character
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_chat_endpoint() -> String {
    "http://127.0.0.1:11434/api/chat".to_string()
}
fn default_chat_model() -> String {
    "qwen3:4b".to_string()
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant. You are friendly, enthusiastic, and enjoy \
     helping users with their questions and tasks. Keep your responses \
     conversational and engaging."
        .to_string()
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            model: default_chat_model(),
            api_key: None,
            system_prompt: default_system_prompt(),
        }
    }
}

/// Speech-synthesis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSettings {
    /// Synthesis endpoint URL
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// Reference audio for voice cloning
    #[serde(default)]
    pub ref_audio_path: String,

    #[serde(default = "default_lang")]
    pub text_lang: String,

    /// Transcript of the reference audio
    #[serde(default)]
    pub prompt_text: String,

    #[serde(default = "default_lang")]
    pub prompt_lang: String,
}

fn default_tts_endpoint() -> String {
    "http://127.0.0.1:9880/tts".to_string()
}
fn default_lang() -> String {
    "en".to_string()
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            ref_audio_path: String::new(),
            text_lang: default_lang(),
            prompt_text: String::new(),
            prompt_lang: default_lang(),
        }
    }
}

/// Speech-recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_speech_lang")]
    pub lang: String,
}

fn default_speech_lang() -> String {
    "en-US".to_string()
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self { lang: default_speech_lang() }
    }
}

/// Loaded model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSettings {
    /// Model file the renderer loads
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Hip height above the root at bind pose, in world units
    #[serde(default = "default_hips_height")]
    pub hips_height: f32,

    /// Whether the model uses the legacy (version 0) humanoid metadata
    #[serde(default)]
    pub legacy_rig: bool,
}

fn default_model_path() -> String {
    "models/riko.vrm".to_string()
}
fn default_hips_height() -> f32 {
    1.0
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            hips_height: default_hips_height(),
            legacy_rig: false,
        }
    }
}

/// Motion assets and expression tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSettings {
    /// Directory of motion assets
    #[serde(default = "default_clips_dir")]
    pub clips_dir: String,

    /// Looping idle clip name
    #[serde(default = "default_idle_clip")]
    pub idle_clip: String,

    /// Gesture clip names to load (best-effort per file)
    #[serde(default = "default_gesture_clips")]
    pub gesture_clips: Vec<String>,

    /// Per-model overrides of the emotion → blend-shape table. Keys are
    /// emotion tags, values are blend-shape names; both are validated.
    #[serde(default)]
    pub expression_overrides: HashMap<String, Vec<String>>,
}

fn default_clips_dir() -> String {
    "assets/motions".to_string()
}
fn default_idle_clip() -> String {
    "idle".to_string()
}
fn default_gesture_clips() -> Vec<String> {
    ["wave", "shrug", "pointing", "clapping", "thumbsup"]
        .map(String::from)
        .to_vec()
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            clips_dir: default_clips_dir(),
            idle_clip: default_idle_clip(),
            gesture_clips: default_gesture_clips(),
            expression_overrides: HashMap::new(),
        }
    }
}

/// Lip-sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncSettings {
    /// Loudness → mouth-open gain
    #[serde(default = "default_open_gain")]
    pub open_gain: f32,

    /// Brightness → mouth-wide gain
    #[serde(default = "default_wide_gain")]
    pub wide_gain: f32,

    /// Brightness → smile gain
    #[serde(default = "default_smile_gain")]
    pub smile_gain: f32,

    /// New-sample weight of the loudness smoother, in (0, 1]
    #[serde(default = "default_loudness_smoothing")]
    pub loudness_smoothing: f32,

    /// New-sample weight of the brightness smoother, in (0, 1]
    #[serde(default = "default_brightness_smoothing")]
    pub brightness_smoothing: f32,
}

fn default_open_gain() -> f32 {
    8.0
}
fn default_wide_gain() -> f32 {
    2.0
}
fn default_smile_gain() -> f32 {
    1.5
}
fn default_loudness_smoothing() -> f32 {
    0.3
}
fn default_brightness_smoothing() -> f32 {
    0.2
}

impl Default for LipSyncSettings {
    fn default() -> Self {
        Self {
            open_gain: default_open_gain(),
            wide_gain: default_wide_gain(),
            smile_gain: default_smile_gain(),
            loudness_smoothing: default_loudness_smoothing(),
            brightness_smoothing: default_brightness_smoothing(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (AVATAR__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }

    builder = builder.add_source(Environment::with_prefix("AVATAR").separator("__").try_parsing(true));

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
