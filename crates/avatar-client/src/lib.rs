//! External-service boundary for the avatar engine
//!
//! Every remote collaborator is a trait with an HTTP implementation and a
//! simple in-process implementation for testing:
//! - Chat completion (free text in, free text out, fallback on failure)
//! - Animation planning (reply text in, tolerant plan parsing, fallback plan)
//! - Speech synthesis (text in, decoded WAV out, `None` on failure)
//! - Speech recognition (event-driven, capability-flagged)
//!
//! No failure here is fatal: the worst case is a turn with no animation or
//! audio, never a crash.

pub mod chat;
pub mod planner;
pub mod speech;
pub mod tts;

pub use chat::{ChatService, FixedChatService, HttpChatService, FALLBACK_REPLY};
pub use planner::{parse_plan, AnimationPlanner};
pub use speech::{
    NullRecognizer, ScriptedRecognizer, SpeechError, SpeechEvent, SpeechRecognizer,
};
pub use tts::{HttpSpeechSynthesizer, SilentSynthesizer, SpeechSynthesizer, VoiceParams};

use thiserror::Error;

/// Client errors. These stay inside the implementations — the public trait
/// surfaces degrade to fallbacks instead of propagating.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<ClientError> for avatar_core::Error {
    fn from(err: ClientError) -> Self {
        avatar_core::Error::Client(err.to_string())
    }
}
