//! Shared error type

use thiserror::Error;

/// Top-level error for the avatar engine
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Animation error: {0}")]
    Animation(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown blend shape: {0}")]
    UnknownShape(String),

    #[error("Unknown bone: {0}")]
    UnknownBone(String),
}

/// Result alias using the shared error type
pub type Result<T> = std::result::Result<T, Error>;
