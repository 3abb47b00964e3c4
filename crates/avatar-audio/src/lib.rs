//! Audio analysis and lip sync for the avatar engine
//!
//! - WAV decoding into a mono float buffer
//! - Windowed time- and frequency-domain analysis of the playing audio
//! - The lip-sync engine driving mouth blend shapes per frame

pub mod analysis;
pub mod lipsync;
pub mod playback;
pub mod wav;

pub use analysis::{band_average, rms, SpectrumAnalyzer};
pub use lipsync::{LipSync, LipSyncConfig};
pub use playback::PlaybackSession;
pub use wav::{decode_wav, AudioBuffer};

use thiserror::Error;

/// Audio errors
#[derive(Error, Debug, Clone)]
pub enum AudioError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),
}

impl From<AudioError> for avatar_core::Error {
    fn from(err: AudioError) -> Self {
        avatar_core::Error::Audio(err.to_string())
    }
}
