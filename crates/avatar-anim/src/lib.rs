//! Animation pipeline for the avatar engine
//!
//! This crate owns everything that moves the avatar:
//! - Motion-clip retargeting onto the normalized humanoid rig
//! - Clip playback (looping idle, one-shot gestures with fade-out)
//! - Procedural animator: expression ramps, head motions, gestures
//! - The animation sequencer consuming externally produced plans
//! - The background blink loop
//! - The retargeted-clip library over a pluggable motion-asset source

pub mod animator;
pub mod blink;
pub mod clip;
pub mod library;
pub mod retarget;
pub mod sequencer;

pub use animator::{Animator, AnimatorConfig};
pub use blink::{BlinkConfig, BlinkLoop};
pub use clip::{AnimationClip, BoneTrack, ClipPlayer, TrackData};
pub use library::{ClipLibrary, JsonMotionSource, MotionSource, SourceAsset};
pub use retarget::{retarget, SourceClip, SourceJoint, SourceSkeleton, SourceTrack};
pub use sequencer::{Sequencer, SequencerConfig, SequencerEvent};

use thiserror::Error;

/// Animation errors
#[derive(Error, Debug, Clone)]
pub enum AnimError {
    #[error("Retarget error: {0}")]
    Retarget(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("Clip error: {0}")]
    Clip(String),
}

impl From<AnimError> for avatar_core::Error {
    fn from(err: AnimError) -> Self {
        avatar_core::Error::Animation(err.to_string())
    }
}
