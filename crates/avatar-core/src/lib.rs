//! Core traits and types for the avatar engine
//!
//! This crate provides foundational types used across all other crates:
//! - The humanoid rig and its bones
//! - Blend-shape enumeration and weight store
//! - Animation plan types (steps, tags, static tables)
//! - The cooperative frame scheduler
//! - Interpolation helpers

pub mod error;
pub mod math;
pub mod plan;
pub mod rig;
pub mod sched;
pub mod shape;

pub use error::{Error, Result};
pub use plan::{AnimationPlan, AnimationStep, EmotionTag, GestureTag, HeadMotionTag};
pub use rig::{Avatar, AvatarRig, BoneState, HumanBone, RigVersion};
pub use sched::{FrameScheduler, TaskHandle, Tick};
pub use shape::{BlendShape, BlendShapeStore};
