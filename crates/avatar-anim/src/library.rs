//! Retargeted-clip library
//!
//! Motion assets arrive through a [`MotionSource`] (decoding of binary
//! interchange formats is an external concern; a serde-JSON source ships for
//! local use and tests). Loading is best-effort per clip: a missing or
//! unmappable asset is logged and skipped, never aborts the rest of the set.
//! Retargeted clips are cached per rig generation and invalidated when the
//! model is swapped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use avatar_core::AvatarRig;

use crate::clip::AnimationClip;
use crate::retarget::{retarget, SourceClip, SourceSkeleton};
use crate::AnimError;

/// A source clip together with the bind pose of the rig it was authored on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAsset {
    pub clip: SourceClip,
    pub skeleton: SourceSkeleton,
}

/// Supplies named motion assets.
pub trait MotionSource: Send + Sync {
    fn load(&self, name: &str) -> Result<SourceAsset, AnimError>;
}

/// Loads `<dir>/<name>.json` assets serialized as [`SourceAsset`].
pub struct JsonMotionSource {
    dir: PathBuf,
}

impl JsonMotionSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MotionSource for JsonMotionSource {
    fn load(&self, name: &str) -> Result<SourceAsset, AnimError> {
        let path = self.dir.join(format!("{name}.json"));
        let data = std::fs::read_to_string(&path)
            .map_err(|e| AnimError::Asset(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| AnimError::Asset(format!("{}: {e}", path.display())))
    }
}

struct LibraryState {
    generation: u64,
    clips: HashMap<String, Arc<AnimationClip>>,
}

/// Clips retargeted for the current model, keyed by asset name.
pub struct ClipLibrary {
    state: Mutex<LibraryState>,
}

impl Default for ClipLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self { state: Mutex::new(LibraryState { generation: 0, clips: HashMap::new() }) }
    }

    /// Retarget the named assets for a model. Replaces the previous cache;
    /// each failure is logged and skipped so one bad asset never costs the
    /// rest of the set.
    pub fn load(
        &self,
        source: &dyn MotionSource,
        names: &[String],
        rig: &AvatarRig,
        generation: u64,
    ) {
        let mut clips = HashMap::new();
        for name in names {
            match source.load(name).and_then(|asset| retarget(&asset.clip, &asset.skeleton, rig)) {
                Ok(clip) if clip.is_empty() => {
                    tracing::warn!(clip = %name, "no usable tracks after retargeting, skipping");
                }
                Ok(clip) => {
                    tracing::info!(clip = %name, tracks = clip.tracks.len(), "clip loaded");
                    clips.insert(name.clone(), Arc::new(clip));
                }
                Err(e) => {
                    tracing::warn!(clip = %name, error = %e, "could not load clip, skipping");
                }
            }
        }
        *self.state.lock() = LibraryState { generation, clips };
    }

    /// Fetch a clip if it was retargeted for `generation`. A stale cache
    /// (model swapped since load) yields nothing.
    pub fn get(&self, name: &str, generation: u64) -> Option<Arc<AnimationClip>> {
        let state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        state.clips.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().clips.is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.clips.clear();
    }
}
