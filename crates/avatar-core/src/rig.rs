//! Humanoid rig: normalized bones, their transforms, and the avatar model
//!
//! The avatar is headless state: bone local transforms plus blend-shape
//! weights. A renderer consumes this state; every animation loop in the
//! engine mutates it through the `Avatar` handle.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Quat, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::shape::{BlendShape, BlendShapeStore};

/// Normalized humanoid bones, matching the VRM humanoid bone set this
/// engine animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(usize)]
pub enum HumanBone {
    Hips,
    Spine,
    Chest,
    UpperChest,
    Neck,
    Head,
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToes,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToes,
}

impl HumanBone {
    pub const COUNT: usize = 22;

    pub const ALL: [HumanBone; Self::COUNT] = [
        HumanBone::Hips,
        HumanBone::Spine,
        HumanBone::Chest,
        HumanBone::UpperChest,
        HumanBone::Neck,
        HumanBone::Head,
        HumanBone::LeftShoulder,
        HumanBone::LeftUpperArm,
        HumanBone::LeftLowerArm,
        HumanBone::LeftHand,
        HumanBone::RightShoulder,
        HumanBone::RightUpperArm,
        HumanBone::RightLowerArm,
        HumanBone::RightHand,
        HumanBone::LeftUpperLeg,
        HumanBone::LeftLowerLeg,
        HumanBone::LeftFoot,
        HumanBone::LeftToes,
        HumanBone::RightUpperLeg,
        HumanBone::RightLowerLeg,
        HumanBone::RightFoot,
        HumanBone::RightToes,
    ];

    /// Canonical camelCase name.
    pub fn name(&self) -> &'static str {
        match self {
            HumanBone::Hips => "hips",
            HumanBone::Spine => "spine",
            HumanBone::Chest => "chest",
            HumanBone::UpperChest => "upperChest",
            HumanBone::Neck => "neck",
            HumanBone::Head => "head",
            HumanBone::LeftShoulder => "leftShoulder",
            HumanBone::LeftUpperArm => "leftUpperArm",
            HumanBone::LeftLowerArm => "leftLowerArm",
            HumanBone::LeftHand => "leftHand",
            HumanBone::RightShoulder => "rightShoulder",
            HumanBone::RightUpperArm => "rightUpperArm",
            HumanBone::RightLowerArm => "rightLowerArm",
            HumanBone::RightHand => "rightHand",
            HumanBone::LeftUpperLeg => "leftUpperLeg",
            HumanBone::LeftLowerLeg => "leftLowerLeg",
            HumanBone::LeftFoot => "leftFoot",
            HumanBone::LeftToes => "leftToes",
            HumanBone::RightUpperLeg => "rightUpperLeg",
            HumanBone::RightLowerLeg => "rightLowerLeg",
            HumanBone::RightFoot => "rightFoot",
            HumanBone::RightToes => "rightToes",
        }
    }
}

impl fmt::Display for HumanBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HumanBone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|bone| bone.name() == s)
            .ok_or_else(|| Error::UnknownBone(s.to_string()))
    }
}

/// Humanoid metadata version of the loaded model.
///
/// `V0` models store rotation and position tracks in a mirrored convention
/// and need component sign flips during retargeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RigVersion {
    V0,
    #[default]
    V1,
}

/// Local transform state of one bone.
#[derive(Debug, Clone, Copy)]
pub struct BoneState {
    /// Rest-pose local rotation, fixed at load time.
    pub rest_rotation: Quat,
    /// Current local rotation.
    pub rotation: Quat,
    /// Current local position offset (used by retargeted hip bob).
    pub position: Vec3,
}

impl BoneState {
    pub fn new(rest_rotation: Quat) -> Self {
        Self { rest_rotation, rotation: rest_rotation, position: Vec3::ZERO }
    }
}

/// The bone set of one loaded model.
///
/// Bones are optional: a model missing a bone feature-detects to a no-op in
/// every motion that would drive it.
#[derive(Debug, Clone)]
pub struct AvatarRig {
    bones: [Option<BoneState>; HumanBone::COUNT],
    hips_height: f32,
    version: RigVersion,
}

impl AvatarRig {
    /// A rig with the given bones present at identity rest rotation.
    pub fn with_bones(bones: &[HumanBone], hips_height: f32, version: RigVersion) -> Self {
        let mut slots = [None; HumanBone::COUNT];
        for bone in bones {
            slots[*bone as usize] = Some(BoneState::new(Quat::IDENTITY));
        }
        Self { bones: slots, hips_height, version }
    }

    /// A complete humanoid rig with every bone present.
    pub fn humanoid(hips_height: f32, version: RigVersion) -> Self {
        Self::with_bones(&HumanBone::ALL, hips_height, version)
    }

    pub fn has_bone(&self, bone: HumanBone) -> bool {
        self.bones[bone as usize].is_some()
    }

    pub fn bone(&self, bone: HumanBone) -> Option<&BoneState> {
        self.bones[bone as usize].as_ref()
    }

    pub fn bone_mut(&mut self, bone: HumanBone) -> Option<&mut BoneState> {
        self.bones[bone as usize].as_mut()
    }

    /// Hip height above the model root at bind pose, in world units.
    pub fn hips_height(&self) -> f32 {
        self.hips_height
    }

    pub fn version(&self) -> RigVersion {
        self.version
    }
}

/// Shared handle to the mutable avatar model.
///
/// Bones and blend shapes sit behind separate locks because their writers
/// are distinct domains (animator/clip player vs. lip-sync/blink). Locks are
/// held only within one frame callback, never across an await.
pub struct Avatar {
    rig: Mutex<AvatarRig>,
    shapes: Mutex<BlendShapeStore>,
    generation: AtomicU64,
}

impl Avatar {
    pub fn new(rig: AvatarRig) -> Self {
        Self {
            rig: Mutex::new(rig),
            shapes: Mutex::new(BlendShapeStore::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Monotonic counter bumped on every model swap. Retargeted-clip caches
    /// key on this.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the loaded model. Shape weights reset; in-flight animations
    /// referencing the old rig observe the generation bump and abandon.
    pub fn swap_rig(&self, rig: AvatarRig) {
        *self.rig.lock() = rig;
        self.shapes.lock().reset();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Clone of the current rig, for code that needs bind-pose data without
    /// holding the model lock (clip retargeting).
    pub fn rig_snapshot(&self) -> AvatarRig {
        self.rig.lock().clone()
    }

    pub fn has_bone(&self, bone: HumanBone) -> bool {
        self.rig.lock().has_bone(bone)
    }

    pub fn bone_rotation(&self, bone: HumanBone) -> Option<Quat> {
        self.rig.lock().bone(bone).map(|b| b.rotation)
    }

    /// Set a bone's local rotation; a missing bone is a silent no-op.
    pub fn set_bone_rotation(&self, bone: HumanBone, rotation: Quat) {
        if let Some(state) = self.rig.lock().bone_mut(bone) {
            state.rotation = rotation;
        }
    }

    pub fn bone_position(&self, bone: HumanBone) -> Option<Vec3> {
        self.rig.lock().bone(bone).map(|b| b.position)
    }

    pub fn set_bone_position(&self, bone: HumanBone, position: Vec3) {
        if let Some(state) = self.rig.lock().bone_mut(bone) {
            state.position = position;
        }
    }

    pub fn hips_height(&self) -> f32 {
        self.rig.lock().hips_height()
    }

    pub fn version(&self) -> RigVersion {
        self.rig.lock().version()
    }

    pub fn shape_value(&self, shape: BlendShape) -> f32 {
        self.shapes.lock().value(shape)
    }

    pub fn set_shape(&self, shape: BlendShape, weight: f32) {
        self.shapes.lock().set(shape, weight);
    }

    pub fn blend_shape_toward(&self, shape: BlendShape, target: f32, factor: f32) {
        self.shapes.lock().blend_toward(shape, target, factor);
    }

    pub fn decay_shape(&self, shape: BlendShape, retention: f32) {
        self.shapes.lock().decay(shape, retention);
    }
}
