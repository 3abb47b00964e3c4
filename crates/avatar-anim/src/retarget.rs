//! Motion retargeting
//!
//! Converts a motion clip authored for a motion-capture rig into an
//! equivalent clip on the normalized humanoid rig. Runs once per loaded
//! motion asset, ahead of playback, to populate the clip library.
//!
//! Rotation keyframes are re-expressed in the space difference between the
//! source bone's rest pose and the target's: premultiplied by the rest-world
//! rotation of the source joint's parent and multiplied by the inverse of
//! the joint's own rest-world rotation, so the result applied to the
//! target's rest pose reproduces the same world-space motion. Position
//! tracks are scaled by the hip-height ratio, and the hip track's horizontal
//! components are zeroed so retargeted motion never walks the character
//! around — only the vertical bob survives.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use avatar_core::{AvatarRig, HumanBone, RigVersion};

use crate::clip::{AnimationClip, BoneTrack, TrackData};
use crate::AnimError;

/// Translation table from motion-capture rig bone names to normalized
/// humanoid bones. A source bone with no entry contributes nothing.
static MOCAP_BONE_MAP: Lazy<HashMap<&'static str, HumanBone>> = Lazy::new(|| {
    HashMap::from([
        ("mixamorigHips", HumanBone::Hips),
        ("mixamorigSpine", HumanBone::Spine),
        ("mixamorigSpine1", HumanBone::Chest),
        ("mixamorigSpine2", HumanBone::UpperChest),
        ("mixamorigNeck", HumanBone::Neck),
        ("mixamorigHead", HumanBone::Head),
        ("mixamorigLeftShoulder", HumanBone::LeftShoulder),
        ("mixamorigLeftArm", HumanBone::LeftUpperArm),
        ("mixamorigLeftForeArm", HumanBone::LeftLowerArm),
        ("mixamorigLeftHand", HumanBone::LeftHand),
        ("mixamorigRightShoulder", HumanBone::RightShoulder),
        ("mixamorigRightArm", HumanBone::RightUpperArm),
        ("mixamorigRightForeArm", HumanBone::RightLowerArm),
        ("mixamorigRightHand", HumanBone::RightHand),
        ("mixamorigLeftUpLeg", HumanBone::LeftUpperLeg),
        ("mixamorigLeftLeg", HumanBone::LeftLowerLeg),
        ("mixamorigLeftFoot", HumanBone::LeftFoot),
        ("mixamorigLeftToeBase", HumanBone::LeftToes),
        ("mixamorigRightUpLeg", HumanBone::RightUpperLeg),
        ("mixamorigRightLeg", HumanBone::RightLowerLeg),
        ("mixamorigRightFoot", HumanBone::RightFoot),
        ("mixamorigRightToeBase", HumanBone::RightToes),
    ])
});

/// One joint of the source rig at bind pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceJoint {
    /// Parent joint name; `None` for the root.
    pub parent: Option<String>,
    /// World-space rest rotation at bind pose.
    pub rest_world_rotation: Quat,
}

/// The source rig's bind pose, as decoded from the motion asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSkeleton {
    pub joints: HashMap<String, SourceJoint>,
    /// Hip height above the source root at bind pose, in source units.
    pub hips_height: f32,
}

impl SourceSkeleton {
    fn rest_world_rotation(&self, joint: &str) -> Option<Quat> {
        self.joints.get(joint).map(|j| j.rest_world_rotation)
    }

    fn parent_rest_world_rotation(&self, joint: &str) -> Quat {
        self.joints
            .get(joint)
            .and_then(|j| j.parent.as_deref())
            .and_then(|p| self.rest_world_rotation(p))
            .unwrap_or(Quat::IDENTITY)
    }
}

/// One keyframe track of the source clip. `name` is the interchange-format
/// track path, `"<joint>.<property>"`; `values` is the flat keyframe array
/// (stride 4 for `quaternion` tracks, 3 for `position`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTrack {
    pub name: String,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
}

/// A motion clip in the source rig's space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<SourceTrack>,
}

/// Retarget `clip` from `skeleton`'s rig onto the humanoid `rig`.
///
/// A clip in which no track resolves through the bone table yields an empty
/// clip, not an error; callers treat an empty clip as "no usable animation"
/// and skip assignment.
pub fn retarget(
    clip: &SourceClip,
    skeleton: &SourceSkeleton,
    rig: &AvatarRig,
) -> Result<AnimationClip, AnimError> {
    if skeleton.hips_height <= f32::EPSILON {
        return Err(AnimError::Retarget(format!(
            "source skeleton for '{}' has no measurable hip height",
            clip.name
        )));
    }
    let position_scale = rig.hips_height() / skeleton.hips_height;
    let legacy = rig.version() == RigVersion::V0;

    let mut tracks = Vec::new();
    for track in &clip.tracks {
        let Some((joint_name, property)) = track.name.split_once('.') else {
            tracing::warn!(track = %track.name, "unsplittable track name, skipping");
            continue;
        };
        let Some(&bone) = MOCAP_BONE_MAP.get(joint_name) else {
            continue;
        };
        let Some(rest_world) = skeleton.rest_world_rotation(joint_name) else {
            tracing::warn!(joint = joint_name, "joint missing from source skeleton, skipping");
            continue;
        };

        match property {
            "quaternion" => {
                let rest_inverse = rest_world.inverse();
                let parent_rest = skeleton.parent_rest_world_rotation(joint_name);
                let mut keys = Vec::with_capacity(track.times.len());
                for (k, &time) in track.times.iter().enumerate() {
                    let i = k * 4;
                    if i + 3 >= track.values.len() {
                        break;
                    }
                    let q = Quat::from_xyzw(
                        track.values[i],
                        track.values[i + 1],
                        track.values[i + 2],
                        track.values[i + 3],
                    );
                    let corrected = parent_rest * q * rest_inverse;
                    let mut out = corrected.to_array();
                    if legacy {
                        // Mirrored convention of humanoid metadata version 0:
                        // flip the components at even flat indices.
                        for (j, v) in out.iter_mut().enumerate() {
                            if j % 2 == 0 {
                                *v = -*v;
                            }
                        }
                    }
                    keys.push((time, Quat::from_array(out)));
                }
                let data = TrackData::Rotation(keys);
                if !data.is_empty() {
                    tracks.push(BoneTrack { bone, data });
                }
            }
            "position" => {
                let mut keys = Vec::with_capacity(track.times.len());
                for (k, &time) in track.times.iter().enumerate() {
                    let i = k * 3;
                    if i + 2 >= track.values.len() {
                        break;
                    }
                    let mut v = [track.values[i], track.values[i + 1], track.values[i + 2]];
                    if legacy {
                        // Version 0 flips every component except vertical.
                        v[0] = -v[0];
                        v[2] = -v[2];
                    }
                    let mut pos = Vec3::from_array(v) * position_scale;
                    if bone == HumanBone::Hips {
                        // Keep only the vertical bob; horizontal root motion
                        // must not translate the character.
                        pos.x = 0.0;
                        pos.z = 0.0;
                    }
                    keys.push((time, pos));
                }
                let data = TrackData::Position(keys);
                if !data.is_empty() {
                    tracks.push(BoneTrack { bone, data });
                }
            }
            other => {
                tracing::debug!(track = %track.name, property = other, "unsupported track property");
            }
        }
    }

    Ok(AnimationClip { name: clip.name.clone(), duration: clip.duration, tracks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn identity_skeleton(hips_height: f32) -> SourceSkeleton {
        let mut joints = HashMap::new();
        joints.insert(
            "mixamorigHips".to_string(),
            SourceJoint { parent: None, rest_world_rotation: Quat::IDENTITY },
        );
        joints.insert(
            "mixamorigHead".to_string(),
            SourceJoint {
                parent: Some("mixamorigHips".to_string()),
                rest_world_rotation: Quat::IDENTITY,
            },
        );
        SourceSkeleton { joints, hips_height }
    }

    fn rotation_track(joint: &str, quats: &[Quat]) -> SourceTrack {
        SourceTrack {
            name: format!("{joint}.quaternion"),
            times: (0..quats.len()).map(|i| i as f32).collect(),
            values: quats.iter().flat_map(|q| q.to_array()).collect(),
        }
    }

    fn position_track(joint: &str, points: &[Vec3]) -> SourceTrack {
        SourceTrack {
            name: format!("{joint}.position"),
            times: (0..points.len()).map(|i| i as f32).collect(),
            values: points.iter().flat_map(|p| p.to_array()).collect(),
        }
    }

    #[test]
    fn test_unmapped_clip_yields_empty_clip() {
        let clip = SourceClip {
            name: "dance".to_string(),
            duration: 2.0,
            tracks: vec![rotation_track("pelvis_ctrl", &[Quat::IDENTITY])],
        };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V1);
        let out = retarget(&clip, &identity_skeleton(1.0), &rig).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_identity_rest_passes_rotations_through() {
        let q = Quat::from_rotation_y(0.7);
        let clip = SourceClip {
            name: "turn".to_string(),
            duration: 1.0,
            tracks: vec![rotation_track("mixamorigHead", &[q])],
        };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V1);
        let out = retarget(&clip, &identity_skeleton(1.0), &rig).unwrap();

        let TrackData::Rotation(keys) = &out.tracks[0].data else { panic!("expected rotation") };
        assert!(keys[0].1.angle_between(q) < 1e-5);
        assert_eq!(out.tracks[0].bone, HumanBone::Head);
    }

    #[test]
    fn test_rest_pose_correction() {
        // Head rests rotated 90° about Y under an unrotated parent: the
        // corrected keyframe is parent_rest * q * rest⁻¹.
        let rest = Quat::from_rotation_y(FRAC_PI_2);
        let mut skeleton = identity_skeleton(1.0);
        skeleton.joints.get_mut("mixamorigHead").unwrap().rest_world_rotation = rest;

        let q = Quat::from_rotation_x(0.4);
        let clip = SourceClip {
            name: "nod".to_string(),
            duration: 1.0,
            tracks: vec![rotation_track("mixamorigHead", &[q])],
        };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V1);
        let out = retarget(&clip, &skeleton, &rig).unwrap();

        let TrackData::Rotation(keys) = &out.tracks[0].data else { panic!("expected rotation") };
        let expected = q * rest.inverse();
        assert!(keys[0].1.angle_between(expected) < 1e-5);
    }

    #[test]
    fn test_position_scale_tracks_hip_ratio() {
        let p = Vec3::new(0.0, 2.0, 0.0);
        let clip = SourceClip {
            name: "bob".to_string(),
            duration: 1.0,
            tracks: vec![position_track("mixamorigHead", &[p])],
        };
        let skeleton = identity_skeleton(2.0);

        let rig_a = AvatarRig::humanoid(1.0, RigVersion::V1);
        let rig_b = AvatarRig::humanoid(3.0, RigVersion::V1);
        let out_a = retarget(&clip, &skeleton, &rig_a).unwrap();
        let out_b = retarget(&clip, &skeleton, &rig_b).unwrap();

        let TrackData::Position(keys_a) = &out_a.tracks[0].data else { panic!() };
        let TrackData::Position(keys_b) = &out_b.tracks[0].data else { panic!() };
        // Tripling the target hip height triples every output position.
        assert!((keys_b[0].1 - keys_a[0].1 * 3.0).length() < 1e-5);
    }

    #[test]
    fn test_hips_horizontal_motion_zeroed() {
        let clip = SourceClip {
            name: "walk".to_string(),
            duration: 1.0,
            tracks: vec![position_track("mixamorigHips", &[Vec3::new(5.0, 1.0, -3.0)])],
        };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V1);
        let out = retarget(&clip, &identity_skeleton(1.0), &rig).unwrap();

        let TrackData::Position(keys) = &out.tracks[0].data else { panic!() };
        assert_eq!(keys[0].1.x, 0.0);
        assert_eq!(keys[0].1.z, 0.0);
        assert!((keys[0].1.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_legacy_version_sign_flips() {
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.927).normalize();
        let p = Vec3::new(1.0, 2.0, 3.0);
        let clip = SourceClip {
            name: "legacy".to_string(),
            duration: 1.0,
            tracks: vec![
                rotation_track("mixamorigHead", &[q]),
                position_track("mixamorigHead", &[p]),
            ],
        };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V0);
        let out = retarget(&clip, &identity_skeleton(1.0), &rig).unwrap();

        let TrackData::Rotation(keys) = &out.tracks[0].data else { panic!() };
        let [x, y, z, w] = keys[0].1.to_array();
        assert!((x + q.x).abs() < 1e-6);
        assert!((y - q.y).abs() < 1e-6);
        assert!((z + q.z).abs() < 1e-6);
        assert!((w - q.w).abs() < 1e-6);

        let TrackData::Position(keys) = &out.tracks[1].data else { panic!() };
        assert!((keys[0].1 - Vec3::new(-1.0, 2.0, -3.0)).length() < 1e-6);
    }

    #[test]
    fn test_zero_hip_height_is_an_error() {
        let clip = SourceClip { name: "x".to_string(), duration: 1.0, tracks: vec![] };
        let rig = AvatarRig::humanoid(1.0, RigVersion::V1);
        assert!(retarget(&clip, &identity_skeleton(0.0), &rig).is_err());
    }
}
