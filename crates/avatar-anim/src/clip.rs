//! Animation clips and the clip player
//!
//! Clips hold keyframed bone tracks on the normalized humanoid rig (the
//! output of retargeting). The player drives at most two actions: a looping
//! idle and a one-shot gesture that holds its last pose until faded out.

use std::sync::Arc;

use glam::{Quat, Vec3};

use avatar_core::{Avatar, HumanBone};

/// Keyframed data of one track.
#[derive(Debug, Clone)]
pub enum TrackData {
    Rotation(Vec<(f32, Quat)>),
    Position(Vec<(f32, Vec3)>),
}

impl TrackData {
    pub fn is_empty(&self) -> bool {
        match self {
            TrackData::Rotation(keys) => keys.is_empty(),
            TrackData::Position(keys) => keys.is_empty(),
        }
    }
}

/// One bone's keyframe track.
#[derive(Debug, Clone)]
pub struct BoneTrack {
    pub bone: HumanBone,
    pub data: TrackData,
}

/// An animation clip on the normalized humanoid rig.
///
/// Immutable after construction. A clip with no tracks is valid and means
/// "no usable animation" — callers skip assignment rather than erroring.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    /// Authored length in seconds.
    pub duration: f32,
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Sample a rotation track at `t` seconds, slerping between keyframes.
fn sample_rotation(keys: &[(f32, Quat)], t: f32) -> Option<Quat> {
    let (&(first_t, first_q), &(last_t, last_q)) = (keys.first()?, keys.last()?);
    if t <= first_t {
        return Some(first_q);
    }
    if t >= last_t {
        return Some(last_q);
    }
    let next = keys.partition_point(|(kt, _)| *kt <= t);
    let (t0, q0) = keys[next - 1];
    let (t1, q1) = keys[next];
    let span = (t1 - t0).max(f32::EPSILON);
    Some(q0.slerp(q1, (t - t0) / span))
}

/// Sample a position track at `t` seconds, lerping between keyframes.
fn sample_position(keys: &[(f32, Vec3)], t: f32) -> Option<Vec3> {
    let (&(first_t, first_p), &(last_t, last_p)) = (keys.first()?, keys.last()?);
    if t <= first_t {
        return Some(first_p);
    }
    if t >= last_t {
        return Some(last_p);
    }
    let next = keys.partition_point(|(kt, _)| *kt <= t);
    let (t0, p0) = keys[next - 1];
    let (t1, p1) = keys[next];
    let span = (t1 - t0).max(f32::EPSILON);
    Some(p0.lerp(p1, (t - t0) / span))
}

struct Action {
    clip: Arc<AnimationClip>,
    time: f32,
    looping: bool,
    fade: Option<Fade>,
}

struct Fade {
    remaining: f32,
    total: f32,
}

impl Action {
    fn weight(&self) -> f32 {
        match &self.fade {
            Some(fade) => (fade.remaining / fade.total).clamp(0.0, 1.0),
            None => 1.0,
        }
    }

    fn apply(&self, avatar: &Avatar) {
        let weight = self.weight();
        for track in &self.clip.tracks {
            match &track.data {
                TrackData::Rotation(keys) => {
                    if let Some(pose) = sample_rotation(keys, self.time) {
                        if let Some(current) = avatar.bone_rotation(track.bone) {
                            avatar.set_bone_rotation(track.bone, current.slerp(pose, weight));
                        }
                    }
                }
                TrackData::Position(keys) => {
                    if let Some(pose) = sample_position(keys, self.time) {
                        if let Some(current) = avatar.bone_position(track.bone) {
                            avatar.set_bone_position(track.bone, current.lerp(pose, weight));
                        }
                    }
                }
            }
        }
    }
}

/// Plays clips onto the avatar: a looping idle action plus at most one
/// one-shot gesture action. The gesture holds its last pose when it ends
/// (the animator schedules the fade-out).
#[derive(Default)]
pub struct ClipPlayer {
    idle: Option<Action>,
    gesture: Option<Action>,
}

impl ClipPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the looping idle clip.
    pub fn play_idle(&mut self, clip: Arc<AnimationClip>) {
        if clip.is_empty() {
            return;
        }
        self.idle = Some(Action { clip, time: 0.0, looping: true, fade: None });
    }

    /// Play a gesture clip once, holding the final pose until faded out.
    pub fn play_gesture(&mut self, clip: Arc<AnimationClip>) {
        if clip.is_empty() {
            return;
        }
        self.gesture = Some(Action { clip, time: 0.0, looping: false, fade: None });
    }

    /// Begin fading the gesture action out over `seconds`.
    pub fn fade_out_gesture(&mut self, seconds: f32) {
        if let Some(action) = self.gesture.as_mut() {
            if action.fade.is_none() {
                action.fade = Some(Fade { remaining: seconds, total: seconds.max(f32::EPSILON) });
            }
        }
    }

    pub fn has_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn has_idle(&self) -> bool {
        self.idle.is_some()
    }

    /// Stop every action without applying further poses.
    pub fn stop_all(&mut self) {
        self.idle = None;
        self.gesture = None;
    }

    /// Advance actions by `dt` seconds and write the sampled pose. Idle is
    /// applied first so the gesture blends over it by its fade weight.
    pub fn update(&mut self, dt: f32, avatar: &Avatar) {
        if let Some(idle) = self.idle.as_mut() {
            if idle.clip.duration > 0.0 {
                idle.time = (idle.time + dt) % idle.clip.duration;
            }
            idle.apply(avatar);
        }

        let mut finished = false;
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.time = (gesture.time + dt).min(gesture.clip.duration);
            if let Some(fade) = gesture.fade.as_mut() {
                fade.remaining -= dt;
                if fade.remaining <= 0.0 {
                    finished = true;
                }
            }
            if !finished {
                gesture.apply(avatar);
            }
        }
        if finished {
            self.gesture = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_core::{AvatarRig, RigVersion};
    use std::f32::consts::FRAC_PI_2;

    fn clip_with_head_turn() -> AnimationClip {
        AnimationClip {
            name: "turn".to_string(),
            duration: 1.0,
            tracks: vec![BoneTrack {
                bone: HumanBone::Head,
                data: TrackData::Rotation(vec![
                    (0.0, Quat::IDENTITY),
                    (1.0, Quat::from_rotation_y(FRAC_PI_2)),
                ]),
            }],
        }
    }

    #[test]
    fn test_sample_rotation_interpolates() {
        let keys = vec![(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_y(FRAC_PI_2))];
        let mid = sample_rotation(&keys, 0.5).unwrap();
        let expected = Quat::from_rotation_y(FRAC_PI_2 / 2.0);
        assert!(mid.angle_between(expected) < 1e-3);
    }

    #[test]
    fn test_sample_clamps_outside_range() {
        let keys = vec![(0.2, Quat::IDENTITY), (0.8, Quat::from_rotation_y(1.0))];
        assert_eq!(sample_rotation(&keys, 0.0).unwrap(), Quat::IDENTITY);
        let end = sample_rotation(&keys, 2.0).unwrap();
        assert!(end.angle_between(Quat::from_rotation_y(1.0)) < 1e-6);
    }

    #[test]
    fn test_gesture_holds_last_pose() {
        let avatar = Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1));
        let mut player = ClipPlayer::new();
        player.play_gesture(Arc::new(clip_with_head_turn()));

        // Run well past the clip's end; without a fade the pose holds.
        for _ in 0..100 {
            player.update(0.05, &avatar);
        }
        let head = avatar.bone_rotation(HumanBone::Head).unwrap();
        assert!(head.angle_between(Quat::from_rotation_y(FRAC_PI_2)) < 1e-3);
        assert!(player.has_gesture());
    }

    #[test]
    fn test_fade_out_removes_gesture() {
        let avatar = Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1));
        let mut player = ClipPlayer::new();
        player.play_gesture(Arc::new(clip_with_head_turn()));
        player.update(1.0, &avatar);

        player.fade_out_gesture(0.5);
        for _ in 0..20 {
            player.update(0.05, &avatar);
        }
        assert!(!player.has_gesture());
    }

    #[test]
    fn test_empty_clip_is_skipped() {
        let mut player = ClipPlayer::new();
        player.play_gesture(Arc::new(AnimationClip {
            name: "empty".to_string(),
            duration: 0.0,
            tracks: vec![],
        }));
        assert!(!player.has_gesture());
    }

    #[test]
    fn test_idle_loops() {
        let avatar = Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1));
        let mut player = ClipPlayer::new();
        player.play_idle(Arc::new(clip_with_head_turn()));
        // 1.5s into a 1s loop lands at 0.5s, mid-turn
        player.update(1.5, &avatar);
        let head = avatar.bone_rotation(HumanBone::Head).unwrap();
        let expected = Quat::from_rotation_y(FRAC_PI_2 / 2.0);
        assert!(head.angle_between(expected) < 1e-2);
    }
}
