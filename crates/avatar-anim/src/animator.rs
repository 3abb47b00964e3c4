//! Procedural animator
//!
//! Owns per-frame animation of bones and blend-shape values: expression
//! ramps, head motions, and gestures (clip-backed with a procedural
//! fallback). Every in-flight animation is a scheduler task with a stored
//! handle; a new call for the same target cancels and replaces the previous
//! one instead of racing it.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use glam::{EulerRot, Quat};
use parking_lot::Mutex;

use avatar_core::math::{ease_out, lerp};
use avatar_core::sched::{FrameScheduler, TaskHandle, Tick};
use avatar_core::{Avatar, BlendShape, EmotionTag, GestureTag, HeadMotionTag, HumanBone};

use crate::clip::ClipPlayer;
use crate::library::ClipLibrary;

/// Animator tuning.
#[derive(Debug, Clone)]
pub struct AnimatorConfig {
    /// Per-model overrides of the emotion → shape table, validated at
    /// configuration load.
    pub expression_overrides: HashMap<EmotionTag, Vec<BlendShape>>,
    /// Gesture-clip fade-out length in seconds.
    pub gesture_fade_secs: f32,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self { expression_overrides: HashMap::new(), gesture_fade_secs: 0.5 }
    }
}

/// Snap-back state shared between an in-flight motion task and the animator.
/// Whoever takes it first (natural completion or cancel-and-replace)
/// performs the restore, so a pose is never restored twice.
type Restore<T> = Arc<Mutex<Option<T>>>;

struct ActiveHead {
    handle: TaskHandle,
    restore: Restore<Quat>,
}

struct ActiveGesture {
    handle: TaskHandle,
    restore: Restore<Vec<(HumanBone, Quat)>>,
}

/// Procedural animator for one avatar.
pub struct Animator {
    avatar: Arc<Avatar>,
    scheduler: FrameScheduler,
    library: Arc<ClipLibrary>,
    player: Arc<Mutex<ClipPlayer>>,
    config: AnimatorConfig,
    update_task: Mutex<Option<TaskHandle>>,
    ramps: Mutex<HashMap<BlendShape, TaskHandle>>,
    head: Mutex<Option<ActiveHead>>,
    gesture: Mutex<Option<ActiveGesture>>,
    fade_timer: Mutex<Option<TaskHandle>>,
}

impl Animator {
    pub fn new(
        avatar: Arc<Avatar>,
        scheduler: FrameScheduler,
        library: Arc<ClipLibrary>,
        config: AnimatorConfig,
    ) -> Self {
        let animator = Self {
            avatar,
            scheduler,
            library,
            player: Arc::new(Mutex::new(ClipPlayer::new())),
            config,
            update_task: Mutex::new(None),
            ramps: Mutex::new(HashMap::new()),
            head: Mutex::new(None),
            gesture: Mutex::new(None),
            fade_timer: Mutex::new(None),
        };
        animator.attach_player();
        animator
    }

    /// Register the per-frame clip-player drive task.
    fn attach_player(&self) {
        let player = self.player.clone();
        let avatar = self.avatar.clone();
        let handle = self.scheduler.register(move |dt| {
            player.lock().update(dt.as_secs_f32(), &avatar);
            Tick::Continue
        });
        *self.update_task.lock() = Some(handle);
    }

    /// Start the looping idle clip, if the library has one for the current
    /// model.
    pub fn start_idle(&self, clip_name: &str) {
        if let Some(clip) = self.library.get(clip_name, self.avatar.generation()) {
            self.player.lock().play_idle(clip);
        }
    }

    fn shapes_for(&self, tag: EmotionTag) -> Vec<BlendShape> {
        match self.config.expression_overrides.get(&tag) {
            Some(shapes) => shapes.clone(),
            None => tag.shapes().to_vec(),
        }
    }

    /// Ramp every shape of `tag` from its current weight to `target` with an
    /// ease-out curve over `duration`. Each shape ramps independently; a new
    /// ramp for a shape supersedes the previous one, picking up from the
    /// value the old ramp last wrote.
    pub fn set_expression(&self, tag: EmotionTag, target: f32, duration: Duration) {
        for shape in self.shapes_for(tag) {
            let avatar = self.avatar.clone();
            let start = avatar.shape_value(shape);
            let total = duration.as_secs_f32().max(f32::EPSILON);
            let mut elapsed = 0.0f32;

            let handle = self.scheduler.register(move |dt| {
                elapsed += dt.as_secs_f32();
                let t = (elapsed / total).min(1.0);
                avatar.set_shape(shape, lerp(start, target, ease_out(t)));
                if t >= 1.0 { Tick::Done } else { Tick::Continue }
            });

            if let Some(old) = self.ramps.lock().insert(shape, handle) {
                old.cancel();
            }
        }
    }

    /// Drive the head bone through the tagged motion, snapping back to the
    /// rotation captured at call time. A second call before the first
    /// finishes cancels it and restores its start rotation first.
    pub fn play_head_motion(&self, tag: HeadMotionTag, duration: Duration) {
        if tag.is_none() {
            return;
        }
        let Some(start) = self.avatar.bone_rotation(HumanBone::Head) else {
            return; // model has no head bone
        };

        self.cancel_head();

        let (target, envelope, stretch): ((f32, f32, f32), Envelope, f32) = match tag {
            HeadMotionTag::Nod => ((0.4, 0.0, 0.0), Envelope::Sine, 1.0),
            HeadMotionTag::Shake => ((0.0, 0.4, 0.0), Envelope::Cycles(2.0, 0.5), 1.0),
            HeadMotionTag::TiltLeft => ((0.0, 0.0, 0.25), Envelope::Sine, 1.0),
            HeadMotionTag::TiltRight => ((0.0, 0.0, -0.25), Envelope::Sine, 1.0),
            HeadMotionTag::LookUp => ((-0.3, 0.0, 0.0), Envelope::Sine, 1.0),
            HeadMotionTag::LookDown => ((0.3, 0.0, 0.0), Envelope::Sine, 1.0),
            HeadMotionTag::DoubleNod => ((0.3, 0.0, 0.0), Envelope::Cycles(4.0, 0.5), 1.5),
            HeadMotionTag::Confused => ((0.0, 0.2, 0.1), Envelope::Cycles(3.0, 0.3), 1.0),
            HeadMotionTag::None => unreachable!(),
        };

        let avatar = self.avatar.clone();
        let restore: Restore<Quat> = Arc::new(Mutex::new(Some(start)));
        let task_restore = restore.clone();
        let (sx, sy, sz) = start.to_euler(EulerRot::XYZ);
        let total = duration.as_secs_f32().max(f32::EPSILON) * stretch;
        let mut elapsed = 0.0f32;

        let handle = self.scheduler.register(move |dt| {
            elapsed += dt.as_secs_f32();
            let t = (elapsed / total).min(1.0);
            if t >= 1.0 {
                if let Some(q) = task_restore.lock().take() {
                    avatar.set_bone_rotation(HumanBone::Head, q);
                }
                return Tick::Done;
            }
            let eased = envelope.sample(t);
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                lerp(sx, target.0, eased),
                lerp(sy, target.1, eased),
                lerp(sz, target.2, eased),
            );
            avatar.set_bone_rotation(HumanBone::Head, rotation);
            Tick::Continue
        });

        *self.head.lock() = Some(ActiveHead { handle, restore });
    }

    fn cancel_head(&self) {
        if let Some(prev) = self.head.lock().take() {
            prev.handle.cancel();
            if let Some(q) = prev.restore.lock().take() {
                self.avatar.set_bone_rotation(HumanBone::Head, q);
            }
        }
    }

    /// Perform a gesture: play the library clip when one exists for the
    /// tag and the current model, otherwise fall back to the procedural
    /// routine. Unknown or `none` tags do nothing.
    pub fn play_gesture(&self, tag: GestureTag, duration: Duration) {
        if tag.is_none() {
            return;
        }

        if let Some(old) = self.fade_timer.lock().take() {
            old.cancel();
        }

        if let Some(name) = tag.clip_name() {
            if let Some(clip) = self.library.get(name, self.avatar.generation()) {
                self.player.lock().play_gesture(clip.clone());
                let player = self.player.clone();
                let fade = self.config.gesture_fade_secs;
                let handle = self
                    .scheduler
                    .after(Duration::from_secs_f32(clip.duration), move || {
                        player.lock().fade_out_gesture(fade);
                    });
                *self.fade_timer.lock() = Some(handle);
                return;
            }
        }

        self.play_procedural_gesture(tag, duration);
    }

    fn play_procedural_gesture(&self, tag: GestureTag, duration: Duration) {
        // Both upper arms are required; forearms and spine are optional.
        if !self.avatar.has_bone(HumanBone::LeftUpperArm)
            || !self.avatar.has_bone(HumanBone::RightUpperArm)
        {
            return;
        }
        let routine = match tag {
            GestureTag::Shrug
            | GestureTag::Point
            | GestureTag::HandWave
            | GestureTag::CrossArms
            | GestureTag::HandToHeart
            | GestureTag::Think => tag,
            _ => return, // no procedural routine for this tag
        };

        // Gestures are serialized per bone group: restore the in-flight
        // gesture's snapshot before capturing a new one.
        self.cancel_gesture();

        let bones = [
            HumanBone::LeftUpperArm,
            HumanBone::RightUpperArm,
            HumanBone::LeftLowerArm,
            HumanBone::RightLowerArm,
            HumanBone::Spine,
        ];
        let snapshot: Vec<(HumanBone, Quat)> = bones
            .iter()
            .filter_map(|&bone| self.avatar.bone_rotation(bone).map(|q| (bone, q)))
            .collect();
        let starts: HashMap<HumanBone, (f32, f32, f32)> = snapshot
            .iter()
            .map(|(bone, q)| (*bone, q.to_euler(EulerRot::XYZ)))
            .collect();

        if routine == GestureTag::Think {
            self.play_head_motion(
                HeadMotionTag::TiltLeft,
                Duration::from_secs_f64(duration.as_secs_f64() * 0.8),
            );
        }

        let avatar = self.avatar.clone();
        let restore: Restore<Vec<(HumanBone, Quat)>> = Arc::new(Mutex::new(Some(snapshot)));
        let task_restore = restore.clone();
        let total = duration.as_secs_f32().max(f32::EPSILON);
        let mut elapsed = 0.0f32;

        let handle = self.scheduler.register(move |dt| {
            elapsed += dt.as_secs_f32();
            let t = (elapsed / total).min(1.0);
            if t >= 1.0 {
                if let Some(snapshot) = task_restore.lock().take() {
                    for (bone, q) in snapshot {
                        avatar.set_bone_rotation(bone, q);
                    }
                }
                return Tick::Done;
            }
            apply_gesture_frame(&avatar, routine, &starts, t);
            Tick::Continue
        });

        *self.gesture.lock() = Some(ActiveGesture { handle, restore });
    }

    fn cancel_gesture(&self) {
        if let Some(prev) = self.gesture.lock().take() {
            prev.handle.cancel();
            if let Some(snapshot) = prev.restore.lock().take() {
                for (bone, q) in snapshot {
                    self.avatar.set_bone_rotation(bone, q);
                }
            }
        }
    }

    /// Cancel every pending task and timer, stop the clip player, and drop
    /// captured poses.
    pub fn cleanup(&self) {
        for (_, handle) in self.ramps.lock().drain() {
            handle.cancel();
        }
        if let Some(head) = self.head.lock().take() {
            head.handle.cancel();
        }
        if let Some(gesture) = self.gesture.lock().take() {
            gesture.handle.cancel();
        }
        if let Some(timer) = self.fade_timer.lock().take() {
            timer.cancel();
        }
        if let Some(task) = self.update_task.lock().take() {
            task.cancel();
        }
        self.player.lock().stop_all();
    }

    /// Rebind after a model swap: tear everything down and attach a fresh
    /// clip player to the new rig. In-flight captures of the old model's
    /// bones are abandoned, not redirected.
    pub fn rebind(&self) {
        self.cleanup();
        *self.player.lock() = ClipPlayer::new();
        self.attach_player();
    }
}

/// Time envelope of a head motion.
#[derive(Clone, Copy)]
enum Envelope {
    /// Single rise-and-fall arc.
    Sine,
    /// `cycles` half-oscillations scaled by `scale`.
    Cycles(f32, f32),
}

impl Envelope {
    fn sample(&self, t: f32) -> f32 {
        match *self {
            Envelope::Sine => (t * PI).sin(),
            Envelope::Cycles(cycles, scale) => (t * PI * cycles).sin() * scale,
        }
    }
}

fn euler(start: &HashMap<HumanBone, (f32, f32, f32)>, bone: HumanBone) -> Option<(f32, f32, f32)> {
    start.get(&bone).copied()
}

/// One frame of a procedural gesture at progress `t ∈ [0, 1)`, computed from
/// the captured starting rotations.
fn apply_gesture_frame(
    avatar: &Avatar,
    tag: GestureTag,
    starts: &HashMap<HumanBone, (f32, f32, f32)>,
    t: f32,
) {
    let set = |bone: HumanBone, x: f32, y: f32, z: f32| {
        avatar.set_bone_rotation(bone, Quat::from_euler(EulerRot::XYZ, x, y, z));
    };
    let left = euler(starts, HumanBone::LeftUpperArm);
    let right = euler(starts, HumanBone::RightUpperArm);
    let left_fore = euler(starts, HumanBone::LeftLowerArm);
    let right_fore = euler(starts, HumanBone::RightLowerArm);
    let spine = euler(starts, HumanBone::Spine);

    match tag {
        GestureTag::Shrug => {
            let i = (t * PI).sin() * 0.8;
            if let Some((x, y, z)) = left {
                set(HumanBone::LeftUpperArm, x - i * 0.3, y, z + i);
            }
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - i * 0.3, y, z - i);
            }
            if let Some((x, y, z)) = spine {
                set(HumanBone::Spine, x, y + (t * PI * 2.0).sin() * 0.1, z);
            }
        }
        GestureTag::Point => {
            let i = (t * PI).sin() * 0.9;
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - i * 1.2, y, z - i * 0.5);
            }
            if let Some((x, y, z)) = right_fore {
                set(HumanBone::RightLowerArm, x + i * 0.8, y, z);
            }
        }
        GestureTag::HandWave => {
            let wave = (t * PI * 6.0).sin() * 0.4;
            let lift = (t * PI).sin() * 1.2;
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - lift, y, z - 0.8 + wave);
            }
            if let Some((x, y, z)) = right_fore {
                set(HumanBone::RightLowerArm, x, y + wave * 0.5, z);
            }
        }
        GestureTag::CrossArms => {
            let i = (t * PI).sin() * 0.7;
            if let Some((x, y, z)) = left {
                set(HumanBone::LeftUpperArm, x - i * 0.5, y + i, z);
            }
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - i * 0.5, y - i, z);
            }
        }
        GestureTag::HandToHeart => {
            let i = (t * PI).sin() * 0.8;
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - i * 0.8, y + i * 0.4, z + i * 0.3);
            }
        }
        GestureTag::Think => {
            let i = (t * PI).sin() * 0.6;
            if let Some((x, y, z)) = right {
                set(HumanBone::RightUpperArm, x - i * 1.1, y + i * 0.2, z);
            }
            if let Some((x, y, z)) = right_fore {
                set(HumanBone::RightLowerArm, x + i * 1.2, y, z);
            }
        }
        _ => {}
    }
}
