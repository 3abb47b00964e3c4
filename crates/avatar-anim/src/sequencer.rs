//! Animation sequencer
//!
//! Walks an animation plan step by step, launching the expression, head
//! motion, and gesture of each step concurrently and pacing the walk so
//! every step stays readable: a step never advances faster than the floor
//! duration even when its sub-animations are instant, and never blocks on a
//! sub-animation that outlives the step budget.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;

use avatar_core::{AnimationPlan, AnimationStep};

use crate::animator::Animator;

/// Sequencer pacing parameters.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Expression ramp-in length.
    pub transition_ms: u64,
    /// Minimum wall time per step.
    pub floor_ms: u64,
    /// Cap on head-motion duration.
    pub head_cap_ms: u64,
    /// Cap on gesture duration.
    pub gesture_cap_ms: u64,
    /// Inter-step pause range (inclusive), randomized per step.
    pub pause_range_ms: (u64, u64),
    /// Plan intensity is scaled by this before driving expressions.
    pub intensity_scale: f32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            transition_ms: 600,
            floor_ms: 800,
            head_cap_ms: 1200,
            gesture_cap_ms: 2000,
            pause_range_ms: (200, 400),
            intensity_scale: 0.6,
        }
    }
}

/// Progress events, one subscriber-visible record per step.
#[derive(Debug, Clone)]
pub enum SequencerEvent {
    StepStarted { index: usize, step: AnimationStep },
    StepFinished { index: usize },
    SequenceComplete { steps: usize },
}

/// Drives the animator through an animation plan, one plan at a time.
pub struct Sequencer {
    animator: Arc<Animator>,
    config: SequencerConfig,
    /// Serializes sequences: a play started while another is in flight
    /// queues behind it instead of overlapping.
    busy: tokio::sync::Mutex<()>,
    event_tx: broadcast::Sender<SequencerEvent>,
}

impl Sequencer {
    pub fn new(animator: Arc<Animator>, config: SequencerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self { animator, config, busy: tokio::sync::Mutex::new(()), event_tx }
    }

    /// Subscribe to step progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<SequencerEvent> {
        self.event_tx.subscribe()
    }

    /// Play `plan` to completion. Resolves after the final step's wait (no
    /// trailing pause). Concurrent callers are queued in arrival order.
    pub async fn play_sequence(&self, plan: &AnimationPlan) {
        let _guard = self.busy.lock().await;
        if plan.is_empty() {
            return;
        }
        tracing::debug!(steps = plan.len(), "playing animation sequence");

        let last = plan.len() - 1;
        for (index, step) in plan.steps().iter().enumerate() {
            let step = step.clone().sanitize();
            let _ = self.event_tx.send(SequencerEvent::StepStarted { index, step: step.clone() });
            self.run_step(&step).await;
            let _ = self.event_tx.send(SequencerEvent::StepFinished { index });

            if index < last {
                let (lo, hi) = self.config.pause_range_ms;
                let pause = rand::thread_rng().gen_range(lo..=hi);
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }
        }

        let _ = self.event_tx.send(SequencerEvent::SequenceComplete { steps: plan.len() });
        tracing::debug!("animation sequence complete");
    }

    async fn run_step(&self, step: &AnimationStep) {
        let cfg = &self.config;
        let intensity = step.intensity * cfg.intensity_scale;
        let transition = Duration::from_millis(cfg.transition_ms);

        // Launch the three sub-animations in fixed order; they run
        // concurrently with their own natural timing. Each contributes a
        // short acknowledgment marker, not its full length.
        let mut marker = Duration::ZERO;
        if !step.expression.is_neutral() {
            self.animator.set_expression(step.expression, intensity, transition);
            marker = marker.max(Duration::from_millis(cfg.transition_ms * 3 / 10));
        }
        if !step.head_motion.is_none() {
            let duration = (step.duration_ms * 12 / 10).min(cfg.head_cap_ms);
            self.animator.play_head_motion(step.head_motion, Duration::from_millis(duration));
            marker = marker.max(Duration::from_millis(200));
        }
        if !step.gesture.is_none() {
            let duration = (step.duration_ms * 3 / 2).min(cfg.gesture_cap_ms);
            self.animator.play_gesture(step.gesture, Duration::from_millis(duration));
            marker = marker.max(Duration::from_millis(300));
        }

        // Wait for the later of the markers and the floored step duration.
        let wait = Duration::from_millis(step.duration_ms.max(cfg.floor_ms)).max(marker);
        tokio::time::sleep(wait).await;

        // Fade the expression out without awaiting; the fade overlaps the
        // next step's setup.
        if !step.expression.is_neutral() {
            let fade = Duration::from_millis(cfg.transition_ms * 12 / 10);
            self.animator.set_expression(step.expression, 0.0, fade);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::AnimatorConfig;
    use crate::library::ClipLibrary;
    use avatar_core::{
        Avatar, AvatarRig, EmotionTag, FrameScheduler, GestureTag, HeadMotionTag, RigVersion,
    };

    fn make_sequencer() -> (Arc<Sequencer>, FrameScheduler) {
        let avatar = Arc::new(Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1)));
        let scheduler = FrameScheduler::new();
        let animator = Arc::new(Animator::new(
            avatar,
            scheduler.clone(),
            Arc::new(ClipLibrary::new()),
            AnimatorConfig::default(),
        ));
        (Arc::new(Sequencer::new(animator, SequencerConfig::default())), scheduler)
    }

    fn step(text: &str, duration_ms: u64) -> AnimationStep {
        AnimationStep {
            text: text.to_string(),
            expression: EmotionTag::Happy,
            head_motion: HeadMotionTag::Nod,
            gesture: GestureTag::HandWave,
            duration_ms,
            intensity: 0.8,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_run_in_order_with_floor_timing() {
        let (sequencer, _scheduler) = make_sequencer();
        let mut events = sequencer.subscribe();

        let plan =
            AnimationPlan(vec![step("one", 100), step("two", 1500), step("three", 100)]);
        let started = tokio::time::Instant::now();
        sequencer.play_sequence(&plan).await;
        let elapsed = started.elapsed();

        // Σ max(duration, 800) = 800 + 1500 + 800, plus two 200–400ms pauses.
        assert!(elapsed >= Duration::from_millis(3100 + 400));
        assert!(elapsed <= Duration::from_millis(3100 + 800 + 100));

        for expected in 0..3 {
            let SequencerEvent::StepStarted { index, .. } = events.recv().await.unwrap() else {
                panic!("expected StepStarted");
            };
            assert_eq!(index, expected);
            let SequencerEvent::StepFinished { index } = events.recv().await.unwrap() else {
                panic!("expected StepFinished");
            };
            assert_eq!(index, expected);
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            SequencerEvent::SequenceComplete { steps: 3 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_trailing_pause_after_final_step() {
        let (sequencer, _scheduler) = make_sequencer();
        let plan = AnimationPlan(vec![step("only", 1500)]);

        let started = tokio::time::Instant::now();
        sequencer.play_sequence(&plan).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(1500));
        // No inter-step pause after the last step.
        assert!(elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_step_drives_scaled_expression_then_fades() {
        let avatar = Arc::new(Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1)));
        let scheduler = FrameScheduler::new();
        let animator = Arc::new(Animator::new(
            avatar.clone(),
            scheduler.clone(),
            Arc::new(ClipLibrary::new()),
            AnimatorConfig::default(),
        ));
        let sequencer = Arc::new(Sequencer::new(animator, SequencerConfig::default()));

        // Drive frames alongside the sequence, the way the app's frame loop
        // does.
        let ticker_scheduler = scheduler.clone();
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(16)).await;
                ticker_scheduler.tick(Duration::from_millis(16));
            }
        });

        let plan = AnimationPlan(vec![step("Hi!", 1500)]);
        let seq = sequencer.clone();
        let play = tokio::spawn(async move { seq.play_sequence(&plan).await });

        // After the 600ms ramp-in and before the 1500ms wait ends, the happy
        // shape sits at intensity × 0.6 = 0.48.
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let peak = avatar.shape_value(avatar_core::BlendShape::Happy);
        assert!((peak - 0.48).abs() < 0.02, "expected ≈0.48, got {peak}");

        play.await.unwrap();

        // The un-awaited 720ms fade brings the expression back to rest.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let rest = avatar.shape_value(avatar_core::BlendShape::Happy);
        assert!(rest < 0.02, "expected the fade to settle, got {rest}");

        ticker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_plan_resolves_immediately() {
        let (sequencer, _scheduler) = make_sequencer();
        let started = tokio::time::Instant::now();
        sequencer.play_sequence(&AnimationPlan::default()).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequences_are_serialized() {
        let (sequencer, _scheduler) = make_sequencer();
        let mut events = sequencer.subscribe();

        let first = AnimationPlan(vec![step("a", 100)]);
        let second = AnimationPlan(vec![step("b", 100)]);

        let s1 = sequencer.clone();
        let t1 = tokio::spawn(async move { s1.play_sequence(&first).await });
        let s2 = sequencer.clone();
        let t2 = tokio::spawn(async move { s2.play_sequence(&second).await });
        let (r1, r2) = tokio::join!(t1, t2);
        r1.unwrap();
        r2.unwrap();

        // Both sequences ran to completion without interleaving steps: a
        // complete event follows each started/finished pair.
        let mut order = Vec::new();
        while let Ok(event) = events.try_recv() {
            order.push(match event {
                SequencerEvent::StepStarted { .. } => 's',
                SequencerEvent::StepFinished { .. } => 'f',
                SequencerEvent::SequenceComplete { .. } => 'c',
            });
        }
        assert_eq!(order, vec!['s', 'f', 'c', 's', 'f', 'c']);
    }
}
