//! Background blink loop
//!
//! Low-priority idle animation: close the eyes briefly at randomized
//! intervals for the lifetime of the loaded model. Runs as a single
//! scheduler task with an explicit open/closed state machine so stopping is
//! one handle cancellation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use avatar_core::sched::{FrameScheduler, TaskHandle, Tick};
use avatar_core::{Avatar, BlendShape};

/// Blink timing parameters.
#[derive(Debug, Clone)]
pub struct BlinkConfig {
    /// Blink weight range.
    pub intensity: (f32, f32),
    /// How long the eyes stay closed.
    pub closed_ms: (u64, u64),
    /// Gap between blinks.
    pub interval_ms: (u64, u64),
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self { intensity: (0.8, 1.0), closed_ms: (120, 200), interval_ms: (2000, 6000) }
    }
}

enum Phase {
    /// Eyes closed; reopen when the timer runs out.
    Closed { remaining: Duration },
    /// Eyes open; blink when the timer runs out.
    Open { remaining: Duration },
}

/// Continuous blinking for one avatar.
pub struct BlinkLoop {
    avatar: Arc<Avatar>,
    scheduler: FrameScheduler,
    config: BlinkConfig,
    task: Mutex<Option<TaskHandle>>,
}

impl BlinkLoop {
    pub fn new(avatar: Arc<Avatar>, scheduler: FrameScheduler, config: BlinkConfig) -> Self {
        Self { avatar, scheduler, config, task: Mutex::new(None) }
    }

    /// Start blinking. The first blink fires immediately, as a freshly
    /// loaded model otherwise stares for several seconds.
    pub fn start(&self) {
        self.stop();

        let avatar = self.avatar.clone();
        let config = self.config.clone();
        let mut phase = {
            let mut rng = rand::thread_rng();
            let weight = rng.gen_range(config.intensity.0..=config.intensity.1);
            avatar.set_shape(BlendShape::Blink, weight);
            Phase::Closed {
                remaining: Duration::from_millis(
                    rng.gen_range(config.closed_ms.0..=config.closed_ms.1),
                ),
            }
        };

        let handle = self.scheduler.register(move |dt| {
            match &mut phase {
                Phase::Closed { remaining } => {
                    if let Some(rest) = remaining.checked_sub(dt) {
                        *remaining = rest;
                    } else {
                        avatar.set_shape(BlendShape::Blink, 0.0);
                        let next = rand::thread_rng()
                            .gen_range(config.interval_ms.0..=config.interval_ms.1);
                        phase = Phase::Open { remaining: Duration::from_millis(next) };
                    }
                }
                Phase::Open { remaining } => {
                    if let Some(rest) = remaining.checked_sub(dt) {
                        *remaining = rest;
                    } else {
                        let mut rng = rand::thread_rng();
                        let weight = rng.gen_range(config.intensity.0..=config.intensity.1);
                        avatar.set_shape(BlendShape::Blink, weight);
                        let closed =
                            rng.gen_range(config.closed_ms.0..=config.closed_ms.1);
                        phase = Phase::Closed { remaining: Duration::from_millis(closed) };
                    }
                }
            }
            Tick::Continue
        });

        *self.task.lock() = Some(handle);
    }

    /// Stop blinking; pending phase timers are cancelled.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().map(|h| h.is_live()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_core::{AvatarRig, RigVersion};

    const FRAME: Duration = Duration::from_millis(16);

    fn make_loop() -> (Arc<Avatar>, FrameScheduler, BlinkLoop) {
        let avatar = Arc::new(Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1)));
        let scheduler = FrameScheduler::new();
        let blink = BlinkLoop::new(avatar.clone(), scheduler.clone(), BlinkConfig::default());
        (avatar, scheduler, blink)
    }

    #[test]
    fn test_first_blink_is_immediate() {
        let (avatar, _scheduler, blink) = make_loop();
        blink.start();
        assert!(avatar.shape_value(BlendShape::Blink) >= 0.8);
    }

    #[test]
    fn test_eyes_reopen() {
        let (avatar, scheduler, blink) = make_loop();
        blink.start();
        // Longest closed phase is 200ms; run well past it.
        for _ in 0..20 {
            scheduler.tick(FRAME);
        }
        assert_eq!(avatar.shape_value(BlendShape::Blink), 0.0);
        assert!(blink.is_running());
    }

    #[test]
    fn test_stop_cancels_pending_timer() {
        let (avatar, scheduler, blink) = make_loop();
        blink.start();
        for _ in 0..20 {
            scheduler.tick(FRAME);
        }
        blink.stop();
        assert!(!blink.is_running());

        // No further weight changes after stop, however long we run.
        let weight = avatar.shape_value(BlendShape::Blink);
        for _ in 0..1000 {
            scheduler.tick(FRAME);
        }
        assert_eq!(avatar.shape_value(BlendShape::Blink), weight);
    }

    #[test]
    fn test_restart_replaces_task() {
        let (_avatar, scheduler, blink) = make_loop();
        blink.start();
        blink.start();
        assert_eq!(scheduler.task_count(), 1);
    }
}
