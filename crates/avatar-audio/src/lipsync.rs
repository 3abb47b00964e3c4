//! Audio-driven lip sync
//!
//! A continuous per-frame loop for the lifetime of one playback session:
//! pull the current analysis window, derive loudness and brightness, and
//! steer the mouth blend shapes toward the derived targets. Once playback
//! pauses or ends, the loop switches to a decay phase that settles every
//! mouth shape back to rest, then retires itself.
//!
//! The smile shape is shared with the emotional-expression system, so it
//! both moves and decays slowest; all writes are fractional, never snaps.

use std::sync::Arc;

use parking_lot::Mutex;

use avatar_core::sched::{FrameScheduler, TaskHandle, Tick};
use avatar_core::{Avatar, BlendShape};

use crate::analysis::{band_average, rms, SpectrumAnalyzer};
use crate::playback::PlaybackSession;

/// Lip-sync tuning. Ranges are validated at configuration load.
#[derive(Debug, Clone)]
pub struct LipSyncConfig {
    /// Analysis window length in samples.
    pub fft_size: usize,
    /// New-sample weight of the loudness smoother.
    pub loudness_smoothing: f32,
    /// New-sample weight of the brightness smoother.
    pub brightness_smoothing: f32,
    /// Fraction of the spectrum treated as the high band.
    pub high_band_start: f32,
    /// Loudness → mouth-open gain.
    pub open_gain: f32,
    /// Brightness → mouth-wide gain.
    pub wide_gain: f32,
    /// Brightness → smile gain (capped at 0.5).
    pub smile_gain: f32,
    /// Per-shape approach factors toward the frame targets.
    pub open_blend: f32,
    pub wide_blend: f32,
    pub round_blend: f32,
    pub smile_blend: f32,
    /// Per-frame retention during the decay phase.
    pub decay_retention: f32,
    pub smile_decay_retention: f32,
    /// Weight below which a decaying shape counts as settled.
    pub rest_threshold: f32,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            loudness_smoothing: 0.3,
            brightness_smoothing: 0.2,
            high_band_start: 0.3,
            open_gain: 8.0,
            wide_gain: 2.0,
            smile_gain: 1.5,
            open_blend: 0.3,
            wide_blend: 0.25,
            round_blend: 0.2,
            smile_blend: 0.1,
            decay_retention: 0.9,
            smile_decay_retention: 0.95,
            rest_threshold: 0.01,
        }
    }
}

enum Phase {
    Tracking,
    Decay,
}

/// Lip-sync engine for one avatar.
///
/// Only one loop may drive a given model at a time: attaching a new session
/// detaches the previous one first.
pub struct LipSync {
    avatar: Arc<Avatar>,
    scheduler: FrameScheduler,
    config: LipSyncConfig,
    active: Mutex<Option<TaskHandle>>,
}

impl LipSync {
    pub fn new(avatar: Arc<Avatar>, scheduler: FrameScheduler, config: LipSyncConfig) -> Self {
        Self { avatar, scheduler, config, active: Mutex::new(None) }
    }

    /// Start driving the mouth from `session`, replacing any previous loop.
    pub fn attach(&self, session: Arc<PlaybackSession>) {
        self.detach();
        tracing::debug!(duration_secs = session.duration_secs(), "lip sync attached");

        let avatar = self.avatar.clone();
        let config = self.config.clone();
        let mut analyzer = SpectrumAnalyzer::new(config.fft_size);
        let mut smoothed_loudness = 0.0f32;
        let mut smoothed_brightness = 0.0f32;
        let mut phase = Phase::Tracking;

        let handle = self.scheduler.register(move |dt| {
            match phase {
                Phase::Tracking => {
                    session.advance(dt.as_secs_f32());
                    if session.is_over() {
                        phase = Phase::Decay;
                        return Tick::Continue;
                    }

                    let window = session.window(analyzer.size());
                    let loudness = rms(&window);
                    let brightness =
                        band_average(analyzer.magnitudes(&window), config.high_band_start, 1.0);

                    smoothed_loudness = smoothed_loudness * (1.0 - config.loudness_smoothing)
                        + loudness * config.loudness_smoothing;
                    smoothed_brightness = smoothed_brightness
                        * (1.0 - config.brightness_smoothing)
                        + brightness * config.brightness_smoothing;

                    let open = (smoothed_loudness * config.open_gain).clamp(0.0, 1.0);
                    let wide = (smoothed_brightness * config.wide_gain).clamp(0.0, 1.0);
                    let smile = (smoothed_brightness * config.smile_gain).clamp(0.0, 0.5);

                    avatar.blend_shape_toward(BlendShape::Aa, open, config.open_blend);
                    avatar.blend_shape_toward(BlendShape::Ee, wide, config.wide_blend);
                    avatar.blend_shape_toward(BlendShape::Oh, open * 0.6, config.round_blend);
                    avatar.blend_shape_toward(BlendShape::Happy, smile, config.smile_blend);
                    Tick::Continue
                }
                Phase::Decay => {
                    avatar.decay_shape(BlendShape::Aa, config.decay_retention);
                    avatar.decay_shape(BlendShape::Ee, config.decay_retention);
                    avatar.decay_shape(BlendShape::Oh, config.decay_retention);
                    avatar.decay_shape(BlendShape::Happy, config.smile_decay_retention);

                    let settled = BlendShape::MOUTH
                        .iter()
                        .all(|&shape| avatar.shape_value(shape) <= config.rest_threshold);
                    if settled { Tick::Done } else { Tick::Continue }
                }
            }
        });

        *self.active.lock() = Some(handle);
    }

    /// Stop the current loop, if any.
    pub fn detach(&self) {
        if let Some(handle) = self.active.lock().take() {
            handle.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().as_ref().map(|h| h.is_live()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::AudioBuffer;
    use avatar_core::{AvatarRig, RigVersion};
    use std::f32::consts::TAU;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    fn make_lipsync() -> (Arc<Avatar>, FrameScheduler, LipSync) {
        let avatar = Arc::new(Avatar::new(AvatarRig::humanoid(1.0, RigVersion::V1)));
        let scheduler = FrameScheduler::new();
        let lipsync = LipSync::new(avatar.clone(), scheduler.clone(), LipSyncConfig::default());
        (avatar, scheduler, lipsync)
    }

    fn loud_buffer(secs: f32) -> AudioBuffer {
        let rate = 16000;
        let len = (secs * rate as f32) as usize;
        let samples = (0..len).map(|i| (i as f32 / rate as f32 * TAU * 220.0).sin() * 0.8).collect();
        AudioBuffer { samples, sample_rate: rate }
    }

    fn run(scheduler: &FrameScheduler, frames: usize) {
        for _ in 0..frames {
            scheduler.tick(FRAME);
        }
    }

    #[test]
    fn test_loud_audio_opens_mouth() {
        let (avatar, scheduler, lipsync) = make_lipsync();
        lipsync.attach(PlaybackSession::start(loud_buffer(2.0)));
        run(&scheduler, 30);
        assert!(
            avatar.shape_value(BlendShape::Aa) > 0.3,
            "sustained loud audio should open the mouth"
        );
    }

    #[test]
    fn test_decay_is_monotonic_and_settles() {
        let (avatar, scheduler, lipsync) = make_lipsync();
        // Start every mouth shape at full weight, on silence that ends
        // immediately, so the loop goes straight to decay.
        for shape in BlendShape::MOUTH {
            avatar.set_shape(shape, 1.0);
        }
        lipsync.attach(PlaybackSession::start(AudioBuffer {
            samples: vec![0.0; 16],
            sample_rate: 16000,
        }));

        let mut previous: Vec<f32> =
            BlendShape::MOUTH.iter().map(|&s| avatar.shape_value(s)).collect();
        for _ in 0..200 {
            scheduler.tick(FRAME);
            let current: Vec<f32> =
                BlendShape::MOUTH.iter().map(|&s| avatar.shape_value(s)).collect();
            for (cur, prev) in current.iter().zip(previous.iter()) {
                assert!(cur <= prev, "decay must be monotonically non-increasing");
            }
            previous = current;
        }

        for shape in BlendShape::MOUTH {
            assert!(avatar.shape_value(shape) <= 0.01);
        }
        // The loop retires once settled.
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn test_attach_replaces_previous_loop() {
        let (_avatar, scheduler, lipsync) = make_lipsync();
        lipsync.attach(PlaybackSession::start(loud_buffer(5.0)));
        lipsync.attach(PlaybackSession::start(loud_buffer(5.0)));
        assert_eq!(scheduler.task_count(), 1, "only one lip-sync loop may run");
    }

    #[test]
    fn test_pause_triggers_decay() {
        let (avatar, scheduler, lipsync) = make_lipsync();
        let session = PlaybackSession::start(loud_buffer(10.0));
        lipsync.attach(session.clone());
        run(&scheduler, 30);
        let open = avatar.shape_value(BlendShape::Aa);
        assert!(open > 0.0);

        session.pause();
        run(&scheduler, 10);
        assert!(avatar.shape_value(BlendShape::Aa) < open);
    }

    #[test]
    fn test_detach_stops_loop() {
        let (_avatar, scheduler, lipsync) = make_lipsync();
        lipsync.attach(PlaybackSession::start(loud_buffer(5.0)));
        assert!(lipsync.is_active());
        lipsync.detach();
        assert!(!lipsync.is_active());
        assert_eq!(scheduler.task_count(), 0);
    }
}
