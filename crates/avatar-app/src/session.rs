//! Conversation session
//!
//! Owns the avatar, the animation loops, and the external-service clients
//! for one conversation. One frame-loop task drives the scheduler; chat
//! turns run through [`Session::handle_message`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use avatar_anim::{
    Animator, AnimatorConfig, BlinkConfig, BlinkLoop, ClipLibrary, MotionSource, Sequencer,
    SequencerConfig, SequencerEvent,
};
use avatar_audio::{LipSync, LipSyncConfig, PlaybackSession};
use avatar_client::{
    AnimationPlanner, ChatService, NullRecognizer, SpeechRecognizer, SpeechSynthesizer,
};
use avatar_config::{AvatarSettings, Settings};
use avatar_core::{Avatar, AvatarRig, FrameScheduler, RigVersion};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn build_rig(settings: &AvatarSettings) -> AvatarRig {
    let version = if settings.legacy_rig { RigVersion::V0 } else { RigVersion::V1 };
    AvatarRig::humanoid(settings.hips_height, version)
}

fn lipsync_config(settings: &Settings) -> LipSyncConfig {
    LipSyncConfig {
        open_gain: settings.lipsync.open_gain,
        wide_gain: settings.lipsync.wide_gain,
        smile_gain: settings.lipsync.smile_gain,
        loudness_smoothing: settings.lipsync.loudness_smoothing,
        brightness_smoothing: settings.lipsync.brightness_smoothing,
        ..LipSyncConfig::default()
    }
}

/// One conversation session over one loaded avatar.
pub struct Session {
    id: String,
    settings: Settings,
    avatar: Arc<Avatar>,
    scheduler: FrameScheduler,
    animator: Arc<Animator>,
    sequencer: Arc<Sequencer>,
    blink: BlinkLoop,
    lipsync: LipSync,
    library: Arc<ClipLibrary>,
    chat: Arc<dyn ChatService>,
    planner: AnimationPlanner,
    tts: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    frame_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        settings: Settings,
        chat: Arc<dyn ChatService>,
        tts: Arc<dyn SpeechSynthesizer>,
    ) -> avatar_core::Result<Self> {
        let expression_overrides = settings.expression_overrides().map_err(avatar_core::Error::from)?;

        let avatar = Arc::new(Avatar::new(build_rig(&settings.avatar)));
        let scheduler = FrameScheduler::new();
        let library = Arc::new(ClipLibrary::new());
        let animator = Arc::new(Animator::new(
            avatar.clone(),
            scheduler.clone(),
            library.clone(),
            AnimatorConfig { expression_overrides, ..AnimatorConfig::default() },
        ));
        let sequencer = Arc::new(Sequencer::new(animator.clone(), SequencerConfig::default()));
        let blink = BlinkLoop::new(avatar.clone(), scheduler.clone(), BlinkConfig::default());
        let lipsync = LipSync::new(avatar.clone(), scheduler.clone(), lipsync_config(&settings));
        let planner = AnimationPlanner::new(chat.clone());

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            settings,
            avatar,
            scheduler,
            animator,
            sequencer,
            blink,
            lipsync,
            library,
            chat,
            planner,
            tts,
            recognizer: Arc::new(NullRecognizer::new()),
            frame_task: Mutex::new(None),
        })
    }

    /// Replace the platform speech recognizer (default: the capability-off
    /// null recognizer).
    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn avatar(&self) -> &Arc<Avatar> {
        &self.avatar
    }

    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    /// Subscribe to step progress of the current and future sequences.
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<SequencerEvent> {
        self.sequencer.subscribe()
    }

    /// Retarget the configured motion set for the current model and start
    /// the idle clip when one loaded. Best-effort per asset.
    pub fn load_motions(&self, source: &dyn MotionSource) {
        let mut names = vec![self.settings.animation.idle_clip.clone()];
        names.extend(self.settings.animation.gesture_clips.iter().cloned());

        let rig = self.avatar.rig_snapshot();
        self.library.load(source, &names, &rig, self.avatar.generation());
        self.animator.start_idle(&self.settings.animation.idle_clip);
    }

    /// Start the frame loop and the blink loop.
    pub fn start(&self) {
        let mut frame_task = self.frame_task.lock();
        if frame_task.is_some() {
            return;
        }
        let scheduler = self.scheduler.clone();
        *frame_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(FRAME_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = tokio::time::Instant::now();
            loop {
                interval.tick().await;
                let now = tokio::time::Instant::now();
                scheduler.tick(now - last);
                last = now;
            }
        }));
        self.blink.start();
        tracing::info!(session = %self.id, "session started");
    }

    /// Run one chat turn: reply, then plan and speech concurrently, then
    /// play the sequence while lip sync tracks the audio. Returns the reply
    /// once the animation sequence completes.
    pub async fn handle_message(&self, text: &str) -> String {
        tracing::info!(session = %self.id, "user message received");

        let reply = self.chat.reply(text, Some(&self.settings.chat.system_prompt)).await;

        let (plan, audio) = tokio::join!(self.planner.plan(&reply), self.tts.synthesize(&reply));

        match audio {
            Some(buffer) => {
                self.lipsync.attach(PlaybackSession::start(buffer));
            }
            None => {
                tracing::warn!(session = %self.id, "no audio for this turn, skipping lip sync");
            }
        }

        self.sequencer.play_sequence(&plan).await;
        reply
    }

    /// Begin voice capture, if recognition is available. Consumers branch on
    /// the capability instead of calling into a missing engine.
    pub fn start_listening(&self) -> bool {
        if !self.recognizer.is_supported() {
            tracing::warn!(session = %self.id, "speech recognition unavailable");
            return false;
        }
        self.recognizer.start()
    }

    pub fn stop_listening(&self) -> bool {
        self.recognizer.stop()
    }

    /// Subscribe to recognition events. A `NoSpeech` error is recoverable;
    /// callers log it and re-arm.
    pub fn subscribe_speech(
        &self,
    ) -> tokio::sync::broadcast::Receiver<avatar_client::SpeechEvent> {
        self.recognizer.subscribe()
    }

    /// Swap the loaded model: stop the blink loop, abandon in-flight
    /// animations and the clip player, swap the rig, reload motions, then
    /// restart blinking against the new model.
    pub fn swap_model(&self, avatar_settings: &AvatarSettings, source: Option<&dyn MotionSource>) {
        tracing::info!(session = %self.id, model = %avatar_settings.model_path, "swapping model");
        self.blink.stop();
        self.lipsync.detach();
        self.animator.rebind();
        self.avatar.swap_rig(build_rig(avatar_settings));
        if let Some(source) = source {
            self.load_motions(source);
        } else {
            self.library.clear();
        }
        self.blink.start();
    }

    /// Tear the session down: every loop, timer, and frame callback is
    /// cancelled so nothing references the avatar afterwards.
    pub fn shutdown(&self) {
        self.blink.stop();
        self.lipsync.detach();
        self.animator.cleanup();
        self.scheduler.cancel_all();
        if let Some(task) = self.frame_task.lock().take() {
            task.abort();
        }
        tracing::info!(session = %self.id, "session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.frame_task.lock().take() {
            task.abort();
        }
    }
}
