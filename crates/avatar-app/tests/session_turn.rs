//! Integration tests for a full chat turn (chat -> plan + speech -> animation)
//!
//! These run against in-process service stubs; no network, no real clock.

use std::sync::Arc;

use async_trait::async_trait;

use avatar_app::Session;
use avatar_client::{
    ChatService, FixedChatService, ScriptedRecognizer, SilentSynthesizer, SpeechEvent,
    SpeechSynthesizer,
};
use avatar_config::Settings;
use avatar_core::BlendShape;

/// Chat stub that answers conversationally, and with a plan when asked to
/// direct an animation (the planner reuses the chat backend).
struct PlanningChatStub {
    reply: String,
    plan_json: String,
}

#[async_trait]
impl ChatService for PlanningChatStub {
    async fn reply(&self, message: &str, _system_prompt: Option<&str>) -> String {
        if message.contains("animation director") {
            self.plan_json.clone()
        } else {
            self.reply.clone()
        }
    }
}

fn make_session(chat: Arc<dyn ChatService>) -> Session {
    let tts: Arc<dyn SpeechSynthesizer> = Arc::new(SilentSynthesizer::default());
    Session::new(Settings::default(), chat, tts).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_turn_returns_reply_after_sequence() {
    let chat = Arc::new(PlanningChatStub {
        reply: "Hello there!".to_string(),
        plan_json: r#"[{"text":"Hello there!","expression":"happy","headMotion":"nod","gesture":"handWave","duration":1500,"intensity":0.8}]"#
            .to_string(),
    });
    let session = make_session(chat);
    session.start();

    let mut events = session.subscribe_events();
    let reply = session.handle_message("hi").await;
    assert_eq!(reply, "Hello there!");

    // Exactly one step ran, then the sequence completed.
    let mut starts = 0;
    let mut completes = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            avatar_anim::SequencerEvent::StepStarted { .. } => starts += 1,
            avatar_anim::SequencerEvent::SequenceComplete { steps } => {
                completes += 1;
                assert_eq!(steps, 1);
            }
            _ => {}
        }
    }
    assert_eq!(starts, 1);
    assert_eq!(completes, 1);

    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_unusable_plan_degrades_to_fallback_turn() {
    // The backend never returns JSON, so the planner falls back to the
    // single-step neutral plan; the turn still completes with the reply.
    let chat = Arc::new(FixedChatService::new("Just chatting."));
    let session = make_session(chat);
    session.start();

    let mut events = session.subscribe_events();
    let reply = session.handle_message("hello?").await;
    assert_eq!(reply, "Just chatting.");

    let mut fallback_step = None;
    while let Ok(event) = events.try_recv() {
        if let avatar_anim::SequencerEvent::StepStarted { step, .. } = event {
            fallback_step = Some(step);
        }
    }
    let step = fallback_step.expect("the fallback plan still animates the turn");
    assert_eq!(step.text, "Just chatting.");
    assert_eq!(step.duration_ms, 2000);
}

#[tokio::test(start_paused = true)]
async fn test_model_swap_bumps_generation_and_restarts_blinking() {
    let session = make_session(Arc::new(FixedChatService::new("x")));
    session.start();
    let generation = session.avatar().generation();

    session.swap_model(&avatar_config::AvatarSettings::default(), None);

    // Old-model caches key on the generation, so the bump invalidates them.
    assert_eq!(session.avatar().generation(), generation + 1);
    // The blink loop restarted against the new model (first blink fires
    // immediately).
    assert!(session.avatar().shape_value(BlendShape::Blink) > 0.0);
    session.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_voice_turn_through_scripted_recognizer() {
    let chat = Arc::new(FixedChatService::new("Heard you!"));
    let session = make_session(chat)
        .with_recognizer(Arc::new(ScriptedRecognizer::new(vec!["what's up".to_string()])));
    session.start();

    let mut speech = session.subscribe_speech();
    assert!(session.start_listening());

    let transcript = loop {
        match speech.recv().await.unwrap() {
            SpeechEvent::Result(text) => break text,
            SpeechEvent::Ended => panic!("recording ended without a transcript"),
            _ => {}
        }
    };
    assert_eq!(transcript, "what's up");

    let reply = session.handle_message(&transcript).await;
    assert_eq!(reply, "Heard you!");
    session.shutdown();
}

#[tokio::test]
async fn test_recognition_capability_is_branched_on() {
    // The default session carries the capability-off recognizer; listening
    // is refused rather than crashing into a missing engine.
    let session = make_session(Arc::new(FixedChatService::new("x")));
    assert!(!session.start_listening());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_all_frame_tasks() {
    let chat = Arc::new(FixedChatService::new("bye"));
    let session = make_session(chat);
    session.start();
    let _ = session.handle_message("hi").await;

    session.shutdown();
    // After shutdown no loop may keep writing the avatar; the blink shape
    // stays wherever teardown left it.
    let weight = session.avatar().shape_value(BlendShape::Blink);
    tokio::time::advance(std::time::Duration::from_secs(5)).await;
    assert_eq!(session.avatar().shape_value(BlendShape::Blink), weight);
}
