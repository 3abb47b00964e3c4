//! Avatar agent entry point
//!
//! Loads settings, wires the HTTP service clients, and runs a line-based
//! chat loop against the animated avatar until EOF or ctrl-c.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use avatar_anim::JsonMotionSource;
use avatar_app::Session;
use avatar_client::{HttpChatService, HttpSpeechSynthesizer, VoiceParams};
use avatar_config::{load_settings, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::args().nth(1);
    let settings = load_settings(env.as_deref())?;

    init_tracing(&settings);
    tracing::info!("Starting avatar agent v{}", env!("CARGO_PKG_VERSION"));

    let chat = Arc::new(HttpChatService::new(
        &settings.chat.endpoint,
        &settings.chat.model,
        settings.chat.api_key.clone(),
    ));
    let tts = Arc::new(HttpSpeechSynthesizer::new(
        &settings.tts.endpoint,
        VoiceParams {
            ref_audio_path: settings.tts.ref_audio_path.clone(),
            text_lang: settings.tts.text_lang.clone(),
            prompt_text: settings.tts.prompt_text.clone(),
            prompt_lang: settings.tts.prompt_lang.clone(),
        },
    ));

    let session = Session::new(settings.clone(), chat, tts)?;
    let motions = JsonMotionSource::new(&settings.animation.clips_dir);
    session.load_motions(&motions);
    session.start();
    tracing::info!(session = %session.id(), "ready; type a message and press enter");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => {
                        let reply = session.handle_message(line.trim()).await;
                        println!("{reply}");
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
