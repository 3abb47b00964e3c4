//! Speech synthesis service
//!
//! Request: reply text plus voice-reference parameters. Response: a WAV
//! payload, decoded here into an [`AudioBuffer`]. Any failure returns `None`
//! after logging — playback and lip-sync are simply skipped for the turn.

use async_trait::async_trait;
use serde::Serialize;

use avatar_audio::{decode_wav, AudioBuffer};

use crate::ClientError;

/// Voice-reference parameters for the synthesis endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceParams {
    pub ref_audio_path: String,
    pub text_lang: String,
    pub prompt_text: String,
    pub prompt_lang: String,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            ref_audio_path: String::new(),
            text_lang: "en".to_string(),
            prompt_text: String::new(),
            prompt_lang: "en".to_string(),
        }
    }
}

/// Text-to-speech provider.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`; `None` on any failure.
    async fn synthesize(&self, text: &str) -> Option<AudioBuffer>;
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    #[serde(flatten)]
    voice: &'a VoiceParams,
    media_type: &'a str,
    streaming_mode: bool,
}

/// Synthesis over a SoVITS-style HTTP endpoint.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    voice: VoiceParams,
}

impl HttpSpeechSynthesizer {
    pub fn new(endpoint: impl Into<String>, voice: VoiceParams) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), voice }
    }

    async fn request(&self, text: &str) -> Result<AudioBuffer, ClientError> {
        let body = TtsRequest {
            text,
            voice: &self.voice,
            media_type: "wav",
            streaming_mode: false,
        };
        let bytes = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        decode_wav(&bytes).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<AudioBuffer> {
        match self.request(text).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                tracing::error!(error = %e, "speech synthesis failed, skipping audio");
                None
            }
        }
    }
}

/// Produces silence sized to the text (~50 ms per character); for tests and
/// offline runs.
pub struct SilentSynthesizer {
    sample_rate: u32,
}

impl SilentSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self::new(22050)
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<AudioBuffer> {
        let samples = text.chars().count() * (self.sample_rate as usize / 20);
        Some(AudioBuffer { samples: vec![0.0; samples], sample_rate: self.sample_rate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silent_synthesizer_scales_with_text() {
        let tts = SilentSynthesizer::new(20000);
        let short = tts.synthesize("hi").await.unwrap();
        let long = tts.synthesize("hello there, avatar").await.unwrap();
        assert!(long.samples.len() > short.samples.len());
        assert_eq!(short.samples.len(), 2 * 1000);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_none() {
        let tts = HttpSpeechSynthesizer::new("http://127.0.0.1:1/tts", VoiceParams::default());
        assert!(tts.synthesize("hello").await.is_none());
    }
}
