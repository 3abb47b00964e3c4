//! Speech recognition boundary
//!
//! The recognition engine itself is platform-provided; this module fixes the
//! event contract and the capability flag consumers must branch on. "No
//! speech detected" is a recoverable, loggable condition, never fatal.

use tokio::sync::broadcast;

/// Recognition failure modes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// Nothing intelligible was heard. Recoverable: log and re-arm.
    #[error("no speech detected")]
    NoSpeech,

    /// Recognition is not available on this platform.
    #[error("speech recognition not supported")]
    NotSupported,

    /// Recording was aborted before a result.
    #[error("recording aborted")]
    Aborted,

    #[error("recognition error: {0}")]
    Other(String),
}

/// Events delivered while a recording is active.
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    Started,
    /// Final transcript of the utterance.
    Result(String),
    Error(SpeechError),
    Ended,
}

/// Event-driven speech recognizer.
///
/// Consumers must check [`is_supported`] and branch, rather than call into
/// an engine that is not there.
///
/// [`is_supported`]: SpeechRecognizer::is_supported
pub trait SpeechRecognizer: Send + Sync {
    /// Whether recognition is available at all.
    fn is_supported(&self) -> bool;

    /// Begin recording. Returns `false` if unsupported or already recording.
    fn start(&self) -> bool;

    /// Stop recording. Returns `false` if nothing was recording.
    fn stop(&self) -> bool;

    /// Subscribe to recognition events.
    fn subscribe(&self) -> broadcast::Receiver<SpeechEvent>;
}

/// The capability-off recognizer: reports unsupported and refuses to start.
pub struct NullRecognizer {
    event_tx: broadcast::Sender<SpeechEvent>,
}

impl Default for NullRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NullRecognizer {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self { event_tx }
    }
}

impl SpeechRecognizer for NullRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&self) -> bool {
        tracing::warn!("speech recognition not supported on this platform");
        false
    }

    fn stop(&self) -> bool {
        false
    }

    fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.event_tx.subscribe()
    }
}

/// Emits a scripted sequence of transcripts, one per `start`; for tests.
pub struct ScriptedRecognizer {
    transcripts: parking_lot::Mutex<Vec<String>>,
    event_tx: broadcast::Sender<SpeechEvent>,
}

impl ScriptedRecognizer {
    pub fn new(transcripts: Vec<String>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self { transcripts: parking_lot::Mutex::new(transcripts), event_tx }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    fn start(&self) -> bool {
        let next = {
            let mut transcripts = self.transcripts.lock();
            if transcripts.is_empty() { None } else { Some(transcripts.remove(0)) }
        };
        let _ = self.event_tx.send(SpeechEvent::Started);
        match next {
            Some(text) => {
                let _ = self.event_tx.send(SpeechEvent::Result(text));
            }
            None => {
                let _ = self.event_tx.send(SpeechEvent::Error(SpeechError::NoSpeech));
            }
        }
        let _ = self.event_tx.send(SpeechEvent::Ended);
        true
    }

    fn stop(&self) -> bool {
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.event_tx.subscribe()
    }
}
