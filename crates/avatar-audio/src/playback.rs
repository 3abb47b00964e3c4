//! Playback session clock
//!
//! One session represents one play-through of one synthesized utterance.
//! The lip-sync task advances the clock each frame and reads the current
//! analysis window from it; pausing or reaching the end flips the session
//! over, which is the lip-sync stop condition.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::wav::AudioBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Playing,
    Paused,
    Ended,
}

struct Position {
    secs: f32,
    state: State,
}

/// Clock over one decoded utterance.
pub struct PlaybackSession {
    buffer: Arc<AudioBuffer>,
    position: Mutex<Position>,
}

impl PlaybackSession {
    /// Begin playing `buffer` from the start.
    pub fn start(buffer: AudioBuffer) -> Arc<Self> {
        Arc::new(Self {
            buffer: Arc::new(buffer),
            position: Mutex::new(Position { secs: 0.0, state: State::Playing }),
        })
    }

    /// Advance the clock by `dt` seconds while playing.
    pub fn advance(&self, dt: f32) {
        let mut pos = self.position.lock();
        if pos.state != State::Playing {
            return;
        }
        pos.secs += dt;
        if pos.secs >= self.buffer.duration_secs() {
            pos.secs = self.buffer.duration_secs();
            pos.state = State::Ended;
        }
    }

    pub fn pause(&self) {
        let mut pos = self.position.lock();
        if pos.state == State::Playing {
            pos.state = State::Paused;
        }
    }

    pub fn resume(&self) {
        let mut pos = self.position.lock();
        if pos.state == State::Paused {
            pos.state = State::Playing;
        }
    }

    /// True once the session is paused or has reached the end of the
    /// utterance.
    pub fn is_over(&self) -> bool {
        self.position.lock().state != State::Playing
    }

    pub fn position_secs(&self) -> f32 {
        self.position.lock().secs
    }

    pub fn duration_secs(&self) -> f32 {
        self.buffer.duration_secs()
    }

    /// The `len` most recent samples at the current position.
    pub fn window(&self, len: usize) -> Vec<f32> {
        let at = self.position.lock().secs;
        self.buffer.window(at, len)
    }
}
