//! WAV decoding
//!
//! The speech-synthesis collaborator returns WAV payloads; this module
//! decodes them into the mono float buffer the analysis code works on.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::AudioError;

/// Decoded audio: mono samples normalized to `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// The `len` samples ending at `at_secs`, zero-padded on the left when
    /// playback has not yet produced a full window.
    pub fn window(&self, at_secs: f32, len: usize) -> Vec<f32> {
        let end = ((at_secs * self.sample_rate as f32) as usize).min(self.samples.len());
        let start = end.saturating_sub(len);
        let mut out = vec![0.0; len - (end - start)];
        out.extend_from_slice(&self.samples[start..end]);
        out
    }
}

/// Decode a WAV payload, mixing multi-channel audio down to mono.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::Decode(e.to_string()))?
        }
        (format, bits) => {
            return Err(AudioError::Unsupported(format!("{format:?} {bits}-bit WAV")));
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer { samples, sample_rate: spec.sample_rate })
}
