//! Time- and frequency-domain audio features
//!
//! The lip-sync engine samples two raw signals per frame: RMS energy of the
//! time-domain window (loudness) and the average magnitude of the upper
//! frequency bins (sibilance/brightness). Magnitudes are mapped onto the
//! same normalized [0, 1] range a browser analyser node reports, so the
//! downstream gain constants keep their meaning.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Decibel floor/ceiling of the normalized magnitude mapping.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Root-mean-square energy of a zero-centered `[-1, 1]` window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Average of the normalized bins in `[start_ratio, end_ratio)` of the
/// spectrum.
pub fn band_average(bins: &[f32], start_ratio: f32, end_ratio: f32) -> f32 {
    let start = (bins.len() as f32 * start_ratio) as usize;
    let end = ((bins.len() as f32 * end_ratio) as usize).min(bins.len());
    if start >= end {
        return 0.0;
    }
    bins[start..end].iter().sum::<f32>() / (end - start) as f32
}

/// Fixed-size FFT magnitude analyzer.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let size = size.next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(size);
        Self {
            fft,
            size,
            buffer: vec![Complex::new(0.0, 0.0); size],
            magnitudes: vec![0.0; size / 2],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Magnitude spectrum of `samples`, one normalized `[0, 1]` value per
    /// bin over the positive frequencies. Short windows are zero-padded.
    pub fn magnitudes(&mut self, samples: &[f32]) -> &[f32] {
        for (slot, sample) in self.buffer.iter_mut().zip(samples.iter().chain(std::iter::repeat(&0.0))) {
            *slot = Complex::new(*sample, 0.0);
        }
        self.fft.process(&mut self.buffer);

        for (slot, c) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            let magnitude = (c.re * c.re + c.im * c.im).sqrt() / self.size as f32;
            *slot = if magnitude > 0.0 {
                let db = 20.0 * magnitude.log10();
                ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        &self.magnitudes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&vec![0.0; 512]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_full_scale_square() {
        let window: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&window) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_tone_concentrates_in_low_bins() {
        let size = 1024;
        let mut analyzer = SpectrumAnalyzer::new(size);
        // 8 cycles over the window lands in bin 8, well below 30%.
        let window: Vec<f32> =
            (0..size).map(|i| (i as f32 / size as f32 * TAU * 8.0).sin()).collect();
        let bins = analyzer.magnitudes(&window).to_vec();

        let low = band_average(&bins, 0.0, 0.3);
        let high = band_average(&bins, 0.3, 1.0);
        assert!(low > high, "low tone should not read as sibilance");
    }

    #[test]
    fn test_high_tone_reads_as_brightness() {
        let size = 1024;
        let mut analyzer = SpectrumAnalyzer::new(size);
        // 300 cycles lands in bin 300 of 512, inside the upper 70%.
        let window: Vec<f32> =
            (0..size).map(|i| (i as f32 / size as f32 * TAU * 300.0).sin()).collect();
        let bins = analyzer.magnitudes(&window).to_vec();

        let high = band_average(&bins, 0.3, 1.0);
        assert!(high > 0.0);
        assert!(high > band_average(&bins, 0.0, 0.1));
    }

    #[test]
    fn test_silence_has_zero_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(512);
        let bins = analyzer.magnitudes(&vec![0.0; 512]);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_band_average_degenerate_range() {
        assert_eq!(band_average(&[1.0, 1.0], 0.9, 0.1), 0.0);
        assert_eq!(band_average(&[], 0.0, 1.0), 0.0);
    }
}
