//! Frequency-magnitude spectrum of the live microphone signal.
//!
//! [`SpectrumAnalyzer`] keeps a sliding window of the most recent
//! [`FFT_SIZE`] mono samples and produces byte-scaled magnitudes
//! (`0.0..=255.0` per bin) on demand.  The byte scale matches what the
//! live waveform mapping expects, so the `magnitude / 12 → [1, 20]`
//! conversion in [`crate::waveform`] stays a fixed linear scale.
//!
//! A Hann window is applied before the transform to reduce spectral
//! leakage.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Transform length.  Yields [`BIN_COUNT`] usable frequency bins.
pub const FFT_SIZE: usize = 256;

/// Number of magnitude bins returned by [`SpectrumAnalyzer::magnitudes`].
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Linear gain applied before byte-scaling.  Speech at normal levels peaks
/// well below full scale; without the gain the visualisation barely moves.
const MAGNITUDE_GAIN: f32 = 4.0;

// ---------------------------------------------------------------------------
// SpectrumAnalyzer
// ---------------------------------------------------------------------------

/// Sliding-window FFT over the most recent capture samples.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed Hann window coefficients.
    window: Vec<f32>,
    /// Most recent `FFT_SIZE` mono samples, oldest first.
    recent: Vec<f32>,
    /// Scratch buffer for the in-place transform.
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);

        let window = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        Self {
            fft,
            window,
            recent: vec![0.0; FFT_SIZE],
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    /// Feed newly captured mono samples into the sliding window.
    ///
    /// Only the last [`FFT_SIZE`] samples are retained; older data is
    /// shifted out.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.len() >= FFT_SIZE {
            self.recent.copy_from_slice(&samples[samples.len() - FFT_SIZE..]);
            return;
        }

        let keep = FFT_SIZE - samples.len();
        self.recent.copy_within(FFT_SIZE - keep.., 0);
        self.recent[keep..].copy_from_slice(samples);
    }

    /// Compute byte-scaled magnitudes (`0.0..=255.0`) for the current
    /// window.  Returns [`BIN_COUNT`] bins, DC first.
    pub fn magnitudes(&mut self) -> Vec<f32> {
        for (i, (&sample, &w)) in self.recent.iter().zip(&self.window).enumerate() {
            self.scratch[i] = Complex::new(sample * w, 0.0);
        }

        self.fft.process(&mut self.scratch);

        self.scratch[..BIN_COUNT]
            .iter()
            .map(|c| {
                let normalized = c.norm() * 2.0 / FFT_SIZE as f32;
                (normalized * MAGNITUDE_GAIN * 255.0).clamp(0.0, 255.0)
            })
            .collect()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_zero_magnitudes() {
        let mut analyzer = SpectrumAnalyzer::new();
        analyzer.push_samples(&vec![0.0; FFT_SIZE]);
        let mags = analyzer.magnitudes();
        assert_eq!(mags.len(), BIN_COUNT);
        assert!(mags.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn sine_wave_peaks_at_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new();

        // 8 full cycles across the window → energy concentrated in bin 8.
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 8.0 * i as f32 / FFT_SIZE as f32).sin() * 0.8
            })
            .collect();
        analyzer.push_samples(&samples);

        let mags = analyzer.magnitudes();
        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 8);
        assert!(mags[8] > 0.0);
    }

    #[test]
    fn magnitudes_stay_within_byte_range() {
        let mut analyzer = SpectrumAnalyzer::new();
        // Full-scale square-ish signal — worst case for clipping.
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        analyzer.push_samples(&samples);

        for m in analyzer.magnitudes() {
            assert!((0.0..=255.0).contains(&m), "magnitude out of range: {m}");
        }
    }

    #[test]
    fn short_pushes_slide_the_window() {
        let mut analyzer = SpectrumAnalyzer::new();
        // Two half-window pushes must fill the whole window.
        analyzer.push_samples(&vec![0.5; FFT_SIZE / 2]);
        analyzer.push_samples(&vec![0.5; FFT_SIZE / 2]);
        assert!(analyzer.recent.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn oversized_push_keeps_only_the_tail() {
        let mut analyzer = SpectrumAnalyzer::new();
        let mut samples = vec![0.0; FFT_SIZE * 2];
        for s in samples.iter_mut().skip(FFT_SIZE) {
            *s = 0.25;
        }
        analyzer.push_samples(&samples);
        assert!(analyzer.recent.iter().all(|&s| s == 0.25));
    }
}
