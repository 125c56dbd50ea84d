//! Waveform frames for the 20-bar visualisation.
//!
//! A [`WaveformFrame`] is a snapshot of 20 visual amplitudes in
//! `[1.0, 20.0]`.  Three constructors cover the three sampling modes:
//!
//! * [`WaveformFrame::live`] — derived from a frequency-magnitude spectrum
//!   while the microphone is recording (deterministic).
//! * [`WaveformFrame::synthetic`] — random cadence shown while the answer is
//!   being spoken (no real signal is available during TTS playback).
//! * [`WaveformFrame::resting`] — flat baseline shown when idle.
//!
//! Frames are replaced wholesale on every tick; nothing here smooths or
//! mutates a previous frame.
//!
//! # Example
//!
//! ```rust
//! use voice_assistant::waveform::{WaveformFrame, FRAME_SLOTS, IDLE_LEVEL};
//!
//! let frame = WaveformFrame::resting();
//! assert_eq!(frame.bars.len(), FRAME_SLOTS);
//! assert!(frame.bars.iter().all(|&b| b == IDLE_LEVEL));
//! ```

use rand::Rng;

/// Number of bars in every frame (matches the 20-column widget).
pub const FRAME_SLOTS: usize = 20;

/// Lowest visible amplitude in live mode.
pub const MIN_LEVEL: f32 = 1.0;

/// Highest amplitude in any mode.
pub const MAX_LEVEL: f32 = 20.0;

/// Flat baseline amplitude shown while idle.
pub const IDLE_LEVEL: f32 = 3.0;

/// Lowest amplitude emitted by the synthetic (speaking) cadence.
pub const SYNTHETIC_MIN: f32 = 5.0;

/// Linear divisor mapping a byte-scaled spectrum magnitude (0..=255) into
/// the visual range.  255 / 12 ≈ 21, clamped down to [`MAX_LEVEL`].
const SPECTRUM_DIVISOR: f32 = 12.0;

// ---------------------------------------------------------------------------
// SamplerMode
// ---------------------------------------------------------------------------

/// Which signal is currently driving the waveform.
///
/// The controller decides the active mode from its interaction state; frame
/// writers tag each frame with the mode that produced it so a tick from a
/// mode that has since ended can be discarded instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerMode {
    /// Real spectrum from the microphone (recording).
    Live,
    /// Random cadence during speech playback.
    Synthetic,
}

// ---------------------------------------------------------------------------
// WaveformFrame
// ---------------------------------------------------------------------------

/// One snapshot of the 20-bar visualisation.
///
/// `bars` always has exactly [`FRAME_SLOTS`] entries; every entry lies in
/// `[MIN_LEVEL, MAX_LEVEL]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformFrame {
    /// Visual amplitude per bar.
    pub bars: Vec<f32>,
}

impl WaveformFrame {
    /// The resting baseline: every bar at [`IDLE_LEVEL`].
    pub fn resting() -> Self {
        Self {
            bars: vec![IDLE_LEVEL; FRAME_SLOTS],
        }
    }

    /// Build a frame from a byte-scaled frequency spectrum (each magnitude
    /// in `0..=255`, as produced by
    /// [`SpectrumAnalyzer`](crate::audio::SpectrumAnalyzer)).
    ///
    /// The spectrum is partitioned into [`FRAME_SLOTS`] equal buckets; the
    /// magnitude at the start of each bucket is mapped through a fixed
    /// linear scale and clamped to `[MIN_LEVEL, MAX_LEVEL]`.  Deterministic
    /// for identical spectra.  An empty spectrum yields an all-minimum
    /// frame.
    pub fn live(spectrum: &[f32]) -> Self {
        if spectrum.is_empty() {
            return Self {
                bars: vec![MIN_LEVEL; FRAME_SLOTS],
            };
        }

        let bars = (0..FRAME_SLOTS)
            .map(|i| {
                let index = i * spectrum.len() / FRAME_SLOTS;
                (spectrum[index] / SPECTRUM_DIVISOR).clamp(MIN_LEVEL, MAX_LEVEL)
            })
            .collect();

        Self { bars }
    }

    /// Build a synthetic frame: independent uniform amplitudes in
    /// `[SYNTHETIC_MIN, MAX_LEVEL]` per bar, each tick independent of the
    /// previous.  Intentionally noisy — no smoothing.
    pub fn synthetic() -> Self {
        Self::synthetic_with(&mut rand::rng())
    }

    /// Same as [`synthetic`](Self::synthetic) with a caller-supplied RNG
    /// (deterministic in tests).
    pub fn synthetic_with<R: Rng>(rng: &mut R) -> Self {
        let bars = (0..FRAME_SLOTS)
            .map(|_| rng.random_range(SYNTHETIC_MIN..=MAX_LEVEL).floor())
            .collect();
        Self { bars }
    }
}

impl Default for WaveformFrame {
    fn default() -> Self {
        Self::resting()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
