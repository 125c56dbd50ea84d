//! Audio pipeline — microphone capture → spectrum analysis → capture session.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix_mono
//!           → SpectrumAnalyzer → live WaveformFrame (visual feedback)
//!           → sample accumulator → WAV encode → CapturePayload
//! ```
//!
//! [`CaptureSession`] owns one full recording lifecycle on a dedicated
//! thread; [`Microphone`] is the hardware seam (cpal in production, mocks
//! in tests).

pub mod capture;
pub mod session;
pub mod spectrum;

pub use capture::{AudioChunk, CaptureError, CpalMicrophone, Microphone, StreamGuard};
pub use session::{
    CapturePayload, CaptureSession, FrameSink, SessionError, SessionEvent, SessionPhase,
};
pub use spectrum::{SpectrumAnalyzer, BIN_COUNT, FFT_SIZE};

// test-only re-exports so the controller test module can import the mock
// microphones without spelling out the full capture::mock path.
#[cfg(test)]
pub use capture::mock::{DeniedMicrophone, MockMicrophone};
