//! Speech output — text-to-speech synthesis and audible playback.
//!
//! # Pipeline
//!
//! ```text
//! answer text → SpeechSynthesizer (HTTP TTS) → WAV decode
//!            → cpal output stream → speakers
//! ```
//!
//! [`PlaybackSession`] drives one spoken answer: it registers itself in a
//! process-wide registry so a new session (or a fresh recording) silences
//! whatever was speaking before, and while synthesis runs it emits a
//! synthetic waveform frame every 100 ms for the on-screen bars.

pub mod engine;
pub mod playback;
pub mod session;

pub use engine::{new_cancel_flag, CancelFlag, HttpSynthesizer, SpeechError, SpeechSynthesizer};
pub use session::{cancel_active, PlaybackEvent, PlaybackSession, SyntheticSink};
