//! Microphone access via `cpal`, behind the [`Microphone`] trait.
//!
//! [`CpalMicrophone`] wraps the cpal host/device/stream lifecycle.  Calling
//! [`Microphone::acquire`] opens the default input device and begins
//! streaming [`AudioChunk`]s over an mpsc channel.  The returned boxed
//! [`StreamGuard`] is a RAII handle — dropping it stops the hardware stream
//! and releases the device.
//!
//! The trait seam exists so the capture session (and the controller above
//! it) can be exercised in tests without audio hardware.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the input callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]` at the device's
/// native rate.  The capture session downmixes to mono before accumulating.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring or running the microphone.
///
/// All variants are recoverable: the controller surfaces the message and
/// returns to idle.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("microphone access denied or device unavailable: {0}")]
    Denied(String),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// Microphone trait
// ---------------------------------------------------------------------------

/// Opaque handle that keeps an input stream alive.
///
/// The guard is created and dropped on the capture thread; cpal streams are
/// not `Send`, so it never crosses threads.
pub trait StreamGuard: std::fmt::Debug {}

/// A no-op guard, used by test microphones that have nothing to release.
impl StreamGuard for () {}

/// Source of live audio chunks.
///
/// Implementors must be `Send + Sync` — the factory itself crosses into the
/// capture thread even though the stream it opens does not.
pub trait Microphone: Send + Sync {
    /// Open the device and start streaming chunks to `tx`.
    ///
    /// Returns a guard that keeps the stream alive; dropping the guard
    /// releases the device.  The capture session owns the guard for its
    /// whole lifecycle, so at most one acquisition is active at a time.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the device is missing, denied, or
    /// rejects the stream configuration.
    fn acquire(&self, tx: mpsc::Sender<AudioChunk>) -> Result<Box<dyn StreamGuard>, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Production [`Microphone`] backed by the system default input device.
///
/// The host and device are opened inside [`acquire`](Microphone::acquire)
/// rather than at construction, so a `CpalMicrophone` can be created on any
/// thread while the non-`Send` cpal objects stay on the capture thread.
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

struct CpalStreamGuard {
    _stream: cpal::Stream,
}

impl std::fmt::Debug for CpalStreamGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalStreamGuard").finish_non_exhaustive()
    }
}

impl StreamGuard for CpalStreamGuard {}

impl Microphone for CpalMicrophone {
    fn acquire(&self, tx: mpsc::Sender<AudioChunk>) -> Result<Box<dyn StreamGuard>, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal input stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        log::debug!("microphone acquired ({sample_rate} Hz, {channels} ch)");

        Ok(Box::new(CpalStreamGuard { _stream: stream }))
    }
}

// ---------------------------------------------------------------------------
// Test microphones
// ---------------------------------------------------------------------------

/// Deterministic [`Microphone`] doubles for session and controller tests.
#[cfg(test)]
pub mod mock {
    use super::*;

    /// Delivers a fixed set of chunks immediately on acquisition, then goes
    /// silent.
    pub struct MockMicrophone {
        chunks: Vec<AudioChunk>,
    }

    impl MockMicrophone {
        /// A microphone that delivers `count` mono chunks of `samples_each`
        /// constant samples at 16 kHz.
        pub fn with_chunks(count: usize, samples_each: usize) -> Self {
            let chunks = (0..count)
                .map(|i| AudioChunk {
                    samples: vec![0.1 * (i as f32 + 1.0); samples_each],
                    sample_rate: 16_000,
                    channels: 1,
                })
                .collect();
            Self { chunks }
        }

        /// A microphone that acquires successfully but never produces audio.
        pub fn silent() -> Self {
            Self { chunks: Vec::new() }
        }
    }

    impl Microphone for MockMicrophone {
        fn acquire(
            &self,
            tx: mpsc::Sender<AudioChunk>,
        ) -> Result<Box<dyn StreamGuard>, CaptureError> {
            for chunk in &self.chunks {
                let _ = tx.send(chunk.clone());
            }
            Ok(Box::new(()))
        }
    }

    /// Always fails acquisition — simulates a denied or missing device.
    pub struct DeniedMicrophone;

    impl Microphone for DeniedMicrophone {
        fn acquire(
            &self,
            _tx: mpsc::Sender<AudioChunk>,
        ) -> Result<Box<dyn StreamGuard>, CaptureError> {
            Err(CaptureError::Denied("permission denied".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
