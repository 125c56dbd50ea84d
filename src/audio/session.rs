//! One recording lifecycle, from microphone acquisition to a finalized
//! [`CapturePayload`].
//!
//! # Lifecycle
//!
//! ```text
//! start() ──▶ Requesting ──acquire ok──▶ Active ──stop()──▶ Finalizing ──▶ Done
//!                  └───acquire err──▶ Failed
//! ```
//!
//! The session runs on a dedicated capture thread because cpal streams are
//! not `Send`.  While `Active` it accumulates mono samples in arrival order
//! and pushes live waveform frames through the supplied sink.  `stop()`
//! releases the device, encodes everything captured so far into a single
//! WAV payload, and emits [`SessionEvent::Finalized`].
//!
//! Guarantees:
//!
//! * every chunk that arrived before `stop()` is included in the payload;
//! * chunks arriving after `stop()` are ignored (the stream is torn down
//!   before finalization);
//! * a capture with zero chunks still finalizes to a valid empty payload —
//!   rejecting empty audio is the conversation client's job;
//! * the session is single-use: it is constructed by `start()` and a second
//!   `stop()` is rejected.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::audio::capture::{CaptureError, Microphone};
use crate::audio::spectrum::SpectrumAnalyzer;
use crate::waveform::WaveformFrame;

/// Poll interval for the capture thread's chunk loop.
const CHUNK_POLL: Duration = Duration::from_millis(10);

/// Minimum spacing between live waveform frames (~60 Hz).
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Sample rate stamped on a payload that captured no audio at all.
const EMPTY_PAYLOAD_RATE: u32 = 44_100;

// ---------------------------------------------------------------------------
// CapturePayload
// ---------------------------------------------------------------------------

/// The finalized product of one capture session: a single WAV-encoded blob
/// plus its metadata.  Created once at finalize time and consumed by the
/// conversation client.
#[derive(Debug, Clone)]
pub struct CapturePayload {
    /// Complete WAV file (16-bit PCM, mono).
    pub wav_bytes: Vec<u8>,
    /// Captured audio length in seconds (`0.0` for an empty capture).
    pub duration_secs: f32,
    /// Sample rate of the encoded audio in Hz.
    pub sample_rate: u32,
}

impl CapturePayload {
    /// `true` when the session captured no audio frames.
    ///
    /// An empty payload is still structurally valid (it carries a WAV
    /// header); the conversation client rejects it before any network I/O.
    pub fn is_empty(&self) -> bool {
        self.duration_secs == 0.0
    }
}

// ---------------------------------------------------------------------------
// Session phase / events / errors
// ---------------------------------------------------------------------------

/// Observable phase of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the microphone to be granted.
    Requesting,
    /// Device open; chunks are being accumulated.
    Active,
    /// Stop requested; draining and encoding.
    Finalizing,
    /// Payload emitted; the session is spent.
    Done,
    /// acquisition failed; the session is spent.
    Failed,
}

/// Terminal notifications delivered to the session owner.
#[derive(Debug)]
pub enum SessionEvent {
    /// Microphone acquisition failed; no payload will follow.
    Failed(CaptureError),
    /// The session finalized into exactly one payload.
    Finalized(CapturePayload),
}

/// Misuse of a single-use session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("capture session was already stopped")]
    AlreadyStopped,
}

/// Receives live waveform frames plus the elapsed capture time.
pub type FrameSink = Box<dyn Fn(WaveformFrame, f32) + Send>;

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Handle to one in-flight recording.
///
/// Constructed by [`CaptureSession::start`]; there is deliberately no way
/// to restart a session — one instance maps to one recording.
pub struct CaptureSession {
    stop: Arc<AtomicBool>,
    phase: Arc<Mutex<SessionPhase>>,
    stopped: bool,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureSession {
    /// Begin a recording.
    ///
    /// Spawns the capture thread, which acquires the microphone and then
    /// accumulates chunks until [`stop`](Self::stop) is called.  Outcomes
    /// arrive on `events`; live frames flow through `on_frame`.
    pub fn start(
        mic: Arc<dyn Microphone>,
        events: UnboundedSender<SessionEvent>,
        on_frame: FrameSink,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let phase = Arc::new(Mutex::new(SessionPhase::Requesting));

        let thread = {
            let stop = Arc::clone(&stop);
            let phase = Arc::clone(&phase);
            std::thread::Builder::new()
                .name("capture-session".into())
                .spawn(move || capture_loop(mic, events, on_frame, stop, phase))
                .ok()
        };

        if thread.is_none() {
            log::error!("capture: failed to spawn capture thread");
        }

        Self {
            stop,
            phase,
            stopped: false,
            thread,
        }
    }

    /// Request finalization.
    ///
    /// Non-blocking: the capture thread releases the device, drains the
    /// chunks that arrived before this call, encodes the payload, and emits
    /// [`SessionEvent::Finalized`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyStopped`] on a second call — the
    /// session is single-use.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.stopped {
            return Err(SessionError::AlreadyStopped);
        }
        self.stopped = true;
        self.stop.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Current lifecycle phase (primarily for diagnostics and tests).
    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    /// Tear the session down without waiting for its payload.
    ///
    /// Used when the controller itself is shutting down; any event the
    /// thread still emits lands on a closed channel and is discarded.
    pub fn abandon(mut self) {
        let _ = self.stop();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // The capture thread exits promptly once the flag is set; detach it.
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            drop(thread);
        }
    }
}

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

fn capture_loop(
    mic: Arc<dyn Microphone>,
    events: UnboundedSender<SessionEvent>,
    on_frame: FrameSink,
    stop: Arc<AtomicBool>,
    phase: Arc<Mutex<SessionPhase>>,
) {
    let (chunk_tx, chunk_rx) = mpsc::channel();

    // Requesting → Active | Failed.  The guard must stay on this thread
    // (cpal streams are not Send) and is dropped before finalization so no
    // chunk can arrive after stop.
    let guard = match mic.acquire(chunk_tx) {
        Ok(guard) => guard,
        Err(e) => {
            *phase.lock().unwrap() = SessionPhase::Failed;
            log::warn!("capture: microphone acquisition failed: {e}");
            let _ = events.send(SessionEvent::Failed(e));
            return;
        }
    };
    *phase.lock().unwrap() = SessionPhase::Active;
    log::debug!("capture: session active");

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = None;
    let mut analyzer = SpectrumAnalyzer::new();
    let started = Instant::now();
    let mut last_frame: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        match chunk_rx.recv_timeout(CHUNK_POLL) {
            Ok(chunk) => {
                sample_rate.get_or_insert(chunk.sample_rate);
                let mono = downmix_mono(&chunk.samples, chunk.channels);
                analyzer.push_samples(&mono);
                samples.extend_from_slice(&mono);

                if last_frame.map_or(true, |t| t.elapsed() >= FRAME_INTERVAL) {
                    last_frame = Some(Instant::now());
                    let frame = WaveformFrame::live(&analyzer.magnitudes());
                    on_frame(frame, started.elapsed().as_secs_f32());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            // Source hung up (only test microphones do this); wait for stop.
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(CHUNK_POLL);
            }
        }
    }

    *phase.lock().unwrap() = SessionPhase::Finalizing;

    // Release the device, then take everything that was emitted before the
    // stream went down.  Nothing produced after this point is observed.
    drop(guard);
    while let Ok(chunk) = chunk_rx.try_recv() {
        sample_rate.get_or_insert(chunk.sample_rate);
        samples.extend_from_slice(&downmix_mono(&chunk.samples, chunk.channels));
    }

    let rate = sample_rate.unwrap_or(EMPTY_PAYLOAD_RATE);
    match encode_wav(&samples, rate) {
        Ok(wav_bytes) => {
            let payload = CapturePayload {
                wav_bytes,
                duration_secs: samples.len() as f32 / rate as f32,
                sample_rate: rate,
            };
            *phase.lock().unwrap() = SessionPhase::Done;
            log::debug!(
                "capture: finalized {:.2} s ({} bytes)",
                payload.duration_secs,
                payload.wav_bytes.len()
            );
            let _ = events.send(SessionEvent::Finalized(payload));
        }
        Err(e) => {
            *phase.lock().unwrap() = SessionPhase::Failed;
            log::error!("capture: WAV encoding failed: {e}");
            let _ = events.send(SessionEvent::Failed(CaptureError::Denied(e.to_string())));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Average interleaved channels down to mono.
fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Encode mono `f32` samples as a complete 16-bit PCM WAV file in memory.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(clamped)?;
        }
        writer.finalize()?;
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
