//! Audio output to the default speaker device.
//!
//! [`play_samples`] blocks the calling thread until the samples have been
//! written out or the cancellation flag is raised; the synthesizer runs it
//! on the tokio blocking pool.  The cpal output stream lives entirely
//! inside this function — dropping it on return releases the device.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::speech::engine::{CancelFlag, SpeechError};

/// How often the playback loop checks for completion / cancellation.
const PLAYBACK_POLL: Duration = Duration::from_millis(20);

/// Play interleaved `f32` samples on the default output device.
///
/// Picks an output configuration matching the source sample rate, mono
/// preferred with a stereo fallback (mono sources are duplicated across
/// stereo channels).  Returns once every sample has been consumed by the
/// device callback, or early when `cancel` is raised.
///
/// # Errors
///
/// Returns [`SpeechError::Device`] when no output device exists, no
/// configuration supports the source rate, or the stream fails to start.
pub fn play_samples(
    samples: &[f32],
    sample_rate: u32,
    source_channels: u16,
    cancel: &CancelFlag,
) -> Result<(), SpeechError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SpeechError::Device("no output device available".into()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| SpeechError::Device(e.to_string()))?
        .find(|c| {
            c.channels() == source_channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // Fallback: stereo output, duplicating a mono source.
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| {
            SpeechError::Device(format!("no output config supports {sample_rate} Hz"))
        })?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let out_channels = config.channels as usize;
    let src_channels = source_channels.max(1) as usize;

    let data = Arc::new(samples.to_vec());
    let cursor = Arc::new(AtomicUsize::new(0));
    let total = data.len();

    let stream = {
        let data = Arc::clone(&data);
        let cursor = Arc::clone(&cursor);

        device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = cursor.load(Ordering::Relaxed);
                    for frame in out.chunks_mut(out_channels) {
                        if pos >= data.len() {
                            frame.fill(0.0);
                            continue;
                        }
                        // Source frames map onto device frames; a mono
                        // source fills every device channel.
                        for (ch, slot) in frame.iter_mut().enumerate() {
                            let src_idx = pos + ch.min(src_channels - 1);
                            *slot = data.get(src_idx).copied().unwrap_or(0.0);
                        }
                        pos += src_channels;
                    }
                    cursor.store(pos, Ordering::Relaxed);
                },
                |err: cpal::StreamError| {
                    log::error!("cpal output stream error: {err}");
                },
                None,
            )
            .map_err(|e| SpeechError::Device(e.to_string()))?
    };

    stream
        .play()
        .map_err(|e| SpeechError::Device(e.to_string()))?;

    // Wait for the callback to consume everything, or for cancellation.
    while cursor.load(Ordering::Relaxed) < total {
        if cancel.load(Ordering::SeqCst) {
            log::debug!("playback: cancelled mid-stream");
            break;
        }
        std::thread::sleep(PLAYBACK_POLL);
    }

    // Dropping the stream stops the hardware and releases the device.
    drop(stream);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
