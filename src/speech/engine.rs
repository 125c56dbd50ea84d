//! Core `SpeechSynthesizer` trait and `HttpSynthesizer` implementation.
//!
//! `HttpSynthesizer` calls any OpenAI-compatible `/v1/audio/speech`
//! endpoint (OpenAI, Kokoro, local engines…), requests WAV output, and
//! plays the decoded samples on the default output device.  All connection
//! details come from [`TtsConfig`]; nothing is hardcoded.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TtsConfig;
use crate::speech::playback::play_samples;

/// Cooperative cancellation flag threaded through synthesis and playback.
///
/// Implementations check it between the network fetch and playback, and
/// playback polls it while samples are being written to the device.
pub type CancelFlag = Arc<AtomicBool>;

/// Convenience constructor for an unset [`CancelFlag`].
pub fn new_cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors that can occur while synthesizing or playing speech.
///
/// All variants are recoverable: the playback session logs the error and
/// fires its end event immediately, so the controller returns to idle.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// HTTP transport or connection error.
    #[error("speech synthesis request failed: {0}")]
    Request(String),

    /// The synthesis request did not complete within the timeout.
    #[error("speech synthesis timed out")]
    Timeout,

    /// The synthesis service answered with a non-success status.
    #[error("speech synthesis returned status {0}")]
    Status(u16),

    /// The returned audio could not be decoded.
    #[error("failed to decode synthesized audio: {0}")]
    Decode(String),

    /// The output device rejected or aborted playback.
    #[error("audio output failed: {0}")]
    Device(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Async trait for text-to-speech output.
///
/// `speak` resolves once audible output has finished (or was cancelled).
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn SpeechSynthesizer>`).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, cancel: &CancelFlag) -> Result<(), SpeechError>;
}

// ---------------------------------------------------------------------------
// HttpSynthesizer
// ---------------------------------------------------------------------------

/// Synthesizes via an OpenAI-compatible `/v1/audio/speech` endpoint and
/// plays the result on the default output device.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl HttpSynthesizer {
    /// Build a synthesizer from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`; a default client is the last-resort fallback
    /// if the builder fails.
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    /// Fetch WAV audio for `text` and play it to completion.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string — local engines need no
    /// authentication.  Playback runs on the blocking thread pool and
    /// polls `cancel` so a cancelled session stops producing sound within
    /// one poll interval.
    async fn speak(&self, text: &str, cancel: &CancelFlag) -> Result<(), SpeechError> {
        let url = format!("{}/v1/audio/speech", self.config.base_url);

        let body = serde_json::json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           self.config.voice,
            "response_format": "wav"
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;

        // Cancelled while the audio was in flight — skip playback entirely.
        if cancel.load(Ordering::SeqCst) {
            log::debug!("speech: cancelled before playback started");
            return Ok(());
        }

        let (samples, sample_rate, channels) = decode_wav(&bytes)?;
        log::debug!(
            "speech: playing {} samples ({sample_rate} Hz, {channels} ch)",
            samples.len()
        );

        let cancel = Arc::clone(cancel);
        tokio::task::spawn_blocking(move || {
            play_samples(&samples, sample_rate, channels, &cancel)
        })
        .await
        .map_err(|e| SpeechError::Device(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// WAV decoding
// ---------------------------------------------------------------------------

/// Decode a complete WAV file into interleaved `f32` samples.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u16), SpeechError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| SpeechError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };

    let samples = samples.map_err(|e| SpeechError::Decode(e.to_string()))?;
    Ok((samples, spec.sample_rate, spec.channels))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> TtsConfig {
        TtsConfig {
            base_url: "http://localhost:8880".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "tts-1".into(),
            voice: "alloy".into(),
            timeout_secs: 5,
        }
    }

    fn wav_fixture(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        bytes
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _synth = HttpSynthesizer::from_config(&make_config(None));
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _synth = HttpSynthesizer::from_config(&make_config(Some("")));
    }

    /// Verify that `HttpSynthesizer` is object-safe (usable as
    /// `dyn SpeechSynthesizer`).
    #[test]
    fn synthesizer_is_object_safe() {
        let synth: Box<dyn SpeechSynthesizer> =
            Box::new(HttpSynthesizer::from_config(&make_config(None)));
        drop(synth);
    }

    #[test]
    fn decode_wav_int16_round_trip() {
        let bytes = wav_fixture(&[0, i16::MAX, i16::MIN, 1000], 24_000);
        let (samples, rate, channels) = decode_wav(&bytes).expect("decode");

        assert_eq!(rate, 24_000);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
        assert!((samples[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn decode_wav_rejects_garbage() {
        let err = decode_wav(b"not a wav file").unwrap_err();
        assert!(matches!(err, SpeechError::Decode(_)));
    }
}
