//! Core `ConversationClient` trait and `HttpConversationClient`
//! implementation.
//!
//! The client sends one capture payload plus the full conversation history
//! to the remote question-answering service and returns the resulting
//! turn.  All connection details come from [`RemoteConfig`]; nothing is
//! hardcoded.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::CapturePayload;
use crate::config::RemoteConfig;
use crate::controller::ConversationTurn;

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors that can occur during a remote exchange.
///
/// Every failure mode — transport, timeout, bad status, malformed body —
/// surfaces as a variant here; the controller treats them uniformly
/// (surface the message, return to idle, leave the history untouched).
/// There is no automatic retry: an exchange is user-initiated and cheap to
/// retry from the UI.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The capture produced no audio; nothing was sent.
    #[error("no audio was captured — hold the microphone a little longer")]
    EmptyAudio,

    /// HTTP transport or connection error.
    #[error("request to inference service failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("inference service timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("inference service returned status {0}")]
    Status(u16),

    /// The response body was not the expected JSON shape.
    #[error("failed to parse inference response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for the `/ask-audio` operation.
#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    /// WAV payload, base64-encoded for JSON transport.
    audio_data: String,
    /// Full dialogue context, oldest turn first.
    past_conversations: &'a [ConversationTurn],
}

/// Success body of the `/ask-audio` operation.
#[derive(Debug, Deserialize)]
struct AskResponse {
    question: String,
    answer: String,
}

// ---------------------------------------------------------------------------
// ConversationClient trait
// ---------------------------------------------------------------------------

/// Async trait for the remote question-answering exchange.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ConversationClient>`).
///
/// # Arguments
/// * `payload` – finalized capture from the audio session.
/// * `history` – prior turns, borrowed immutably; implementations must not
///               mutate it.  The caller appends the returned turn itself.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    async fn ask(
        &self,
        payload: &CapturePayload,
        history: &[ConversationTurn],
    ) -> Result<ConversationTurn, RemoteError>;
}

// ---------------------------------------------------------------------------
// HttpConversationClient
// ---------------------------------------------------------------------------

/// Calls the configured `POST {base_url}/ask-audio` endpoint.
///
/// The exchange is a single JSON request carrying the base64-encoded audio
/// and the whole conversation history; the service transcribes the audio,
/// runs inference, and returns `{question, answer}`.
pub struct HttpConversationClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpConversationClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &RemoteConfig) -> Self {
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
impl ConversationClient for HttpConversationClient {
    async fn ask(
        &self,
        payload: &CapturePayload,
        history: &[ConversationTurn],
    ) -> Result<ConversationTurn, RemoteError> {
        if payload.is_empty() {
            return Err(RemoteError::EmptyAudio);
        }

        let body = AskRequest {
            audio_data: BASE64.encode(&payload.wav_bytes),
            past_conversations: history,
        };

        let url = format!("{}/ask-audio", self.config.base_url);
        log::debug!(
            "remote: asking {url} ({:.2} s audio, {} prior turns)",
            payload.duration_secs,
            history.len()
        );

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let parsed: AskResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        Ok(ConversationTurn {
            question: parsed.question,
            answer: parsed.answer,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
