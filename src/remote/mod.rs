//! Remote inference module — the conversation exchange.
//!
//! This module provides:
//! * [`ConversationClient`] — async trait implemented by all backends.
//! * [`HttpConversationClient`] — JSON-over-HTTP client for the
//!   `/ask-audio` operation.
//! * [`RemoteError`] — error variants for the exchange.
//!
//! One exchange = one request: the finalized capture payload
//! (base64-encoded WAV) plus the full conversation history go up; one
//! `{question, answer}` turn comes back.  The client never mutates the
//! history and never retries on its own.

pub mod client;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ConversationClient, HttpConversationClient, RemoteError};
