//! Voice Assistant — a floating desktop widget for spoken question
//! answering.
//!
//! One tap records a question, a remote service answers it, and the answer
//! is spoken back, with a 20-bar waveform animating throughout.
//!
//! # Architecture
//!
//! ```text
//! egui widget ──ToggleCapture──▶ InteractionController (tokio task)
//!      ▲                            │
//!      │ reads SharedState          ├─▶ CaptureSession (capture thread, cpal)
//!      │ each frame                 ├─▶ ConversationClient (reqwest, /ask-audio)
//!      └────────────────────────────┴─▶ PlaybackSession (TTS + cpal output)
//! ```
//!
//! The controller is the single writer of [`controller::SharedState`]; the
//! UI only reads it and sends commands.  All heavy work happens off the
//! UI thread.

pub mod app;
pub mod audio;
pub mod config;
pub mod controller;
pub mod remote;
pub mod speech;
pub mod waveform;
