//! Interaction state machine types and shared application state.
//!
//! [`InteractionState`] drives the controller's state machine.  The UI
//! reads it via [`SharedState`] to render the appropriate widget view.
//!
//! [`AppState`] is the single source of truth for everything the UI needs:
//! current interaction phase, conversation history, waveform snapshot, and
//! any error message.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across threads.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::waveform::{SamplerMode, WaveformFrame};

// ---------------------------------------------------------------------------
// InteractionState
// ---------------------------------------------------------------------------

/// States of the voice interaction cycle.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──user trigger──▶ Recording
///      ──user trigger──▶ Processing   (finalize + remote ask)
///                         ──answer──▶ Speaking ──playback end──▶ Idle
///                         ──error───▶ Idle
/// Recording ──capture fails──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    /// Waiting for the user to tap the microphone.
    Idle,

    /// Microphone is active; audio chunks are being accumulated.
    Recording,

    /// The capture is finalized and the remote exchange is in flight.
    Processing,

    /// The answer is being spoken aloud.
    Speaking,
}

impl InteractionState {
    /// Returns `true` while an exchange or playback is in flight.
    ///
    /// The capture trigger is inert in these states — a second recording
    /// cannot begin until the cycle completes.  This is the central
    /// mutual-exclusion property of the system.
    ///
    /// ```
    /// use voice_assistant::controller::InteractionState;
    ///
    /// assert!(!InteractionState::Idle.is_busy());
    /// assert!(!InteractionState::Recording.is_busy());
    /// assert!(InteractionState::Processing.is_busy());
    /// assert!(InteractionState::Speaking.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, InteractionState::Processing | InteractionState::Speaking)
    }

    /// A short human-readable label for the UI status line.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Tap the microphone to start",
            InteractionState::Recording => "Listening...",
            InteractionState::Processing => "Processing...",
            InteractionState::Speaking => "Speaking...",
        }
    }

    /// Which waveform mode this state drives, if any.
    pub fn sampler_mode(&self) -> Option<SamplerMode> {
        match self {
            InteractionState::Recording => Some(SamplerMode::Live),
            InteractionState::Speaking => Some(SamplerMode::Synthetic),
            InteractionState::Idle | InteractionState::Processing => None,
        }
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        InteractionState::Idle
    }
}

// ---------------------------------------------------------------------------
// ConversationTurn
// ---------------------------------------------------------------------------

/// One question/answer exchange with the remote service.
///
/// Immutable once created; the controller appends turns to its history in
/// arrival order and never reorders or mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The transcribed question, as understood by the remote service.
    pub question: String,
    /// The service's answer, spoken aloud on arrival.
    pub answer: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state — the single source of truth for the UI.
///
/// Held behind [`SharedState`] (`Arc<Mutex<AppState>>`).  The interaction
/// controller mutates it; the egui update loop reads it each frame.
pub struct AppState {
    /// Current phase of the interaction cycle.
    pub state: InteractionState,

    /// Append-only conversation history, oldest first.
    ///
    /// Grows by exactly one turn per successful exchange; cleared only on
    /// process restart.
    pub history: Vec<ConversationTurn>,

    /// Current waveform snapshot (20 bars).
    pub waveform: WaveformFrame,

    /// Error message from the last failed cycle, cleared when a new
    /// recording starts.
    pub error_message: Option<String>,

    /// Duration of the current recording in seconds; reset when a new
    /// recording starts.
    pub recording_secs: f32,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            history: Vec::new(),
            waveform: WaveformFrame::resting(),
            error_message: None,
            recording_secs: 0.0,
        }
    }

    /// `true` while the remote exchange is in flight (UI loading flag).
    pub fn is_loading(&self) -> bool {
        self.state == InteractionState::Processing
    }

    /// Move to `state`, resetting the waveform to the resting baseline
    /// whenever the new state does not drive a sampler mode.
    pub fn transition(&mut self, state: InteractionState) {
        self.state = state;
        if state.sampler_mode().is_none() {
            self.waveform = WaveformFrame::resting();
        }
    }

    /// Apply a waveform frame produced by `mode`.
    ///
    /// The frame is discarded unless `mode` is still the active sampler
    /// mode — a tick that was in flight across a state transition must
    /// never land after the mode that requested it has ended.
    pub fn apply_frame(&mut self, mode: SamplerMode, frame: WaveformFrame) -> bool {
        if self.state.sampler_mode() == Some(mode) {
            self.waveform = frame;
            true
        } else {
            false
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
