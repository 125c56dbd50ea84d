//! Interaction controller — drives the full record → ask → speak cycle.
//!
//! [`InteractionController`] owns the [`SharedState`] and responds to
//! [`ControllerCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Cycle flow
//!
//! ```text
//! ControllerCommand::ToggleCapture (Idle)
//!   └─▶ new epoch, start CaptureSession           [Recording]
//!
//! ControllerCommand::ToggleCapture (Recording)
//!   └─▶ session.stop()                            [Processing]
//!         └─▶ PayloadReady → spawn client.ask
//!               ├─ Ok  → push turn, PlaybackSession [Speaking] → Ended → [Idle]
//!               └─ Err → error message              [Idle]
//! Recording: capture fails → error message          [Idle]
//! ```
//!
//! Every internal event is tagged with the epoch of the cycle that produced
//! it; events from a superseded cycle are discarded, so nothing a dead
//! session emits can touch the current one.  The toggle is a logged no-op
//! while Processing or Speaking — one exchange at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::audio::{
    CaptureError, CapturePayload, CaptureSession, FrameSink, Microphone, SessionEvent,
};
use crate::config::AudioConfig;
use crate::remote::{ConversationClient, RemoteError};
use crate::speech::{self, PlaybackEvent, PlaybackSession, SpeechSynthesizer, SyntheticSink};
use crate::waveform::SamplerMode;

use super::state::{ConversationTurn, InteractionState, SharedState};

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Commands sent from the UI to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// The single user trigger: start recording when Idle, finish it when
    /// Recording, do nothing while busy.
    ToggleCapture,
    /// Tear everything down and exit the run loop.
    Shutdown,
}

/// Internal events converging on the controller's run loop.
///
/// Each carries the epoch of the cycle that produced it; `run` drops any
/// event whose epoch is no longer current.
#[derive(Debug)]
enum ControllerEvent {
    CaptureFailed {
        epoch: u64,
        error: CaptureError,
    },
    PayloadReady {
        epoch: u64,
        payload: CapturePayload,
    },
    Response {
        epoch: u64,
        result: Result<ConversationTurn, RemoteError>,
    },
    SpeechStarted {
        epoch: u64,
    },
    SpeechEnded {
        epoch: u64,
    },
    /// The recording hit the configured maximum length.
    RecordingTimeout {
        epoch: u64,
    },
}

impl ControllerEvent {
    fn epoch(&self) -> u64 {
        match self {
            ControllerEvent::CaptureFailed { epoch, .. }
            | ControllerEvent::PayloadReady { epoch, .. }
            | ControllerEvent::Response { epoch, .. }
            | ControllerEvent::SpeechStarted { epoch }
            | ControllerEvent::SpeechEnded { epoch }
            | ControllerEvent::RecordingTimeout { epoch } => *epoch,
        }
    }
}

// ---------------------------------------------------------------------------
// InteractionController
// ---------------------------------------------------------------------------

/// Drives the complete voice interaction cycle.
///
/// Create with [`InteractionController::new`], then call
/// [`run`](Self::run) inside a tokio task.  The UI talks to it only
/// through the command channel and reads results from the shared state.
pub struct InteractionController {
    state: SharedState,
    mic: Arc<dyn Microphone>,
    client: Arc<dyn ConversationClient>,
    synth: Arc<dyn SpeechSynthesizer>,

    /// Ceiling on a single recording; the capture is finalized
    /// automatically when it is reached.
    max_recording: Duration,

    /// Monotonic cycle counter; bumped on every new recording.
    epoch: u64,
    capture: Option<CaptureSession>,
    playback: Option<PlaybackSession>,
    ask_task: Option<tokio::task::JoinHandle<()>>,

    event_tx: UnboundedSender<ControllerEvent>,
    event_rx: Option<UnboundedReceiver<ControllerEvent>>,
}

impl InteractionController {
    /// Create a new controller.
    ///
    /// # Arguments
    ///
    /// * `state`  — shared application state (also read by the UI).
    /// * `mic`    — microphone seam (e.g. `CpalMicrophone`).
    /// * `client` — remote conversation client (e.g. `HttpConversationClient`).
    /// * `synth`  — speech synthesizer (e.g. `HttpSynthesizer`).
    /// * `audio`  — capture limits from the application config.
    pub fn new(
        state: SharedState,
        mic: Arc<dyn Microphone>,
        client: Arc<dyn ConversationClient>,
        synth: Arc<dyn SpeechSynthesizer>,
        audio: &AudioConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            state,
            mic,
            client,
            synth,
            max_recording: Duration::from_secs_f32(audio.max_recording_secs.max(0.0)),
            epoch: 0,
            capture: None,
            playback: None,
            ask_task: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the controller until `Shutdown` arrives or `command_rx` closes.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<ControllerCommand>) {
        // `new` always fills the receiver slot; `run` consumes self, so
        // this take cannot observe it empty.
        let Some(mut event_rx) = self.event_rx.take() else {
            return;
        };

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(ControllerCommand::ToggleCapture) => self.handle_toggle(),
                    Some(ControllerCommand::Shutdown) | None => break,
                },
                event = event_rx.recv() => {
                    // self holds an event_tx clone, so the channel outlives
                    // the loop; recv never yields None here.
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                }
            }
        }

        self.teardown();
        log::info!("controller: shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handling
    // -----------------------------------------------------------------------

    /// Handle the user trigger according to the current state.
    fn handle_toggle(&mut self) {
        let current = self.state.lock().unwrap().state;
        match current {
            InteractionState::Idle => self.start_recording(),
            InteractionState::Recording => self.finish_recording(),
            InteractionState::Processing | InteractionState::Speaking => {
                // One exchange at a time; the trigger is inert while busy.
                log::debug!("controller: toggle ignored while {current:?}");
            }
        }
    }

    /// Idle → Recording: open a new epoch and start a capture session.
    fn start_recording(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        log::debug!("controller: starting recording (epoch {epoch})");

        // Whatever was still speaking goes quiet before the mic opens.
        speech::cancel_active();
        self.playback = None;

        {
            let mut st = self.state.lock().unwrap();
            st.error_message = None;
            st.recording_secs = 0.0;
            st.transition(InteractionState::Recording);
        }

        // Session events are forwarded onto the controller's own channel,
        // stamped with this cycle's epoch.
        let (session_tx, mut session_rx) = mpsc::unbounded_channel();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = session_rx.recv().await {
                let forwarded = match event {
                    SessionEvent::Failed(error) => {
                        ControllerEvent::CaptureFailed { epoch, error }
                    }
                    SessionEvent::Finalized(payload) => {
                        ControllerEvent::PayloadReady { epoch, payload }
                    }
                };
                if event_tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        let frame_state = Arc::clone(&self.state);
        let on_frame: FrameSink = Box::new(move |frame, elapsed| {
            let mut st = frame_state.lock().unwrap();
            if st.apply_frame(SamplerMode::Live, frame) {
                st.recording_secs = elapsed;
            }
        });

        self.capture = Some(CaptureSession::start(
            Arc::clone(&self.mic),
            session_tx,
            on_frame,
        ));

        // Length limit: if the user never taps stop, finalize for them.
        // Stale by epoch if the recording ended on its own.
        let timeout_tx = self.event_tx.clone();
        let max = self.max_recording;
        tokio::spawn(async move {
            tokio::time::sleep(max).await;
            let _ = timeout_tx.send(ControllerEvent::RecordingTimeout { epoch });
        });
    }

    /// Recording → Processing: finalize the capture; the payload arrives as
    /// a `PayloadReady` event.
    fn finish_recording(&mut self) {
        log::debug!("controller: finishing recording (epoch {})", self.epoch);
        self.state
            .lock()
            .unwrap()
            .transition(InteractionState::Processing);

        if let Some(mut session) = self.capture.take() {
            if let Err(e) = session.stop() {
                log::warn!("controller: capture stop rejected: {e}");
            }
        } else {
            // Recording state with no session means the capture thread
            // already failed; the Failed event will move us back to Idle.
            log::warn!("controller: no capture session to finish");
        }
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: ControllerEvent) {
        let epoch = event.epoch();
        if epoch != self.epoch {
            log::debug!(
                "controller: discarding event from superseded epoch {epoch} (current {})",
                self.epoch
            );
            return;
        }

        match event {
            ControllerEvent::CaptureFailed { error, .. } => {
                self.capture = None;
                self.set_error(format!("Recording failed: {error}"));
            }
            ControllerEvent::PayloadReady { payload, .. } => {
                self.capture = None;
                self.spawn_ask(epoch, payload);
            }
            ControllerEvent::Response { result, .. } => {
                self.ask_task = None;
                match result {
                    Ok(turn) => self.start_speaking(epoch, turn),
                    Err(e) => self.set_error(format!("Request failed: {e}")),
                }
            }
            ControllerEvent::SpeechStarted { .. } => {
                log::debug!("controller: speech started (epoch {epoch})");
            }
            ControllerEvent::SpeechEnded { .. } => {
                log::debug!("controller: speech ended (epoch {epoch})");
                self.playback = None;
                self.state.lock().unwrap().transition(InteractionState::Idle);
            }
            ControllerEvent::RecordingTimeout { .. } => {
                // The epoch guard filters timers from earlier recordings;
                // within the same epoch the state may already have moved on.
                if self.state.lock().unwrap().state == InteractionState::Recording {
                    log::info!(
                        "controller: recording reached the {:.0} s limit, finalizing",
                        self.max_recording.as_secs_f32()
                    );
                    self.finish_recording();
                }
            }
        }
    }

    /// Send the finalized payload to the remote service on its own task so
    /// the run loop stays responsive.  The history snapshot is taken here;
    /// the client never sees (or mutates) the live vector.
    fn spawn_ask(&mut self, epoch: u64, payload: CapturePayload) {
        log::debug!(
            "controller: asking remote service ({:.2} s of audio)",
            payload.duration_secs
        );

        let client = Arc::clone(&self.client);
        let history = self.state.lock().unwrap().history.clone();
        let event_tx = self.event_tx.clone();

        self.ask_task = Some(tokio::spawn(async move {
            let result = client.ask(&payload, &history).await;
            let _ = event_tx.send(ControllerEvent::Response { epoch, result });
        }));
    }

    /// Processing → Speaking: record the turn and speak the answer.
    fn start_speaking(&mut self, epoch: u64, turn: ConversationTurn) {
        log::debug!("controller: answer received, speaking");

        {
            let mut st = self.state.lock().unwrap();
            st.history.push(turn.clone());
            st.transition(InteractionState::Speaking);
        }

        let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = playback_rx.recv().await {
                let forwarded = match event {
                    PlaybackEvent::Started => ControllerEvent::SpeechStarted { epoch },
                    PlaybackEvent::Ended => ControllerEvent::SpeechEnded { epoch },
                };
                if event_tx.send(forwarded).is_err() {
                    break;
                }
            }
        });

        let frame_state = Arc::clone(&self.state);
        let on_frame: SyntheticSink = Box::new(move |frame| {
            frame_state
                .lock()
                .unwrap()
                .apply_frame(SamplerMode::Synthetic, frame);
        });

        self.playback = Some(PlaybackSession::start(
            Arc::clone(&self.synth),
            turn.answer,
            playback_tx,
            on_frame,
        ));
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Surface a failure and return to Idle.  Every error is recoverable;
    /// the next toggle starts a fresh cycle.
    fn set_error(&self, message: String) {
        log::error!("controller: {message}");
        let mut st = self.state.lock().unwrap();
        st.error_message = Some(message);
        st.transition(InteractionState::Idle);
    }

    /// Release everything the controller holds: the capture thread, the
    /// in-flight remote call, and any audible playback.
    fn teardown(&mut self) {
        if let Some(session) = self.capture.take() {
            session.abandon();
        }
        if let Some(task) = self.ask_task.take() {
            task.abort();
        }
        if let Some(playback) = self.playback.take() {
            playback.cancel();
        }
        speech::cancel_active();
        self.state.lock().unwrap().transition(InteractionState::Idle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeniedMicrophone, MockMicrophone};
    use crate::controller::state::new_shared_state;
    use crate::speech::{CancelFlag, SpeechError};
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Client that answers every question with a fixed turn.
    struct OkClient(ConversationTurn);

    #[async_trait]
    impl ConversationClient for OkClient {
        async fn ask(
            &self,
            _payload: &CapturePayload,
            _history: &[ConversationTurn],
        ) -> Result<ConversationTurn, RemoteError> {
            Ok(self.0.clone())
        }
    }

    /// Client that always fails with a server error.
    struct FailClient;

    #[async_trait]
    impl ConversationClient for FailClient {
        async fn ask(
            &self,
            _payload: &CapturePayload,
            _history: &[ConversationTurn],
        ) -> Result<ConversationTurn, RemoteError> {
            Err(RemoteError::Status(500))
        }
    }

    /// Client that holds the exchange open for a fixed time before
    /// answering, so tests can observe the Processing state.
    struct SlowClient(Duration, ConversationTurn);

    #[async_trait]
    impl ConversationClient for SlowClient {
        async fn ask(
            &self,
            _payload: &CapturePayload,
            _history: &[ConversationTurn],
        ) -> Result<ConversationTurn, RemoteError> {
            sleep(self.0).await;
            Ok(self.1.clone())
        }
    }

    /// Synthesizer that completes instantly without touching any device.
    struct InstantSynth;

    #[async_trait]
    impl SpeechSynthesizer for InstantSynth {
        async fn speak(&self, _text: &str, _cancel: &CancelFlag) -> Result<(), SpeechError> {
            Ok(())
        }
    }

    /// Synthesizer that "speaks" for a fixed duration, honouring cancel.
    struct TimedSynth(Duration);

    #[async_trait]
    impl SpeechSynthesizer for TimedSynth {
        async fn speak(&self, _text: &str, cancel: &CancelFlag) -> Result<(), SpeechError> {
            let deadline = tokio::time::Instant::now() + self.0;
            while tokio::time::Instant::now() < deadline {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(());
                }
                sleep(Duration::from_millis(10)).await;
            }
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    fn turn(question: &str, answer: &str) -> ConversationTurn {
        ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        }
    }

    struct Harness {
        state: SharedState,
        commands: mpsc::Sender<ControllerCommand>,
        run: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn spawn(
            mic: Arc<dyn Microphone>,
            client: Arc<dyn ConversationClient>,
            synth: Arc<dyn SpeechSynthesizer>,
        ) -> Self {
            Self::spawn_with_audio(mic, client, synth, AudioConfig::default())
        }

        fn spawn_with_audio(
            mic: Arc<dyn Microphone>,
            client: Arc<dyn ConversationClient>,
            synth: Arc<dyn SpeechSynthesizer>,
            audio: AudioConfig,
        ) -> Self {
            let state = new_shared_state();
            let controller =
                InteractionController::new(Arc::clone(&state), mic, client, synth, &audio);
            let (commands, command_rx) = mpsc::channel(16);
            let run = tokio::spawn(controller.run(command_rx));
            Self {
                state,
                commands,
                run,
            }
        }

        async fn toggle(&self) {
            self.commands
                .send(ControllerCommand::ToggleCapture)
                .await
                .expect("controller alive");
        }

        async fn shutdown(self) {
            let _ = self.commands.send(ControllerCommand::Shutdown).await;
            let _ = timeout(Duration::from_secs(5), self.run).await;
        }

        fn snapshot(&self) -> (InteractionState, usize, Option<String>) {
            let st = self.state.lock().unwrap();
            (st.state, st.history.len(), st.error_message.clone())
        }

        /// Poll the shared state until it reaches `target` or five seconds
        /// pass.
        async fn wait_for(&self, target: InteractionState) {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            loop {
                if self.state.lock().unwrap().state == target {
                    return;
                }
                if tokio::time::Instant::now() >= deadline {
                    panic!(
                        "timed out waiting for {target:?}, still {:?}",
                        self.state.lock().unwrap().state
                    );
                }
                sleep(Duration::from_millis(10)).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// The full happy path: record, stop, exchange, speak, and return to
    /// Idle with the turn recorded in history.
    #[tokio::test]
    async fn full_cycle_appends_history_and_returns_to_idle() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(3, 160)),
            Arc::new(OkClient(turn("hi", "hello"))),
            Arc::new(TimedSynth(Duration::from_millis(150))),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;

        // Give the mock microphone time to deliver its chunks.
        sleep(Duration::from_millis(100)).await;
        h.toggle().await;
        h.wait_for(InteractionState::Speaking).await;
        h.wait_for(InteractionState::Idle).await;

        let (state, history_len, error) = h.snapshot();
        assert_eq!(state, InteractionState::Idle);
        assert_eq!(history_len, 1);
        assert!(error.is_none());
        assert_eq!(
            h.state.lock().unwrap().history[0],
            turn("hi", "hello")
        );

        h.shutdown().await;
    }

    /// A failed exchange surfaces an error and leaves history untouched.
    #[tokio::test]
    async fn remote_failure_returns_to_idle_with_error() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(3, 160)),
            Arc::new(FailClient),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;
        sleep(Duration::from_millis(100)).await;
        h.toggle().await;
        h.wait_for(InteractionState::Idle).await;

        let (_, history_len, error) = h.snapshot();
        assert_eq!(history_len, 0);
        assert!(error.unwrap().contains("Request failed"));

        h.shutdown().await;
    }

    /// Microphone denial never reaches the remote service; the controller
    /// reports the failure and returns to Idle.
    #[tokio::test]
    async fn capture_denial_returns_to_idle_with_error() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(DeniedMicrophone),
            Arc::new(OkClient(turn("q", "a"))),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Idle).await;

        let (_, history_len, error) = h.snapshot();
        assert_eq!(history_len, 0);
        assert!(error.unwrap().contains("Recording failed"));

        h.shutdown().await;
    }

    /// While an exchange is in flight the toggle must not start a second
    /// recording.
    #[tokio::test]
    async fn toggle_is_inert_while_processing() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(3, 160)),
            Arc::new(SlowClient(Duration::from_millis(300), turn("q", "a"))),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;
        sleep(Duration::from_millis(100)).await;
        h.toggle().await;
        h.wait_for(InteractionState::Processing).await;

        // These must be no-ops — the exchange keeps running.
        h.toggle().await;
        h.toggle().await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(
            h.state.lock().unwrap().state,
            InteractionState::Processing
        );

        // The cycle still completes normally afterwards.
        h.wait_for(InteractionState::Idle).await;
        let (_, history_len, error) = h.snapshot();
        assert_eq!(history_len, 1);
        assert!(error.is_none());

        h.shutdown().await;
    }

    /// A fresh recording clears the error message from the previous cycle.
    #[tokio::test]
    async fn new_recording_clears_previous_error() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(2, 160)),
            Arc::new(FailClient),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;
        sleep(Duration::from_millis(80)).await;
        h.toggle().await;
        h.wait_for(InteractionState::Idle).await;
        assert!(h.snapshot().2.is_some());

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;
        assert!(h.snapshot().2.is_none());

        h.shutdown().await;
    }

    /// Consecutive successful cycles accumulate history in order.
    #[tokio::test]
    async fn history_grows_one_turn_per_cycle() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(2, 160)),
            Arc::new(OkClient(turn("q", "a"))),
            Arc::new(InstantSynth),
        );

        for expected in 1..=2 {
            h.toggle().await;
            h.wait_for(InteractionState::Recording).await;
            sleep(Duration::from_millis(80)).await;
            h.toggle().await;
            h.wait_for(InteractionState::Idle).await;
            assert_eq!(h.snapshot().1, expected);
        }

        h.shutdown().await;
    }

    /// Shutdown mid-recording resets the state without emitting anything.
    #[tokio::test]
    async fn shutdown_during_recording_resets_state() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(3, 160)),
            Arc::new(OkClient(turn("q", "a"))),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;

        let state = Arc::clone(&h.state);
        h.shutdown().await;

        let st = state.lock().unwrap();
        assert_eq!(st.state, InteractionState::Idle);
        assert!(st.history.is_empty());
    }

    /// A recording that hits the configured length limit finalizes on its
    /// own — no second toggle required.
    #[tokio::test]
    async fn recording_times_out_at_configured_limit() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn_with_audio(
            Arc::new(MockMicrophone::with_chunks(3, 160)),
            Arc::new(OkClient(turn("q", "a"))),
            Arc::new(InstantSynth),
            AudioConfig {
                max_recording_secs: 0.2,
            },
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;

        // The limit, not the user, stops the capture.
        h.wait_for(InteractionState::Idle).await;
        let (_, history_len, error) = h.snapshot();
        assert_eq!(history_len, 1);
        assert!(error.is_none());

        h.shutdown().await;
    }

    /// Live waveform frames reach the shared state while recording.
    #[tokio::test]
    async fn live_frames_update_shared_waveform() {
        let _guard = crate::speech::session::serial();

        let h = Harness::spawn(
            Arc::new(MockMicrophone::with_chunks(4, 512)),
            Arc::new(SlowClient(Duration::from_millis(200), turn("q", "a"))),
            Arc::new(InstantSynth),
        );

        h.toggle().await;
        h.wait_for(InteractionState::Recording).await;
        sleep(Duration::from_millis(150)).await;

        {
            let st = h.state.lock().unwrap();
            assert!(
                st.waveform
                    .bars
                    .iter()
                    .any(|&b| b != crate::waveform::IDLE_LEVEL),
                "live frames should have replaced the resting bars"
            );
            assert!(st.recording_secs > 0.0);
        }

        h.toggle().await;
        h.wait_for(InteractionState::Idle).await;
        h.shutdown().await;
    }
}
