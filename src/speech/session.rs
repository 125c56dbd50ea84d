//! One text-to-speech lifecycle with guaranteed boundary events.
//!
//! [`PlaybackSession`] wraps a single [`SpeechSynthesizer::speak`]
//! invocation and guarantees exactly one [`PlaybackEvent::Started`]
//! followed by exactly one [`PlaybackEvent::Ended`] — on normal
//! completion, on cancellation, and on synthesis failure alike.  The
//! controller's state machine relies on the `Ended` event to leave
//! `Speaking`, so no path may omit it.
//!
//! While the session is active it drives the waveform in synthetic mode at
//! ~10 Hz through the supplied sink.
//!
//! The process-wide "currently speaking" state lives here as a private
//! registry: starting a new session first cancels whichever session is
//! registered, and [`cancel_active`] lets teardown paths silence output
//! without holding a session handle.  The controller never touches this
//! global directly.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::speech::engine::{new_cancel_flag, CancelFlag, SpeechSynthesizer};
use crate::waveform::WaveformFrame;

/// Cadence of synthetic waveform frames while speaking.
const SYNTHETIC_TICK: Duration = Duration::from_millis(100);

/// The one playback allowed to be audible at any instant.
static ACTIVE_PLAYBACK: Mutex<Option<CancelFlag>> = Mutex::new(None);

// ---------------------------------------------------------------------------
// PlaybackEvent
// ---------------------------------------------------------------------------

/// Boundary notifications delivered to the session owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audible output is beginning.  Fires exactly once, always before
    /// `Ended`.
    Started,
    /// The session is over — completed, cancelled, or failed.  Fires
    /// exactly once.
    Ended,
}

/// Receives synthetic waveform frames while the session is active.
pub type SyntheticSink = Box<dyn Fn(WaveformFrame) + Send>;

// ---------------------------------------------------------------------------
// PlaybackSession
// ---------------------------------------------------------------------------

/// Handle to one in-flight speech playback.
pub struct PlaybackSession {
    cancel: CancelFlag,
}

impl PlaybackSession {
    /// Begin speaking `text`.
    ///
    /// Any previously registered session is cancelled first — at most one
    /// playback is audible at a time.  Events arrive on `events`;
    /// synthetic frames flow through `on_frame` until the session ends.
    pub fn start(
        synth: Arc<dyn SpeechSynthesizer>,
        text: String,
        events: UnboundedSender<PlaybackEvent>,
        on_frame: SyntheticSink,
    ) -> Self {
        cancel_active();

        let cancel = new_cancel_flag();
        *ACTIVE_PLAYBACK.lock().unwrap() = Some(Arc::clone(&cancel));

        let task_cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            let _ = events.send(PlaybackEvent::Started);

            let speak = synth.speak(&text, &task_cancel);
            tokio::pin!(speak);

            loop {
                tokio::select! {
                    result = &mut speak => {
                        if let Err(e) = result {
                            // Synthesis failure is treated as an immediate
                            // end; the controller returns to idle.
                            log::warn!("playback: {e}");
                        }
                        break;
                    }
                    _ = tokio::time::sleep(SYNTHETIC_TICK) => {
                        if task_cancel.load(Ordering::SeqCst) {
                            break;
                        }
                        on_frame(WaveformFrame::synthetic());
                    }
                }
            }

            // Deregister, unless a newer session already took the slot.
            {
                let mut active = ACTIVE_PLAYBACK.lock().unwrap();
                if active
                    .as_ref()
                    .is_some_and(|flag| Arc::ptr_eq(flag, &task_cancel))
                {
                    *active = None;
                }
            }

            let _ = events.send(PlaybackEvent::Ended);
        });

        Self { cancel }
    }

    /// Request cancellation of this session.
    ///
    /// Audible output stops within one poll interval and the `Ended` event
    /// still fires.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Cancel whichever playback session is currently registered, if any.
///
/// Safe to call from any thread at any time; used on teardown and before
/// starting a new session.
pub fn cancel_active() {
    if let Some(flag) = ACTIVE_PLAYBACK.lock().unwrap().take() {
        log::debug!("playback: cancelling active session");
        flag.store(true, Ordering::SeqCst);
    }
}

/// The active-playback registry is process-wide, so any test that starts a
/// session must not run concurrently with another — a parallel `start()`
/// would cancel the session under test.  Controller tests hold this too.
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static TEST_LOCK: Mutex<()> = Mutex::new(());
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::engine::SpeechError;
    use async_trait::async_trait;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::{timeout, Duration as TokioDuration};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

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
                tokio::time::sleep(TokioDuration::from_millis(10)).await;
            }
            Ok(())
        }
    }

    /// Synthesizer that always fails immediately.
    struct FailSynth;

    #[async_trait]
    impl SpeechSynthesizer for FailSynth {
        async fn speak(&self, _text: &str, _cancel: &CancelFlag) -> Result<(), SpeechError> {
            Err(SpeechError::Device("synthesis engine unavailable".into()))
        }
    }

    fn null_sink() -> SyntheticSink {
        Box::new(|_| {})
    }

    async fn next_event(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<PlaybackEvent>,
    ) -> PlaybackEvent {
        timeout(TokioDuration::from_secs(5), rx.recv())
            .await
            .expect("playback event timed out")
            .expect("event channel closed")
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn started_then_ended_on_completion() {
        let _guard = serial();
        let (tx, mut rx) = unbounded_channel();
        let synth = Arc::new(TimedSynth(Duration::from_millis(50)));
        let _session = PlaybackSession::start(synth, "hello".into(), tx, null_sink());

        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Started);
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Ended);
    }

    #[tokio::test]
    async fn cancellation_fires_exactly_one_ended() {
        let _guard = serial();
        let (tx, mut rx) = unbounded_channel();
        let synth = Arc::new(TimedSynth(Duration::from_secs(30)));
        let session = PlaybackSession::start(synth, "long answer".into(), tx, null_sink());

        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Started);
        session.cancel();
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Ended);

        // No further events: the sender is dropped with the task, so the
        // channel closes instead of yielding a second Ended.
        assert!(
            timeout(TokioDuration::from_millis(500), rx.recv())
                .await
                .expect("channel should close promptly")
                .is_none()
        );
    }

    #[tokio::test]
    async fn synthesis_failure_still_fires_ended() {
        let _guard = serial();
        let (tx, mut rx) = unbounded_channel();
        let _session =
            PlaybackSession::start(Arc::new(FailSynth), "oops".into(), tx, null_sink());

        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Started);
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Ended);
    }

    #[tokio::test]
    async fn new_session_cancels_previous() {
        let _guard = serial();
        let (tx_a, mut rx_a) = unbounded_channel();
        let synth_a = Arc::new(TimedSynth(Duration::from_secs(30)));
        let _a = PlaybackSession::start(synth_a, "first".into(), tx_a, null_sink());
        assert_eq!(next_event(&mut rx_a).await, PlaybackEvent::Started);

        let (tx_b, mut rx_b) = unbounded_channel();
        let synth_b = Arc::new(TimedSynth(Duration::from_millis(30)));
        let _b = PlaybackSession::start(synth_b, "second".into(), tx_b, null_sink());

        // The first session must terminate even though no one cancelled it
        // explicitly.
        assert_eq!(next_event(&mut rx_a).await, PlaybackEvent::Ended);
        assert_eq!(next_event(&mut rx_b).await, PlaybackEvent::Started);
        assert_eq!(next_event(&mut rx_b).await, PlaybackEvent::Ended);
    }

    #[tokio::test]
    async fn cancel_active_silences_registered_session() {
        let _guard = serial();
        let (tx, mut rx) = unbounded_channel();
        let synth = Arc::new(TimedSynth(Duration::from_secs(30)));
        let _session = PlaybackSession::start(synth, "teardown".into(), tx, null_sink());
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Started);

        cancel_active();
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Ended);
    }

    #[tokio::test]
    async fn synthetic_frames_flow_while_speaking() {
        let _guard = serial();
        let (tx, mut rx) = unbounded_channel();
        let frames: Arc<Mutex<Vec<WaveformFrame>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_frames = Arc::clone(&frames);
        let sink: SyntheticSink = Box::new(move |frame| {
            sink_frames.lock().unwrap().push(frame);
        });

        let synth = Arc::new(TimedSynth(Duration::from_millis(350)));
        let _session = PlaybackSession::start(synth, "spoken".into(), tx, sink);

        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Started);
        assert_eq!(next_event(&mut rx).await, PlaybackEvent::Ended);

        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 2, "expected several 100 ms ticks");
        for frame in frames.iter() {
            assert!(frame.bars.iter().all(|&b| {
                (crate::waveform::SYNTHETIC_MIN..=crate::waveform::MAX_LEVEL).contains(&b)
            }));
        }
    }
}
