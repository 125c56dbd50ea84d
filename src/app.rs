//! Voice assistant floating widget — egui/eframe application.
//!
//! # Architecture
//!
//! [`VoiceAssistantApp`] is the top-level [`eframe::App`].  Unlike the
//! controller it owns no interaction logic: every frame it takes a short
//! lock on [`SharedState`], renders what it finds, and sends
//! [`ControllerCommand::ToggleCapture`] when the big button is pressed.
//!
//! # Widget States
//!
//! | State | Visual |
//! |-------|--------|
//! | `Idle` | Record button + "Tap the microphone to start" — dim gray |
//! | `Recording` | Stop button + live waveform + elapsed timer — red |
//! | `Processing` | Spinner + "Processing..." — button inert, blue |
//! | `Speaking` | Synthetic waveform + "Speaking..." — button inert, green |
//!
//! An error from the previous cycle is shown as an orange line under the
//! status text until a new recording starts.

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::UiConfig;
use crate::controller::{
    AppState, ControllerCommand, ConversationTurn, InteractionState, SharedState,
};
use crate::waveform::{MAX_LEVEL, WaveformFrame};

// ---------------------------------------------------------------------------
// VoiceAssistantApp
// ---------------------------------------------------------------------------

/// eframe application — the floating voice assistant widget.
pub struct VoiceAssistantApp {
    /// Controller-owned state, read (never written) each frame.
    state: SharedState,

    /// Send the toggle / shutdown commands to the controller task.
    command_tx: mpsc::Sender<ControllerCommand>,

    /// Whether the conversation log is expanded.
    show_history: bool,

    /// Spinner animation phase (increases each frame).
    spinner_phase: f32,
}

impl VoiceAssistantApp {
    /// Create a new [`VoiceAssistantApp`].
    ///
    /// * `state`      — shared state written by the interaction controller.
    /// * `command_tx` — sender end of the controller command channel.
    /// * `ui_config`  — UI preferences loaded from disk.
    pub fn new(
        state: SharedState,
        command_tx: mpsc::Sender<ControllerCommand>,
        ui_config: &UiConfig,
    ) -> Self {
        Self {
            state,
            command_tx,
            show_history: ui_config.show_history,
            spinner_phase: 0.0,
        }
    }

    /// Snapshot the pieces of shared state the renderer needs, keeping the
    /// lock for as short a time as possible.
    fn snapshot(&self) -> Snapshot {
        let st: std::sync::MutexGuard<'_, AppState> = self.state.lock().unwrap();
        Snapshot {
            state: st.state,
            waveform: st.waveform.clone(),
            error_message: st.error_message.clone(),
            recording_secs: st.recording_secs,
            history: if self.show_history {
                st.history.clone()
            } else {
                Vec::new()
            },
            history_len: st.history.len(),
        }
    }

    // ── Window sizing ────────────────────────────────────────────────────

    fn update_window_size(&self, ctx: &egui::Context, snap: &Snapshot) {
        let mut size = match snap.state {
            InteractionState::Idle => egui::vec2(300.0, 150.0),
            InteractionState::Recording => egui::vec2(300.0, 170.0),
            InteractionState::Processing => egui::vec2(300.0, 150.0),
            InteractionState::Speaking => egui::vec2(300.0, 170.0),
        };
        if self.show_history && snap.history_len > 0 {
            size.y += 110.0;
        }
        if snap.error_message.is_some() {
            size.y += 20.0;
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(size));
    }

    // ── Custom title bar ─────────────────────────────────────────────────

    /// Draw the draggable title bar with status dot, title, and window
    /// controls (history toggle, minimise, close).
    fn draw_title_bar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, snap: &Snapshot) {
        ui.horizontal(|ui| {
            // Status dot
            ui.label(egui::RichText::new("●").color(state_color(snap.state)).size(10.0));

            // Draggable title area
            let title_resp = ui.label(
                egui::RichText::new("Voice Assistant")
                    .color(egui::Color32::from_rgb(200, 200, 200))
                    .size(13.0),
            );
            if title_resp.is_pointer_button_down_on() {
                if let Some(outer_rect) = ctx.input(|i| i.viewport().outer_rect) {
                    let delta = ctx.input(|i| i.pointer.delta());
                    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(
                        outer_rect.min + delta,
                    ));
                }
            }

            // Right-aligned window controls
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                // Close
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("x")
                                .color(egui::Color32::from_rgb(200, 100, 100))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                // Minimise
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("-")
                                .color(egui::Color32::from_rgb(150, 150, 150))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                }
                // Conversation log toggle
                if ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("=")
                                .color(egui::Color32::from_rgb(150, 150, 150))
                                .size(12.0),
                        )
                        .frame(false),
                    )
                    .clicked()
                {
                    self.show_history = !self.show_history;
                }
            });
        });
    }

    // ── Toggle button ─────────────────────────────────────────────────────

    /// Draw the large round capture button and send `ToggleCapture` on
    /// click.  The button is inert while Processing or Speaking — the
    /// controller would ignore the command anyway, but graying it out tells
    /// the user why nothing happens.
    fn draw_toggle_button(&mut self, ui: &mut egui::Ui, snap: &Snapshot) {
        const RADIUS: f32 = 28.0;

        ui.vertical_centered(|ui| {
            let busy = snap.state.is_busy();
            let sense = if busy {
                egui::Sense::hover()
            } else {
                egui::Sense::click()
            };
            let (rect, response) =
                ui.allocate_exact_size(egui::vec2(RADIUS * 2.0, RADIUS * 2.0), sense);

            let fill = if busy {
                egui::Color32::from_rgb(60, 60, 60)
            } else if response.hovered() {
                egui::Color32::from_rgb(70, 70, 80)
            } else {
                egui::Color32::from_rgb(50, 50, 58)
            };

            let painter = ui.painter();
            painter.circle_filled(rect.center(), RADIUS, fill);
            painter.circle_stroke(
                rect.center(),
                RADIUS,
                egui::Stroke::new(1.5, state_color(snap.state)),
            );

            // Inner glyph: record dot when idle, stop square while
            // recording, a dim dot while busy.
            match snap.state {
                InteractionState::Idle => {
                    painter.circle_filled(
                        rect.center(),
                        10.0,
                        egui::Color32::from_rgb(255, 68, 68),
                    );
                }
                InteractionState::Recording => {
                    painter.rect_filled(
                        egui::Rect::from_center_size(rect.center(), egui::vec2(16.0, 16.0)),
                        2.0,
                        egui::Color32::from_rgb(255, 68, 68),
                    );
                }
                InteractionState::Processing | InteractionState::Speaking => {
                    painter.circle_filled(
                        rect.center(),
                        10.0,
                        egui::Color32::from_rgb(90, 90, 90),
                    );
                }
            }

            if response.clicked() {
                // try_send: if the controller is gone the app is closing
                // anyway, and a full channel just drops the extra tap.
                let _ = self.command_tx.try_send(ControllerCommand::ToggleCapture);
            }
        });
    }

    // ── Status / waveform / history ──────────────────────────────────────

    fn draw_status(&self, ui: &mut egui::Ui, snap: &Snapshot) {
        let text = match snap.state {
            InteractionState::Processing => {
                format!("{} {}", self.spinner_char(), snap.state.label())
            }
            InteractionState::Recording => {
                format!("{} ({:.1}s)", snap.state.label(), snap.recording_secs)
            }
            _ => snap.state.label().to_string(),
        };

        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new(text)
                    .color(state_color(snap.state))
                    .size(12.0),
            );
            if let Some(ref msg) = snap.error_message {
                ui.label(
                    egui::RichText::new(msg.as_str())
                        .color(egui::Color32::from_rgb(255, 136, 68))
                        .size(11.0),
                );
            }
        });
    }

    /// Draw the 20-bar amplitude chart.  Bar levels arrive in the sampler's
    /// native `[1, 20]` range and are normalised against [`MAX_LEVEL`].
    fn draw_waveform(&self, ui: &mut egui::Ui, frame: &WaveformFrame, state: InteractionState) {
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width(), 32.0),
            egui::Sense::hover(),
        );

        let painter = ui.painter();
        let num_bars = frame.bars.len().max(1);
        let bar_width = rect.width() / num_bars as f32;

        for (i, &level) in frame.bars.iter().enumerate() {
            let x = rect.left() + i as f32 * bar_width;
            let bar_height = (level / MAX_LEVEL * rect.height()).max(2.0);
            let center_y = rect.center().y;

            painter.rect_filled(
                egui::Rect::from_center_size(
                    egui::pos2(x + bar_width / 2.0, center_y),
                    egui::vec2((bar_width * 0.6).max(1.0), bar_height),
                ),
                1.0,
                state_color(state),
            );
        }
    }

    /// Render the scrollable conversation log, newest at the bottom.
    fn draw_history(&self, ui: &mut egui::Ui, history: &[ConversationTurn]) {
        ui.separator();
        egui::ScrollArea::vertical()
            .max_height(100.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for turn in history {
                    ui.label(
                        egui::RichText::new(format!("You: {}", turn.question))
                            .color(egui::Color32::from_rgb(150, 150, 150))
                            .size(11.0),
                    );
                    ui.label(
                        egui::RichText::new(turn.answer.as_str())
                            .color(egui::Color32::from_rgb(80, 200, 120))
                            .size(11.0),
                    );
                    ui.add_space(4.0);
                }
            });
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    /// A simple rotating ASCII spinner character driven by `spinner_phase`.
    fn spinner_char(&self) -> char {
        let chars = ['|', '/', '-', '\\'];
        let idx = (self.spinner_phase as usize) % chars.len();
        chars[idx]
    }
}

/// Per-frame copy of the shared state, taken under one short lock.
struct Snapshot {
    state: InteractionState,
    waveform: WaveformFrame,
    error_message: Option<String>,
    recording_secs: f32,
    history: Vec<ConversationTurn>,
    history_len: usize,
}

/// Primary accent colour for each interaction state.
fn state_color(state: InteractionState) -> egui::Color32 {
    match state {
        InteractionState::Idle => egui::Color32::from_rgb(120, 120, 120),
        InteractionState::Recording => egui::Color32::from_rgb(255, 68, 68),
        InteractionState::Processing => egui::Color32::from_rgb(68, 136, 255),
        InteractionState::Speaking => egui::Color32::from_rgb(80, 200, 120),
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VoiceAssistantApp {
    /// Called every frame by eframe.  Snapshots the shared state, advances
    /// the spinner, then renders the widget.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let snap = self.snapshot();

        // --- Advance spinner animation -------------------------------------
        self.spinner_phase += 0.08;
        if self.spinner_phase >= 4.0 {
            self.spinner_phase = 0.0;
        }

        // --- Schedule repaints ---------------------------------------------
        // The controller mutates the shared state from its own task, so the
        // widget polls: fast while animated, slowly while idle.
        let repaint = match snap.state {
            InteractionState::Recording => Duration::from_millis(33),
            InteractionState::Speaking => Duration::from_millis(50),
            InteractionState::Processing => Duration::from_millis(66),
            InteractionState::Idle => Duration::from_millis(250),
        };
        ctx.request_repaint_after(repaint);

        // --- Resize window to match state ---------------------------------
        self.update_window_size(ctx, &snap);

        // --- Dark transparent background frame ----------------------------
        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgba_premultiplied(30, 30, 30, 220))
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::same(8));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_title_bar(ui, ctx, &snap);
            ui.separator();

            ui.add_space(4.0);
            self.draw_toggle_button(ui, &snap);
            ui.add_space(4.0);
            self.draw_waveform(ui, &snap.waveform, snap.state);
            self.draw_status(ui, &snap);

            if self.show_history && !snap.history.is_empty() {
                self.draw_history(ui, &snap.history);
            }
        });
    }

    /// Ask the controller to tear down when the window closes.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("voice assistant widget closing");
        let _ = self.command_tx.try_send(ControllerCommand::Shutdown);
    }
}
