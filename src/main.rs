//! Application entry point — Voice Assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the conversation client and speech synthesizer from config.
//! 5. Create the controller command channel and shared state.
//! 6. Spawn the interaction controller on the tokio runtime.
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed, then signals the controller to shut down.

use std::sync::Arc;

use tokio::sync::mpsc;
use voice_assistant::{
    app::VoiceAssistantApp,
    audio::{CpalMicrophone, Microphone},
    config::AppConfig,
    controller::{new_shared_state, ControllerCommand, InteractionController},
    remote::{ConversationClient, HttpConversationClient},
    speech::{HttpSynthesizer, SpeechSynthesizer},
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_decorations(false)
        .with_transparent(true)
        .with_inner_size([300.0, 150.0])
        .with_min_inner_size([250.0, 120.0])
        .with_resizable(false);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads — remote call + playback each take one)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Production seam implementations
    let mic: Arc<dyn Microphone> = Arc::new(CpalMicrophone::new());
    let client: Arc<dyn ConversationClient> =
        Arc::new(HttpConversationClient::from_config(&config.remote));
    let synth: Arc<dyn SpeechSynthesizer> = Arc::new(HttpSynthesizer::from_config(&config.tts));

    // 5. Shared state and command channel
    let state = new_shared_state();
    let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>(16);

    // 6. Spawn the interaction controller onto the tokio runtime.  The
    //    runtime must outlive eframe, so it is kept on the stack here.
    let controller =
        InteractionController::new(Arc::clone(&state), mic, client, synth, &config.audio);
    rt.spawn(controller.run(command_rx));

    // 7. Run the UI on the main thread (blocks until the window closes).
    let app = VoiceAssistantApp::new(Arc::clone(&state), command_tx.clone(), &config.ui);
    let result = eframe::run_native(
        "Voice Assistant",
        native_options(&config),
        Box::new(|_cc| Ok(Box::new(app))),
    );

    // The widget's on_exit already sends Shutdown; this covers the error
    // paths where eframe bails out before the widget is dropped.
    let _ = command_tx.try_send(ControllerCommand::Shutdown);
    log::info!("Voice Assistant exited");
    result
}
