//! Application entry point: the voice chat window.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (defaults on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the remote chat client.  Without a credential the application
//!    shows the fatal notice and no controller runs.
//! 5. Load the Whisper model and probe the speech synthesiser.
//! 6. Spawn the [`InteractionController`] event loop.
//! 7. Start the global hotkey listener thread.
//! 8. Run [`eframe::run_native`], which blocks the main thread until the
//!    window is closed (or Ctrl-C closes it), then shut the controller down.

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use voice_chat::{
    app::{run_window, VoiceChatApp},
    audio::EndpointerSettings,
    chat::{build_client, RemoteChat},
    config::{AppConfig, AppPaths, HotkeyConfig},
    controller::{
        event_channel, new_shared_state, Adapters, ControllerEvent, EventReceiver, EventSender,
        InteractionController, SharedState,
    },
    hotkey::{HotkeyBindings, HotkeyEvent, HotkeyListener},
    stt::{SttEngine, TranscribeParams, WhisperEngine, WhisperRecognizer},
    tts::CommandSynthesizer,
};

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// Load the Whisper model; `None` leaves the recogniser unsupported.
fn load_stt(config: &AppConfig) -> Option<Arc<dyn SttEngine>> {
    let model_path = AppPaths::new().model_file(&config.stt.model);
    let params = TranscribeParams {
        language: config.stt.language.clone(),
        ..TranscribeParams::default()
    };

    match WhisperEngine::load(&model_path, params) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Some(Arc::new(engine))
        }
        Err(e) => {
            log::warn!(
                "Could not load Whisper model ({}): {e}",
                model_path.display()
            );
            None
        }
    }
}

/// Build the adapters and spawn the controller.  `None` when the remote chat
/// cannot be configured; the fatal notice is set instead.
async fn start_controller(
    config: AppConfig,
    shared: SharedState,
    tx: EventSender,
    rx: EventReceiver,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    let client = match build_client(&config.chat) {
        Ok(client) => client,
        Err(e) => {
            log::error!("remote chat unavailable: {e}");
            shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_fatal(config.messages.no_api_key.clone());
            return Ok(None);
        }
    };
    log::info!(
        "remote chat: {:?} ({})",
        config.chat.provider,
        config.chat.model
    );

    let stt_config = config.clone();
    let stt = tokio::task::spawn_blocking(move || load_stt(&stt_config)).await?;
    let recognizer = WhisperRecognizer::new(
        stt,
        config.stt.vad_threshold,
        EndpointerSettings::from(&config.stt),
    );
    let synthesizer = CommandSynthesizer::probe(&config.tts).await;

    let adapters = Adapters {
        recognizer: Box::new(recognizer),
        synthesizer: Arc::new(synthesizer),
        chat: RemoteChat::new(client, config.chat.web_grounding),
    };
    let controller = InteractionController::new(&config, adapters, shared, tx);
    Ok(Some(tokio::spawn(controller.run(rx))))
}

// ---------------------------------------------------------------------------
// Hotkeys
// ---------------------------------------------------------------------------

/// Start the listener thread; its events are drained by the window.
fn start_hotkeys(
    cfg: &HotkeyConfig,
    tx: mpsc::Sender<HotkeyEvent>,
) -> Option<HotkeyListener> {
    if !cfg.enabled {
        return None;
    }
    let Some(bindings) = HotkeyBindings::from_config(cfg) else {
        log::warn!(
            "hotkeys disabled: cannot bind tap {:?} / suspend {:?}",
            cfg.tap_key,
            cfg.suspend_key
        );
        return None;
    };

    match HotkeyListener::start(bindings, tx) {
        Ok(listener) => Some(listener),
        Err(e) => {
            log::warn!("hotkeys disabled: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-chat starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4-6. Controller, started while the window already shows the booting
    //      status
    let shared = new_shared_state(config.messages.booting.clone());
    let (tx, rx) = event_channel();
    let starter = rt.spawn(start_controller(
        config.clone(),
        shared.clone(),
        tx.clone(),
        rx,
    ));

    // 7. Hotkeys
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyEvent>(16);
    let _hotkeys = start_hotkeys(&config.hotkey, hotkey_tx);

    // 8. Window
    let app = VoiceChatApp::new(shared, tx.clone(), hotkey_rx, &config);
    let quit = app.quit_handle();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupted");
            quit.store(true, Ordering::SeqCst);
        }
    });
    let result = run_window(app);

    // queued until the controller starts, if it has not yet
    let _ = tx.send(ControllerEvent::Shutdown);
    rt.block_on(async {
        match starter.await {
            Ok(Ok(Some(controller))) => {
                if let Err(e) = controller.await {
                    log::error!("controller task failed: {e}");
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => log::error!("controller failed to start: {e}"),
            Err(e) => log::error!("controller start task failed: {e}"),
        }
    });
    rt.shutdown_timeout(Duration::from_millis(500));

    result.map_err(|e| anyhow::anyhow!("window failed: {e}"))
}
