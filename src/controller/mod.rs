//! Interaction controller and the state it shares with the front-end.
//!
//! # Architecture
//!
//! ```text
//! front-end / hotkeys ── Tap, Suspend, Resume, Shutdown ──┐
//! WhisperRecognizer ──── Recognition ─────────────────────┤
//! SpeechOutput ───────── SpeechFinished ──────────────────┤  EventSender
//! timers ─────────────── DebounceElapsed, RestartCapture ─┤  (mpsc)
//! RemoteChat request ─── RemoteSettled ───────────────────┘
//!                                   │
//!                                   ▼
//!                   InteractionController::run()  ← async tokio task
//!                                   │
//!                                   ▼
//!            SharedState (Arc<Mutex<AppState>>) ← read by the front-end
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_chat::chat::{build_client, RemoteChat};
//! use voice_chat::config::AppConfig;
//! use voice_chat::controller::{event_channel, new_shared_state, Adapters, InteractionController};
//! # use voice_chat::stt::RecognitionEngine;
//! # use voice_chat::tts::SpeechSynthesizer;
//! # fn make_recognizer() -> Box<dyn RecognitionEngine> { unimplemented!() }
//! # fn make_synth() -> Arc<dyn SpeechSynthesizer> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let shared = new_shared_state(config.messages.booting.clone());
//!     let chat = RemoteChat::new(build_client(&config.chat).unwrap(), true);
//!
//!     let (tx, rx) = event_channel();
//!     let adapters = Adapters {
//!         recognizer: make_recognizer(),
//!         synthesizer: make_synth(),
//!         chat,
//!     };
//!     let controller = InteractionController::new(&config, adapters, shared, tx.clone());
//!     tokio::spawn(controller.run(rx));
//!
//!     // tx is handed to the front-end and the hotkey listener
//! }
//! ```

pub mod chat_log;
pub mod event;
pub mod runner;
pub mod state;
pub mod transcript;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use chat_log::{ChatLog, ChatMessage, Sender};
pub use event::{event_channel, ControllerEvent, EventReceiver, EventSender};
pub use runner::{Adapters, InteractionController};
pub use state::{new_shared_state, AppState, AppStatus, SharedState};
pub use transcript::{InterruptFlag, Interruption, Marker, TranscriptRecord};
