//! Everything that can happen to the controller, as one event type.
//!
//! Adapter callbacks, timers and finished remote requests all post a
//! [`ControllerEvent`] into the controller's queue; the controller handles
//! them one at a time, so no callback ever runs controller logic directly.

use tokio::sync::mpsc;

use crate::chat::{ChatError, ChatReply};
use crate::stt::RecognitionEvent;

#[derive(Debug)]
pub enum ControllerEvent {
    /// The single push button (front-end key, hotkey).
    Tap,

    /// Raw recogniser output for the capture adapter.
    Recognition(RecognitionEvent),

    /// Utterance `utterance` finished playing or was cancelled.
    SpeechFinished { utterance: u64 },

    /// The transcript debounce timer `generation` expired.
    DebounceElapsed { generation: u64 },

    /// The post-prompt capture restart timer `generation` expired.
    RestartCapture { generation: u64 },

    /// Remote request `request` completed.
    RemoteSettled {
        request: u64,
        session_id: Option<u64>,
        user_text: String,
        placeholder: u64,
        result: Result<ChatReply, ChatError>,
    },

    /// The application went to the background.
    Suspend,

    /// The application came back to the foreground.
    Resume,

    /// Tear everything down and stop the event loop.
    Shutdown,
}

pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ControllerEvent>;

/// Create the controller's event queue.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
