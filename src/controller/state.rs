//! Application status and the state shared with the front-end.
//!
//! [`AppStatus`] is the controller's single source of truth for what happens
//! next.  [`AppState`] is the snapshot the front-end renders: the controller
//! publishes into it after every event and nothing else writes to it.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`, cheap to clone
//! and safe to share across threads.

use std::sync::{Arc, Mutex};

use super::chat_log::ChatMessage;

// ---------------------------------------------------------------------------
// AppStatus
// ---------------------------------------------------------------------------

/// States of the interaction controller.
///
/// ```text
/// BootingSpeech ──boot──▶ Idle ──tap──▶ Speaking(mic on) ──▶ Listening
/// Listening ──tap / final phrase──▶ SendingToRemote ──reply──▶ Speaking ──▶ Sleeping
/// Sleeping ──tap / wake──▶ Speaking(mic on) ──▶ Listening
/// any ──end command──▶ SessionEnded        any ──sleep command──▶ Sleeping
/// any ──microphone failure──▶ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppStatus {
    Idle,
    #[default]
    BootingSpeech,
    Listening,
    /// Reserved for command handling that outlives one event.  Guards treat
    /// it like [`SendingToRemote`](Self::SendingToRemote).
    ProcessingCommand,
    SendingToRemote,
    Speaking,
    Sleeping,
    Error,
    SessionEnded,
}

impl AppStatus {
    /// A request or command is in flight; new queries and wake/repeat are
    /// refused.
    ///
    /// ```
    /// use voice_chat::controller::AppStatus;
    ///
    /// assert!(AppStatus::SendingToRemote.is_busy());
    /// assert!(AppStatus::ProcessingCommand.is_busy());
    /// assert!(!AppStatus::Listening.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, AppStatus::SendingToRemote | AppStatus::ProcessingCommand)
    }

    /// States from which a wake command or a tap starts a new interaction.
    pub fn accepts_wake(&self) -> bool {
        matches!(
            self,
            AppStatus::Idle | AppStatus::SessionEnded | AppStatus::Sleeping | AppStatus::Error
        )
    }

    /// States in which the repeat command is honoured.
    pub fn accepts_repeat(&self) -> bool {
        matches!(self, AppStatus::Listening | AppStatus::Speaking)
    }

    /// Short label for logs and the status line.
    pub fn label(&self) -> &'static str {
        match self {
            AppStatus::Idle => "Idle",
            AppStatus::BootingSpeech => "BootingSpeech",
            AppStatus::Listening => "Listening",
            AppStatus::ProcessingCommand => "ProcessingCommand",
            AppStatus::SendingToRemote => "SendingToRemote",
            AppStatus::Speaking => "Speaking",
            AppStatus::Sleeping => "Sleeping",
            AppStatus::Error => "Error",
            AppStatus::SessionEnded => "SessionEnded",
        }
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// What the front-end shows.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub status: AppStatus,

    /// One-line status text (welcome, mic on, processing …).
    pub status_message: String,

    /// Set when the application cannot run at all (no credential, no speech
    /// support).  The front-end shows it instead of everything else.
    pub fatal: Option<String>,

    /// Visible transcript, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Bumped on every published change, so a renderer can skip unchanged
    /// snapshots.
    pub revision: u64,
}

impl AppState {
    pub fn new(status_message: impl Into<String>) -> Self {
        Self {
            status_message: status_message.into(),
            ..Self::default()
        }
    }

    /// Enter the blocking error state.
    pub fn set_fatal(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = AppStatus::Error;
        self.status_message = message.clone();
        self.fatal = Some(message);
        self.revision += 1;
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(status_message: impl Into<String>) -> SharedState {
    Arc::new(Mutex::new(AppState::new(status_message)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
