//! Global hotkeys, backed by `rdev`.
//!
//! Two keys are watched: the tap key acts as the single push button, the
//! suspend key sends the application to the background and back.
//!
//! `rdev::listen()` blocks forever, so [`HotkeyListener::start`] runs it on a
//! dedicated OS thread and forwards [`HotkeyEvent`]s over a tokio channel.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use voice_chat::config::HotkeyConfig;
//! use voice_chat::hotkey::{HotkeyBindings, HotkeyListener};
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let bindings = HotkeyBindings::from_config(&HotkeyConfig::default()).expect("bad key");
//! let _listener = HotkeyListener::start(bindings, tx).expect("hotkey thread");
//! ```

pub mod listener;

pub use listener::HotkeyListener;

use crate::config::HotkeyConfig;

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Events emitted by the hotkey listener thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The tap key went down (auto-repeat is filtered out).
    Tap,
    /// The suspend key went down.
    ToggleSuspend,
}

// ---------------------------------------------------------------------------
// HotkeyBindings
// ---------------------------------------------------------------------------

// rdev::Key is only PartialEq
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeyBindings {
    pub tap: rdev::Key,
    pub suspend: rdev::Key,
}

impl HotkeyBindings {
    /// Resolve both configured key names.  `None` if either is unknown or
    /// both name the same key.
    pub fn from_config(cfg: &HotkeyConfig) -> Option<Self> {
        let tap = parse_key(&cfg.tap_key)?;
        let suspend = parse_key(&cfg.suspend_key)?;
        (tap != suspend).then_some(Self { tap, suspend })
    }

    /// Which event, if any, a key-down of `key` maps to.
    pub fn event_for(&self, key: rdev::Key) -> Option<HotkeyEvent> {
        if key == self.tap {
            Some(HotkeyEvent::Tap)
        } else if key == self.suspend {
            Some(HotkeyEvent::ToggleSuspend)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from the config file into an [`rdev::Key`].
///
/// F1 to F12, a handful of named keys and single ASCII letters are accepted,
/// case-insensitively.
///
/// ```
/// use voice_chat::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("esc"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("q"), Some(rdev::Key::KeyQ));
/// assert_eq!(parse_key("Ctrl+V"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    const FUNCTION: [rdev::Key; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];
    const LETTERS: [rdev::Key; 26] = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];

    let name = name.trim().to_ascii_uppercase();

    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<usize>().ok()) {
        return (1..=12).contains(&n).then(|| FUNCTION[n - 1]);
    }
    if let [c @ b'A'..=b'Z'] = name.as_bytes() {
        return Some(LETTERS[usize::from(c - b'A')]);
    }

    match name.as_str() {
        "ESCAPE" | "ESC" => Some(Escape),
        "SPACE" => Some(Space),
        "RETURN" | "ENTER" => Some(Return),
        "TAB" => Some(Tab),
        "PAUSE" => Some(Pause),
        "SCROLLLOCK" => Some(ScrollLock),
        "PRINTSCREEN" => Some(PrintScreen),
        "HOME" => Some(Home),
        "END" => Some(End),
        "INSERT" => Some(Insert),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
