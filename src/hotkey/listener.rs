//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` has no shutdown API.  Dropping [`HotkeyListener`] sets a
//! stop flag so the callback discards further events; the thread itself stays
//! blocked in rdev until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{HotkeyBindings, HotkeyEvent};

// ---------------------------------------------------------------------------
// KeyFilter
// ---------------------------------------------------------------------------

/// Turns raw press/release events into one [`HotkeyEvent`] per key-down.
///
/// Holding a key makes the OS repeat `KeyPress`; only the first press before
/// a release counts.
#[derive(Debug)]
pub struct KeyFilter {
    bindings: HotkeyBindings,
    held: Vec<rdev::Key>,
}

impl KeyFilter {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            held: Vec::new(),
        }
    }

    pub fn on_event(&mut self, event: &rdev::EventType) -> Option<HotkeyEvent> {
        match *event {
            rdev::EventType::KeyPress(key) => {
                let mapped = self.bindings.event_for(key)?;
                if self.held.contains(&key) {
                    return None;
                }
                self.held.push(key);
                Some(mapped)
            }
            rdev::EventType::KeyRelease(key) => {
                self.held.retain(|k| *k != key);
                None
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.  Drop it to stop forwarding.
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread.  Events go out with `blocking_send`, which
    /// is safe from a non-async thread.
    pub fn start(
        bindings: HotkeyBindings,
        tx: mpsc::Sender<HotkeyEvent>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut filter = KeyFilter::new(bindings);
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Some(ev) = filter.on_event(&event.event_type) {
                        log::debug!("hotkey: {ev:?}");
                        let _ = tx.blocking_send(ev);
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {e:?}");
                }
            })?;

        log::info!(
            "hotkey: tap = {:?}, suspend = {:?}",
            bindings.tap,
            bindings.suspend
        );
        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
