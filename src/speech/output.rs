//! Speech output adapter.
//!
//! Wraps a [`SpeechSynthesizer`] with the callback contract the controller
//! depends on:
//!
//! - `speak(text, on_end)` cancels whatever is playing first, then invokes
//!   `on_end` exactly once: after natural completion or after an error.
//! - `cancel()` stops playback immediately, flips `is_speaking` to false
//!   before returning, and still invokes the pending `on_end` exactly once,
//!   synchronously.
//! - Blank text, or an unsupported engine, invokes `on_end` immediately.
//!
//! Playback runs in a spawned tokio task; `speak` must be called from within
//! a runtime.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::config::TtsConfig;
use crate::tts::{select_voice, SpeechSynthesizer, Utterance};

/// Completion callback for one utterance.
pub type OnEnd = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
    generation: u64,
    on_end: OnEnd,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    pending: Option<Pending>,
}

pub struct SpeechOutput {
    synth: Arc<dyn SpeechSynthesizer>,
    inner: Arc<Mutex<Inner>>,
    language: String,
    voice: Option<String>,
    rate: u32,
}

impl SpeechOutput {
    /// Voice: the configured override, else the best catalogue match for
    /// `cfg.language`, else the engine default.
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, cfg: &TtsConfig) -> Self {
        let voice = cfg.voice.clone().or_else(|| {
            let voices = synth.voices();
            match select_voice(&voices, &cfg.language) {
                Some(v) => {
                    log::info!("tts: using voice {} ({})", v.name, v.language);
                    Some(v.id.clone())
                }
                None => {
                    log::warn!("tts: no {} voice found, using engine default", cfg.language);
                    None
                }
            }
        });
        Self {
            synth,
            inner: Arc::new(Mutex::new(Inner::default())),
            language: cfg.language.clone(),
            voice,
            rate: cfg.rate,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synth.is_supported()
    }

    pub fn is_speaking(&self) -> bool {
        lock(&self.inner).pending.is_some()
    }

    /// The voice id chosen at construction, if any.
    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn speak<F>(&self, text: &str, on_end: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let text = text.trim();
        if !self.is_supported() || text.is_empty() {
            on_end();
            return;
        }

        let utterance = Utterance {
            text: text.to_string(),
            language: self.language.clone(),
            voice: self.voice.clone(),
            rate: self.rate,
        };

        let mut inner = lock(&self.inner);
        inner.generation += 1;
        let generation = inner.generation;

        let synth = Arc::clone(&self.synth);
        let state = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            if let Err(e) = synth.speak(&utterance).await {
                log::warn!("tts: utterance failed: {e}");
            }
            let callback = {
                let mut inner = lock(&state);
                match &inner.pending {
                    Some(p) if p.generation == generation => inner.pending.take(),
                    _ => None,
                }
            };
            if let Some(pending) = callback {
                (pending.on_end)();
            }
        });

        inner.pending = Some(Pending {
            generation,
            on_end: Box::new(on_end),
            task,
        });
    }

    /// Stop playback now.  The pending callback, if any, runs before this
    /// returns.
    pub fn cancel(&self) {
        let pending = lock(&self.inner).pending.take();
        if let Some(pending) = pending {
            pending.task.abort();
            (pending.on_end)();
        }
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.inner).pending.take() {
            pending.task.abort();
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> std::sync::MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
