//! Speech-to-text.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  WhisperRecognizer (RecognitionEngine)   one thread per run │
//! │                                                            │
//! │   AudioCapture ─▶ PhraseEndpointer ─▶ SttEngine ─▶ sink    │
//! │                   interim / final      WhisperEngine        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust,no_run
//! use voice_chat::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-small.bin", TranscribeParams::default())
//!     .expect("model not found");
//! let text = engine.transcribe(&vec![0.0; 16_000]).unwrap();
//! println!("{text}");
//! ```

pub mod engine;
pub mod recognizer;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_AUDIO_SAMPLES, MIN_AUDIO_SAMPLES};
pub use recognizer::{
    RecognitionEngine, RecognitionError, RecognitionEvent, RecognitionSink, WhisperRecognizer,
    AUDIO_CAPTURE, NOT_ALLOWED, NO_SPEECH,
};
pub use transcribe::{SamplingStrategy, TranscribeParams, TranscriptionResult};

#[cfg(test)]
pub use engine::MockSttEngine;
