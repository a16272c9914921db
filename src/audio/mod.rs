//! Audio front half of the recogniser: microphone capture, format
//! conversion, and phrase detection.
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!           → resample_to_16k → PhraseEndpointer (VadDetector + RingBuffer pre-roll)
//! ```

pub mod buffer;
pub mod capture;
pub mod resample;
pub mod vad;

pub use buffer::RingBuffer;
pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use resample::{resample_to_16k, stereo_to_mono, TARGET_RATE};
pub use vad::{Endpoint, EndpointerSettings, PhraseEndpointer, VadDetector};
