//! The two speech adapters the controller drives: capture (speech to text)
//! and output (text to speech).

pub mod capture;
pub mod output;

pub use capture::{describe_error, Observation, SpeechCapture};
pub use output::{OnEnd, SpeechOutput};
