//! Text-to-speech engines and voice selection.

pub mod synth;
pub mod voice;

pub use synth::{CommandSynthesizer, SpeechSynthesizer, SynthError, Utterance};
pub use voice::{select_voice, Gender, Voice};
