//! Speech synthesis engines.
//!
//! [`SpeechSynthesizer`] speaks one [`Utterance`] per call and resolves when
//! playback finishes.  Dropping the returned future must stop playback; the
//! output adapter relies on that to cancel speech immediately.
//!
//! [`CommandSynthesizer`] shells out to `espeak-ng` / `espeak` or macOS
//! `say`, one child process per utterance, spawned with `kill_on_drop`.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use super::voice::{parse_espeak_voices, parse_say_voices, primary_subtag, Voice};
use crate::config::TtsConfig;

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("speech synthesis is not available")]
    Unsupported,

    #[error("failed to launch synthesiser: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("synthesiser exited with {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Utterance / trait
// ---------------------------------------------------------------------------

/// One text payload rendered to speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub language: String,
    /// Voice id from the engine's catalogue; `None` = engine default.
    pub voice: Option<String>,
    /// Words per minute.
    pub rate: u32,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Capability probe; fixed for the lifetime of the engine.
    fn is_supported(&self) -> bool;

    /// Voices the engine offers.  Read once at startup.
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    /// Speak `utterance` to completion.
    async fn speak(&self, utterance: &Utterance) -> Result<(), SynthError>;
}

// ---------------------------------------------------------------------------
// CommandSynthesizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Espeak,
    Say,
}

impl Flavor {
    fn of(program: &str) -> Self {
        let stem = std::path::Path::new(program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(program);
        if stem == "say" {
            Self::Say
        } else {
            Self::Espeak
        }
    }
}

/// Process-backed synthesiser.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    flavor: Flavor,
    voices: Vec<Voice>,
    supported: bool,
}

impl CommandSynthesizer {
    /// Probe `cfg.program` by listing its voices.  A program that cannot be
    /// launched yields an unsupported synthesiser rather than an error.
    pub async fn probe(cfg: &TtsConfig) -> Self {
        let flavor = Flavor::of(&cfg.program);
        let mut cmd = Command::new(&cfg.program);
        match flavor {
            Flavor::Espeak => cmd.arg(format!("--voices={}", primary_subtag(&cfg.language))),
            Flavor::Say => cmd.args(["-v", "?"]),
        };
        cmd.stdin(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

        let (supported, voices) = match cmd.output().await {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout);
                let voices = match flavor {
                    Flavor::Espeak => parse_espeak_voices(&text),
                    Flavor::Say => parse_say_voices(&text),
                };
                (true, voices)
            }
            Ok(out) => {
                log::warn!("tts: {} exited with {} while listing voices", cfg.program, out.status);
                (false, Vec::new())
            }
            Err(e) => {
                log::warn!("tts: {} unavailable: {e}", cfg.program);
                (false, Vec::new())
            }
        };

        log::info!(
            "tts: {} supported={supported}, {} voice(s)",
            cfg.program,
            voices.len()
        );
        Self {
            program: cfg.program.clone(),
            flavor,
            voices,
            supported,
        }
    }

    fn command_for(&self, utterance: &Utterance) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            Flavor::Espeak => {
                let voice = utterance
                    .voice
                    .clone()
                    .unwrap_or_else(|| primary_subtag(&utterance.language));
                cmd.arg("-v").arg(voice);
                cmd.arg("-s").arg(utterance.rate.to_string());
            }
            Flavor::Say => {
                if let Some(voice) = &utterance.voice {
                    cmd.arg("-v").arg(voice);
                }
                cmd.arg("-r").arg(utterance.rate.to_string());
            }
        }
        cmd.arg(&utterance.text);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SynthError> {
        if !self.supported {
            return Err(SynthError::Unsupported);
        }
        let mut child = self.command_for(utterance).spawn()?;
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SynthError::Failed(status.to_string()))
        }
    }
}
