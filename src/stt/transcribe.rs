//! Transcription parameter and result types.
//!
//! [`TranscribeParams`] carries the settings of a single Whisper inference
//! run.  [`TranscriptionResult`] is returned by
//! [`WhisperEngine::transcribe_full`](super::WhisperEngine::transcribe_full).

use crate::config::SttConfig;

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
///
/// Greedy decoding keeps interim results responsive; beam search is more
/// accurate at two to four times the latency.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy { best_of: i32 },
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// All parameters for a single Whisper transcription run.
///
/// ```
/// use voice_chat::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "en".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.language, "en");
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 language code, or `"auto"` for detection.
    pub language: String,
    pub strategy: SamplingStrategy,
    /// CPU threads handed to Whisper, capped at 8.
    pub n_threads: i32,
    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
    /// Each phrase is decoded on its own; earlier phrases are not fed back
    /// as prompt context.
    pub no_context: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "ja".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
            no_context: true,
        }
    }
}

impl From<&SttConfig> for TranscribeParams {
    fn from(cfg: &SttConfig) -> Self {
        Self {
            language: cfg.language.clone(),
            ..Self::default()
        }
    }
}

/// Number of CPU threads to use for inference, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The output of a successful transcription.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Concatenated segment text, trimmed.
    pub text: String,
    /// Number of segments Whisper produced.
    pub segment_count: usize,
    /// Wall-clock inference time in milliseconds.
    pub duration_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_take_language_from_config() {
        let cfg = SttConfig {
            language: "en".into(),
            ..SttConfig::default()
        };
        let params = TranscribeParams::from(&cfg);
        assert_eq!(params.language, "en");
        assert_eq!(params.strategy, SamplingStrategy::Greedy { best_of: 1 });
        assert!(params.no_context);
    }

    #[test]
    fn optimal_threads_is_positive_and_at_most_8() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }
}
