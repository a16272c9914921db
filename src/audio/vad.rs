//! Energy-based voice activity detection and phrase endpointing.
//!
//! [`VadDetector`] classifies 30 ms frames (480 samples @ 16 kHz) as voice
//! or silence by RMS amplitude.  [`PhraseEndpointer`] runs that classifier
//! over a continuous 16 kHz stream and decides when a phrase starts, when an
//! interim transcription is due, when the phrase is complete, and when the
//! speaker has been silent for so long that listening should give up.

use super::buffer::RingBuffer;
use super::resample::TARGET_RATE;
use crate::config::SttConfig;

// ---------------------------------------------------------------------------
// VadDetector
// ---------------------------------------------------------------------------

/// Energy-based frame classifier and silence trimmer.
///
/// ```rust
/// use voice_chat::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
/// assert_eq!(vad.trim_silence(&audio).len(), 480);
/// ```
#[derive(Debug, Clone)]
pub struct VadDetector {
    rms_threshold: f32,
    frame_size: usize,
}

impl VadDetector {
    /// `rms_threshold` around `0.01` suits a quiet room; raise it to
    /// `0.02`–`0.05` in noisy environments.
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: 480,
        }
    }

    pub fn with_frame_size(rms_threshold: f32, frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        Self {
            rms_threshold,
            frame_size,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Returns `true` when the frame's RMS exceeds the threshold.
    pub fn is_voice_frame(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }

    /// Trim leading and trailing silent frames.  Returns a sub-slice; an
    /// all-silent input yields an empty slice.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let frames: Vec<&[f32]> = audio.chunks(self.frame_size).collect();
        let Some(first) = frames.iter().position(|f| self.is_voice_frame(f)) else {
            return &audio[0..0];
        };
        let last = frames
            .iter()
            .rposition(|f| self.is_voice_frame(f))
            .unwrap_or(first);

        let start = first * self.frame_size;
        let end = ((last + 1) * self.frame_size).min(audio.len());
        &audio[start..end]
    }
}

// ---------------------------------------------------------------------------
// PhraseEndpointer
// ---------------------------------------------------------------------------

/// Timing knobs of the endpointer, all in milliseconds.  A zero
/// `interim_interval_ms` disables interim results; a zero
/// `no_speech_timeout_ms` disables the give-up timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointerSettings {
    pub phrase_end_ms: u64,
    pub interim_interval_ms: u64,
    pub no_speech_timeout_ms: u64,
    pub max_phrase_ms: u64,
    pub pre_roll_ms: u64,
}

impl From<&SttConfig> for EndpointerSettings {
    fn from(cfg: &SttConfig) -> Self {
        Self {
            phrase_end_ms: cfg.phrase_end_ms,
            interim_interval_ms: cfg.interim_interval_ms,
            no_speech_timeout_ms: cfg.no_speech_timeout_secs * 1000,
            max_phrase_ms: (cfg.max_phrase_secs.max(0.0) * 1000.0) as u64,
            pre_roll_ms: 300,
        }
    }
}

/// Decision produced by [`PhraseEndpointer::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Speech is ongoing; the audio of the phrase so far.
    Interim(Vec<f32>),
    /// The phrase is complete; its full audio including pre-roll.
    Final(Vec<f32>),
    /// Nothing has been said for `no_speech_timeout_ms`.
    NoSpeech,
}

/// Streaming phrase detector over 16 kHz mono audio.
pub struct PhraseEndpointer {
    vad: VadDetector,
    settings: EndpointerSettings,
    frame_ms: u64,
    pending: Vec<f32>,
    pre_roll: RingBuffer<f32>,
    phrase: Vec<f32>,
    in_phrase: bool,
    silence_ms: u64,
    since_interim_ms: u64,
    idle_ms: u64,
}

impl PhraseEndpointer {
    pub fn new(vad: VadDetector, settings: EndpointerSettings) -> Self {
        let frame_ms = (vad.frame_size() as u64 * 1000 / TARGET_RATE as u64).max(1);
        let pre_roll_len = (settings.pre_roll_ms * TARGET_RATE as u64 / 1000) as usize;
        Self {
            pre_roll: RingBuffer::new(pre_roll_len.max(vad.frame_size())),
            vad,
            settings,
            frame_ms,
            pending: Vec::new(),
            phrase: Vec::new(),
            in_phrase: false,
            silence_ms: 0,
            since_interim_ms: 0,
            idle_ms: 0,
        }
    }

    /// Whether a phrase is currently open.
    pub fn in_phrase(&self) -> bool {
        self.in_phrase
    }

    /// Forget any partial phrase and restart all timers.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.pre_roll.clear();
        self.phrase.clear();
        self.in_phrase = false;
        self.silence_ms = 0;
        self.since_interim_ms = 0;
        self.idle_ms = 0;
    }

    /// Feed 16 kHz mono samples of any length; returns the decisions reached
    /// on the complete frames they contain.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Endpoint> {
        self.pending.extend_from_slice(samples);
        let frame_size = self.vad.frame_size();
        let mut out = Vec::new();
        while self.pending.len() >= frame_size {
            let frame: Vec<f32> = self.pending.drain(..frame_size).collect();
            if let Some(endpoint) = self.process_frame(&frame) {
                out.push(endpoint);
            }
        }
        out
    }

    fn process_frame(&mut self, frame: &[f32]) -> Option<Endpoint> {
        let voice = self.vad.is_voice_frame(frame);

        if !self.in_phrase {
            self.pre_roll.push_slice(frame);
            if voice {
                self.in_phrase = true;
                self.phrase = self.pre_roll.drain();
                self.silence_ms = 0;
                self.since_interim_ms = 0;
                self.idle_ms = 0;
                return None;
            }
            self.idle_ms += self.frame_ms;
            let timeout = self.settings.no_speech_timeout_ms;
            if timeout > 0 && self.idle_ms >= timeout {
                self.idle_ms = 0;
                return Some(Endpoint::NoSpeech);
            }
            return None;
        }

        self.phrase.extend_from_slice(frame);
        self.silence_ms = if voice { 0 } else { self.silence_ms + self.frame_ms };
        self.since_interim_ms += self.frame_ms;

        let phrase_ms = self.phrase.len() as u64 * 1000 / TARGET_RATE as u64;
        let max_ms = self.settings.max_phrase_ms;
        if self.silence_ms >= self.settings.phrase_end_ms || (max_ms > 0 && phrase_ms >= max_ms) {
            self.in_phrase = false;
            self.silence_ms = 0;
            self.idle_ms = 0;
            self.pre_roll.clear();
            return Some(Endpoint::Final(std::mem::take(&mut self.phrase)));
        }

        let interval = self.settings.interim_interval_ms;
        if interval > 0 && self.since_interim_ms >= interval {
            self.since_interim_ms = 0;
            return Some(Endpoint::Interim(self.phrase.clone()));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
