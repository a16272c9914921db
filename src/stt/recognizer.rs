//! Continuous recogniser: microphone in, interim and final phrase
//! transcripts out.
//!
//! A [`RecognitionEngine`] is started with a run id and an event sink.  Every
//! [`RecognitionEvent`] it emits carries that run id, so a consumer can
//! discard results that arrive after it has stopped a run.  An engine may end
//! a run on its own (long silence, device failure); it then emits an
//! [`RecognitionEvent::Error`] and/or a final [`RecognitionEvent::End`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

use crate::audio::{
    AudioCapture, CaptureError, Endpoint, EndpointerSettings, PhraseEndpointer, VadDetector,
};
use crate::stt::engine::{SttEngine, SttError, MIN_AUDIO_SAMPLES};

// ---------------------------------------------------------------------------
// Events and errors
// ---------------------------------------------------------------------------

/// Error code: nothing was said before the engine gave up.
pub const NO_SPEECH: &str = "no-speech";
/// Error code: the microphone could not be opened or stopped delivering.
pub const AUDIO_CAPTURE: &str = "audio-capture";
/// Error code: the platform refused microphone access.
pub const NOT_ALLOWED: &str = "not-allowed";

/// Something the recogniser observed during run `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Latest hypothesis for the current phrase.  One of the two texts is
    /// normally empty.
    Result {
        run: u64,
        final_text: String,
        interim_text: String,
    },
    /// A failure, as a short code (`no-speech`, `audio-capture`, …).
    Error { run: u64, code: String },
    /// The run is over; no further events follow for it.
    End { run: u64 },
}

impl RecognitionEvent {
    pub fn run(&self) -> u64 {
        match self {
            Self::Result { run, .. } | Self::Error { run, .. } | Self::End { run } => *run,
        }
    }
}

/// Callback receiving recogniser events; called from the recogniser thread.
pub type RecognitionSink = Arc<dyn Fn(RecognitionEvent) + Send + Sync>;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("speech recognition is not available")]
    Unsupported,

    #[error("failed to start recognition: {0}")]
    Start(String),
}

// ---------------------------------------------------------------------------
// RecognitionEngine trait
// ---------------------------------------------------------------------------

/// A continuous speech-to-text source.
pub trait RecognitionEngine: Send {
    /// Capability probe; fixed for the lifetime of the engine.
    fn is_supported(&self) -> bool;

    /// Begin run `run`, delivering events to `sink`.  A run already in
    /// progress is stopped first.
    fn start(&mut self, run: u64, sink: RecognitionSink) -> Result<(), RecognitionError>;

    /// Ask the current run to finish.  Must not block.
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// Phrase transcription
// ---------------------------------------------------------------------------

/// Turn one endpointer decision into the event to publish, if any.
///
/// Phrases under [`MIN_AUDIO_SAMPLES`] and blank hypotheses are dropped.
/// Transcription failures on interim audio are ignored; on final audio they
/// are logged and dropped, as the next phrase may well succeed.
pub fn transcribe_endpoint(
    engine: &dyn SttEngine,
    run: u64,
    endpoint: &Endpoint,
) -> Option<RecognitionEvent> {
    let (audio, is_final) = match endpoint {
        Endpoint::NoSpeech => {
            return Some(RecognitionEvent::Error {
                run,
                code: NO_SPEECH.into(),
            })
        }
        Endpoint::Interim(audio) => (audio, false),
        Endpoint::Final(audio) => (audio, true),
    };

    if audio.len() < MIN_AUDIO_SAMPLES {
        return None;
    }

    let text = match engine.transcribe(audio) {
        Ok(text) => text.trim().to_string(),
        Err(SttError::AudioTooLong) => return None,
        Err(e) => {
            if is_final {
                log::warn!("recogniser: final transcription failed: {e}");
            }
            return None;
        }
    };
    if text.is_empty() {
        return None;
    }

    Some(if is_final {
        RecognitionEvent::Result {
            run,
            final_text: text,
            interim_text: String::new(),
        }
    } else {
        RecognitionEvent::Result {
            run,
            final_text: String::new(),
            interim_text: text,
        }
    })
}

// ---------------------------------------------------------------------------
// WhisperRecognizer
// ---------------------------------------------------------------------------

struct ActiveRun {
    run: u64,
    stop: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

/// Production [`RecognitionEngine`]: cpal capture + energy endpointing +
/// Whisper, on a dedicated thread per run.
pub struct WhisperRecognizer {
    engine: Option<Arc<dyn SttEngine>>,
    vad_threshold: f32,
    settings: EndpointerSettings,
    supported: bool,
    active: Option<ActiveRun>,
}

impl WhisperRecognizer {
    /// `engine` is `None` when no model could be loaded, which makes the
    /// recogniser report itself unsupported.
    pub fn new(
        engine: Option<Arc<dyn SttEngine>>,
        vad_threshold: f32,
        settings: EndpointerSettings,
    ) -> Self {
        let supported = engine.is_some() && AudioCapture::probe();
        if !supported {
            log::warn!(
                "recogniser unavailable (model loaded: {}, input device: {})",
                engine.is_some(),
                AudioCapture::probe()
            );
        }
        Self {
            engine,
            vad_threshold,
            settings,
            supported,
            active: None,
        }
    }
}

impl RecognitionEngine for WhisperRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, run: u64, sink: RecognitionSink) -> Result<(), RecognitionError> {
        let engine = match (&self.engine, self.supported) {
            (Some(engine), true) => Arc::clone(engine),
            _ => return Err(RecognitionError::Unsupported),
        };
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let endpointer =
            PhraseEndpointer::new(VadDetector::new(self.vad_threshold), self.settings);
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(format!("recogniser-{run}"))
            .spawn(move || run_capture(run, engine, endpointer, thread_stop, sink))
            .map_err(|e| RecognitionError::Start(e.to_string()))?;

        log::debug!("recogniser: run {run} started");
        self.active = Some(ActiveRun {
            run,
            stop,
            _thread: thread,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.store(true, Ordering::SeqCst);
            log::debug!("recogniser: run {} stopping", active.run);
        }
    }
}

impl Drop for WhisperRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_error_code(err: &CaptureError) -> &'static str {
    if err.is_permission_denied() {
        NOT_ALLOWED
    } else {
        AUDIO_CAPTURE
    }
}

/// Body of the per-run thread.  Always finishes with `End { run }`.
fn run_capture(
    run: u64,
    engine: Arc<dyn SttEngine>,
    mut endpointer: PhraseEndpointer,
    stop: Arc<AtomicBool>,
    sink: RecognitionSink,
) {
    let (audio_tx, audio_rx) = mpsc::channel();
    let (err_tx, err_rx) = mpsc::channel::<CaptureError>();

    let stream = AudioCapture::new().and_then(|capture| {
        capture.start(audio_tx, move |e| {
            let _ = err_tx.send(e);
        })
    });
    let _stream = match stream {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("recogniser: cannot open microphone: {e}");
            sink(RecognitionEvent::Error {
                run,
                code: capture_error_code(&e).into(),
            });
            sink(RecognitionEvent::End { run });
            return;
        }
    };

    'capture: while !stop.load(Ordering::SeqCst) {
        if let Ok(e) = err_rx.try_recv() {
            sink(RecognitionEvent::Error {
                run,
                code: capture_error_code(&e).into(),
            });
            break;
        }

        let chunk = match audio_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(chunk) => chunk,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                sink(RecognitionEvent::Error {
                    run,
                    code: AUDIO_CAPTURE.into(),
                });
                break;
            }
        };

        for endpoint in endpointer.push(&chunk.to_mono_16k()) {
            if stop.load(Ordering::SeqCst) {
                break 'capture;
            }
            let gave_up = endpoint == Endpoint::NoSpeech;
            if let Some(event) = transcribe_endpoint(engine.as_ref(), run, &endpoint) {
                sink(event);
            }
            if gave_up {
                break 'capture;
            }
        }
    }

    log::debug!("recogniser: run {run} ended");
    sink(RecognitionEvent::End { run });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::engine::MockSttEngine;

    fn speech(samples: usize) -> Vec<f32> {
        vec![0.3; samples]
    }

    #[test]
    fn final_phrase_becomes_final_result() {
        let engine = MockSttEngine::ok("  今日の天気は  ");
        let ev = transcribe_endpoint(&engine, 7, &Endpoint::Final(speech(MIN_AUDIO_SAMPLES)));
        assert_eq!(
            ev,
            Some(RecognitionEvent::Result {
                run: 7,
                final_text: "今日の天気は".into(),
                interim_text: String::new(),
            })
        );
    }

    #[test]
    fn interim_phrase_becomes_interim_result() {
        let engine = MockSttEngine::ok("今日の");
        let ev = transcribe_endpoint(&engine, 1, &Endpoint::Interim(speech(MIN_AUDIO_SAMPLES)));
        assert!(matches!(
            ev,
            Some(RecognitionEvent::Result { ref final_text, ref interim_text, .. })
                if final_text.is_empty() && interim_text == "今日の"
        ));
    }

    #[test]
    fn short_or_blank_phrases_are_dropped() {
        let engine = MockSttEngine::ok("はい");
        let short = Endpoint::Final(speech(MIN_AUDIO_SAMPLES - 1));
        assert_eq!(transcribe_endpoint(&engine, 1, &short), None);

        let blank = MockSttEngine::ok("   ");
        let ok_len = Endpoint::Final(speech(MIN_AUDIO_SAMPLES));
        assert_eq!(transcribe_endpoint(&blank, 1, &ok_len), None);
    }

    #[test]
    fn transcription_failure_is_swallowed() {
        let engine = MockSttEngine::err(SttError::Transcription("boom".into()));
        let ev = transcribe_endpoint(&engine, 1, &Endpoint::Final(speech(MIN_AUDIO_SAMPLES)));
        assert_eq!(ev, None);
    }

    #[test]
    fn no_speech_becomes_error_code() {
        let engine = MockSttEngine::ok("unused");
        let ev = transcribe_endpoint(&engine, 3, &Endpoint::NoSpeech);
        assert_eq!(
            ev,
            Some(RecognitionEvent::Error {
                run: 3,
                code: NO_SPEECH.into()
            })
        );
        assert_eq!(ev.map(|e| e.run()), Some(3));
    }

    #[test]
    fn recogniser_without_model_is_unsupported() {
        let mut rec = WhisperRecognizer::new(
            None,
            0.01,
            EndpointerSettings::from(&crate::config::SttConfig::default()),
        );
        assert!(!rec.is_supported());
        let sink: RecognitionSink = Arc::new(|_| {});
        assert!(matches!(rec.start(1, sink), Err(RecognitionError::Unsupported)));
        rec.stop();
    }

    #[test]
    fn permission_failures_map_to_not_allowed() {
        let denied = CaptureError::Stream("permission denied".into());
        assert_eq!(capture_error_code(&denied), NOT_ALLOWED);
        assert_eq!(capture_error_code(&CaptureError::NoDevice), AUDIO_CAPTURE);
    }
}
