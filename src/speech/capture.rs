//! Speech capture adapter.
//!
//! Wraps a [`RecognitionEngine`] and keeps the observable state the
//! controller reads: whether capture is listening, the latest best-effort
//! transcript, and the last error as a user-facing message.
//!
//! Engine events arrive through the controller's event queue and are fed
//! back with [`SpeechCapture::apply`].  Each start opens a new run; events
//! from any other run are ignored, so nothing recognised after
//! [`stop_listening`](SpeechCapture::stop_listening) can leak into the next
//! decision.

use crate::stt::{
    RecognitionEngine, RecognitionEvent, RecognitionSink, AUDIO_CAPTURE, NOT_ALLOWED, NO_SPEECH,
};

const MSG_NO_SPEECH: &str = "音声が検出されませんでした。もう一度お試しください。";
const MSG_AUDIO_CAPTURE: &str = "音声キャプチャに失敗しました。マイクが接続され、許可されていますか？";
const MSG_NOT_ALLOWED: &str = "マイクへのアクセスが拒否されました。マイクの権限を有効にしてください。";
const MSG_START_FAILED: &str =
    "聞き取りの開始に失敗しました。マイクが利用可能であることを確認してください。";

/// User-facing message for a recogniser error code.
pub fn describe_error(code: &str) -> String {
    match code {
        NO_SPEECH => MSG_NO_SPEECH.to_string(),
        AUDIO_CAPTURE => MSG_AUDIO_CAPTURE.to_string(),
        NOT_ALLOWED | "service-not-allowed" => MSG_NOT_ALLOWED.to_string(),
        other => format!("音声認識エラー: {other}"),
    }
}

/// What changed after applying one engine event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The live transcript now reads this.
    Transcript(String),
    /// An error was reported; capture is no longer listening.
    Error(String),
    /// The engine stopped by itself.
    Ended,
}

pub struct SpeechCapture {
    engine: Box<dyn RecognitionEngine>,
    sink: RecognitionSink,
    supported: bool,
    listening: bool,
    run: u64,
    transcript: String,
    is_final: bool,
    error: Option<String>,
}

impl SpeechCapture {
    /// `sink` receives the engine's events; it should post them back to
    /// whoever calls [`apply`](Self::apply).
    pub fn new(engine: Box<dyn RecognitionEngine>, sink: RecognitionSink) -> Self {
        let supported = engine.is_supported();
        Self {
            engine,
            sink,
            supported,
            listening: false,
            run: 0,
            transcript: String::new(),
            is_final: false,
            error: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Whether the current transcript is a finished phrase rather than an
    /// interim hypothesis.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// No-op when unsupported or already listening.  Clears the transcript
    /// and error before starting.
    pub fn start_listening(&mut self) {
        if !self.supported || self.listening {
            return;
        }
        self.transcript.clear();
        self.is_final = false;
        self.error = None;
        self.run += 1;
        match self.engine.start(self.run, self.sink.clone()) {
            Ok(()) => {
                self.listening = true;
                log::debug!("capture: listening (run {})", self.run);
            }
            Err(e) => {
                log::error!("capture: start failed: {e}");
                self.error = Some(MSG_START_FAILED.to_string());
                self.listening = false;
            }
        }
    }

    /// No-op when not listening.  Takes effect immediately: later events of
    /// the stopped run are ignored.
    pub fn stop_listening(&mut self) {
        if !self.listening {
            return;
        }
        self.engine.stop();
        self.listening = false;
        self.run += 1;
        log::debug!("capture: stopped");
    }

    /// Fold one engine event into the adapter state.
    pub fn apply(&mut self, event: RecognitionEvent) -> Option<Observation> {
        if event.run() != self.run {
            return None;
        }
        match event {
            RecognitionEvent::Result {
                final_text,
                interim_text,
                ..
            } => {
                let (text, is_final) = match final_text.trim() {
                    "" => (interim_text.trim().to_string(), false),
                    t => (t.to_string(), true),
                };
                if text == self.transcript && is_final == self.is_final {
                    return None;
                }
                self.transcript = text.clone();
                self.is_final = is_final;
                Some(Observation::Transcript(text))
            }
            RecognitionEvent::Error { code, .. } => {
                log::warn!("capture: recogniser error {code}");
                let message = describe_error(&code);
                self.error = Some(message.clone());
                self.listening = false;
                Some(Observation::Error(message))
            }
            RecognitionEvent::End { .. } => {
                if !self.listening {
                    return None;
                }
                self.listening = false;
                Some(Observation::Ended)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
