//! Scenario tests for the interaction controller.
//!
//! Every adapter is an in-test double and tokio time is paused, so speech,
//! debounce and restart delays advance deterministically.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::*;
use crate::chat::{ChatClient, ChatError, ChatReply, ChatSession, RemoteChat};
use crate::config::{AppConfig, Messages};
use crate::stt::{
    RecognitionEngine, RecognitionError, RecognitionEvent, RecognitionSink, NOT_ALLOWED, NO_SPEECH,
};
use crate::tts::{SpeechSynthesizer, SynthError, Utterance};

const SPEECH_MS: u64 = 200;
const REMOTE_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MicState {
    sink: Option<RecognitionSink>,
    run: u64,
    starts: usize,
}

/// Test handle on the fake microphone: say things into the current run.
#[derive(Clone, Default)]
struct Mic(Arc<Mutex<MicState>>);

impl Mic {
    fn emit(&self, event: impl FnOnce(u64) -> RecognitionEvent) {
        let (sink, run) = {
            let state = self.0.lock().unwrap();
            (state.sink.clone(), state.run)
        };
        if let Some(sink) = sink {
            sink(event(run));
        }
    }

    fn interim(&self, text: &str) {
        self.emit(|run| RecognitionEvent::Result {
            run,
            final_text: String::new(),
            interim_text: text.into(),
        });
    }

    fn phrase(&self, text: &str) {
        self.emit(|run| RecognitionEvent::Result {
            run,
            final_text: text.into(),
            interim_text: String::new(),
        });
    }

    fn fail(&self, code: &str) {
        self.emit(|run| RecognitionEvent::Error {
            run,
            code: code.into(),
        });
        self.emit(|run| RecognitionEvent::End { run });
        self.0.lock().unwrap().sink = None;
    }

    fn starts(&self) -> usize {
        self.0.lock().unwrap().starts
    }
}

struct FakeRecognizer {
    supported: bool,
    mic: Mic,
}

impl RecognitionEngine for FakeRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, run: u64, sink: RecognitionSink) -> Result<(), RecognitionError> {
        let mut state = self.mic.0.lock().unwrap();
        state.sink = Some(sink);
        state.run = run;
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.mic.0.lock().unwrap().sink = None;
    }
}

struct FakeSynth {
    supported: bool,
    spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SynthError> {
        self.spoken.lock().unwrap().push(utterance.text.clone());
        tokio::time::sleep(Duration::from_millis(SPEECH_MS)).await;
        Ok(())
    }
}

/// Answers after `REMOTE_MS` with the scripted result, or an echo.
#[derive(Default)]
struct ScriptedChat {
    replies: Mutex<VecDeque<Result<ChatReply, ChatError>>>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn send_message(
        &self,
        _session: &ChatSession,
        text: &str,
        _web_grounding: bool,
    ) -> Result<ChatReply, ChatError> {
        self.sent.lock().unwrap().push(text.to_string());
        tokio::time::sleep(Duration::from_millis(REMOTE_MS)).await;
        let scripted = self.replies.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ChatReply {
                text: format!("{text}への回答"),
                citations: Vec::new(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Options {
    capture_supported: bool,
    output_supported: bool,
    replies: Vec<Result<ChatReply, ChatError>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            capture_supported: true,
            output_supported: true,
            replies: Vec::new(),
        }
    }
}

struct Harness {
    ctrl: InteractionController,
    rx: EventReceiver,
    mic: Mic,
    spoken: Arc<Mutex<Vec<String>>>,
    remote: Arc<ScriptedChat>,
    shared: SharedState,
    msgs: Messages,
}

impl Harness {
    fn new() -> Self {
        Self::with(Options::default())
    }

    fn with(opts: Options) -> Self {
        let config = AppConfig::default();
        let mic = Mic::default();
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let remote = Arc::new(ScriptedChat {
            replies: Mutex::new(opts.replies.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        });

        let adapters = Adapters {
            recognizer: Box::new(FakeRecognizer {
                supported: opts.capture_supported,
                mic: mic.clone(),
            }),
            synthesizer: Arc::new(FakeSynth {
                supported: opts.output_supported,
                spoken: Arc::clone(&spoken),
            }),
            chat: RemoteChat::new(remote.clone(), true),
        };
        let shared = new_shared_state(config.messages.booting.clone());
        let (tx, rx) = event_channel();
        let mut ctrl = InteractionController::new(&config, adapters, shared.clone(), tx);
        ctrl.boot();

        Self {
            ctrl,
            rx,
            mic,
            spoken,
            remote,
            shared,
            msgs: config.messages,
        }
    }

    /// Handle queued events while `ms` of (paused) time passes.
    async fn run_for(&mut self, ms: u64) {
        let deadline = Instant::now() + Duration::from_millis(ms);
        loop {
            tokio::select! {
                biased;
                Some(event) = self.rx.recv() => {
                    self.ctrl.handle(event);
                }
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
    }

    fn tap(&mut self) {
        self.ctrl.handle(ControllerEvent::Tap);
    }

    /// Tap from a resting state and wait until capture is running.
    async fn listen(&mut self) {
        self.tap();
        self.run_for(SPEECH_MS + 300).await;
        assert_eq!(self.ctrl.status(), AppStatus::Listening);
        assert!(self.ctrl.is_capturing());
    }

    /// Say a finished phrase and let the debounce expire.
    async fn say(&mut self, text: &str) {
        self.mic.phrase(text);
        self.run_for(400).await;
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    fn last_spoken(&self) -> Option<String> {
        self.spoken().last().cloned()
    }

    fn sent(&self) -> Vec<String> {
        self.remote.sent.lock().unwrap().clone()
    }

    fn session_id(&self) -> Option<u64> {
        self.ctrl.chat().session().map(|s| s.id)
    }
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn boot_starts_session_and_welcomes() {
    let h = Harness::new();
    assert_eq!(h.ctrl.status(), AppStatus::Idle);
    assert_eq!(h.ctrl.status_message(), h.msgs.welcome);
    assert!(h.session_id().is_some());

    let shared = h.shared.lock().unwrap();
    assert_eq!(shared.status, AppStatus::Idle);
    assert!(shared.fatal.is_none());
    assert!(shared.revision > 0);
}

#[tokio::test(start_paused = true)]
async fn unsupported_speech_is_fatal_and_ignores_taps() {
    let mut h = Harness::with(Options {
        output_supported: false,
        ..Options::default()
    });
    assert_eq!(h.ctrl.status(), AppStatus::Error);
    assert_eq!(
        h.shared.lock().unwrap().fatal.as_deref(),
        Some(h.msgs.speech_unsupported.as_str())
    );

    h.tap();
    h.run_for(1000).await;
    assert_eq!(h.ctrl.status(), AppStatus::Error);
    assert!(h.spoken().is_empty());
    assert!(h.session_id().is_none());
}

// ---------------------------------------------------------------------------
// Tap
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn tap_from_idle_listens_after_prompt() {
    let mut h = Harness::new();
    h.tap();
    assert_eq!(h.ctrl.status(), AppStatus::Speaking);
    assert!(!h.ctrl.is_capturing());
    h.run_for(10).await;
    assert_eq!(h.spoken(), vec![h.msgs.mic_on.clone()]);

    // prompt over, restart delay pending
    h.run_for(SPEECH_MS).await;
    assert_eq!(h.ctrl.status(), AppStatus::Listening);
    assert!(!h.ctrl.is_capturing());

    h.run_for(200).await;
    assert!(h.ctrl.is_capturing());
    assert_eq!(h.mic.starts(), 1);
    assert_eq!(h.shared.lock().unwrap().status, AppStatus::Listening);
}

#[tokio::test(start_paused = true)]
async fn tap_while_speaking_interrupts_and_sleeps() {
    let mut h = Harness::new();
    h.tap();
    assert!(h.ctrl.is_speaking());

    h.tap();
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(!h.ctrl.is_speaking());
    assert!(h.ctrl.is_interrupted());
    assert_eq!(h.ctrl.marker(), Some(&Marker::Interrupted(Interruption::Tap)));

    // the cancelled prompt must not bring capture back
    h.run_for(1000).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.mic.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn tap_while_listening_sends_live_transcript() {
    let mut h = Harness::new();
    h.listen().await;

    h.mic.interim("明日の予定");
    h.run_for(50).await;
    h.tap();
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);
    assert!(!h.ctrl.is_capturing());
    assert_eq!(
        h.ctrl.marker(),
        Some(&Marker::Processed("明日の予定".into()))
    );

    h.run_for(10).await;
    assert_eq!(h.sent(), vec!["明日の予定".to_string()]);

    let log = h.ctrl.log().messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].sender, Sender::User);
    assert!(log[1].generating);
    assert_eq!(log[1].text, h.msgs.generating);
}

#[tokio::test(start_paused = true)]
async fn tap_while_listening_with_nothing_heard_sleeps() {
    let mut h = Harness::new();
    h.listen().await;

    h.tap();
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.ctrl.marker(), Some(&Marker::EmptyTap));

    h.run_for(1000).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(h.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tap_from_sleeping_keeps_session_and_log() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("質問").await;
    h.run_for(REMOTE_MS + SPEECH_MS + 100).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    let session = h.session_id();

    h.tap();
    h.run_for(SPEECH_MS + 300).await;
    assert_eq!(h.ctrl.status(), AppStatus::Listening);
    assert_eq!(h.session_id(), session);
    assert_eq!(h.ctrl.log().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn busy_tap_keeps_request_but_suppresses_speech() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("長い質問").await;
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);

    h.tap();
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(!h.ctrl.is_capturing());
    assert_eq!(
        h.ctrl.marker(),
        Some(&Marker::Interrupted(Interruption::BusyTap))
    );

    h.run_for(REMOTE_MS + 500).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    let log = h.ctrl.log().messages();
    assert_eq!(log[1].text, "長い質問への回答");
    assert!(!log[1].generating);
    assert!(!h.spoken().iter().any(|s| s.contains("への回答")));
}

// ---------------------------------------------------------------------------
// Transcripts and commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn debounce_collapses_bursts() {
    let mut h = Harness::new();
    h.listen().await;

    h.mic.interim("今日");
    h.run_for(100).await;
    h.mic.interim("今日の天気");
    h.run_for(100).await;
    h.mic.phrase("今日の天気は？");
    h.run_for(100).await;
    assert!(h.sent().is_empty());

    h.run_for(300).await;
    assert_eq!(h.sent(), vec!["今日の天気は？".to_string()]);
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);
}

#[tokio::test(start_paused = true)]
async fn interim_hypothesis_is_not_sent() {
    let mut h = Harness::new();
    h.listen().await;

    h.mic.interim("今日の");
    h.run_for(1000).await;
    assert!(h.sent().is_empty());
    assert_eq!(h.ctrl.status(), AppStatus::Listening);

    // the same words, now final, go out
    h.mic.phrase("今日の");
    h.run_for(400).await;
    assert_eq!(h.sent(), vec!["今日の".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn reply_is_logged_spoken_and_then_sleeps() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("天気は？").await;
    assert_eq!(h.ctrl.status_message(), h.msgs.processing);

    h.run_for(REMOTE_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Speaking);
    assert!(!h.ctrl.is_capturing());
    let log = h.ctrl.log().messages();
    assert_eq!(log[1].sender, Sender::Remote);
    assert_eq!(log[1].text, "天気は？への回答");
    assert_eq!(h.last_spoken().as_deref(), Some("天気は？への回答"));

    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.ctrl.status_message(), h.msgs.sleeping);
    assert_eq!(h.ctrl.chat().session().unwrap().history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_becomes_system_entry_and_notice() {
    let mut h = Harness::with(Options {
        replies: vec![Err(ChatError::Timeout)],
        ..Options::default()
    });
    h.listen().await;
    h.say("質問").await;
    h.run_for(REMOTE_MS + 50).await;

    let log = h.ctrl.log().messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].sender, Sender::System);
    assert_eq!(log[1].text, h.msgs.remote_error);
    assert!(!log[1].generating);
    assert_eq!(h.last_spoken(), Some(h.msgs.remote_error.clone()));

    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
}

#[tokio::test(start_paused = true)]
async fn blank_reply_speaks_no_response_notice() {
    let mut h = Harness::with(Options {
        replies: vec![Ok(ChatReply {
            text: "  \n ".into(),
            citations: Vec::new(),
        })],
        ..Options::default()
    });
    h.listen().await;
    h.say("質問").await;
    h.run_for(REMOTE_MS + SPEECH_MS + 100).await;

    let log = h.ctrl.log().messages();
    assert_eq!(log[1].sender, Sender::System);
    assert_eq!(log[1].text, h.msgs.empty_response);
    assert_eq!(h.last_spoken(), Some(h.msgs.no_response.clone()));
    assert!(!h.spoken().iter().any(|s| s.trim().is_empty()));
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(h.ctrl.chat().session().unwrap().history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn end_session_then_tap_starts_over() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("質問").await;
    h.run_for(REMOTE_MS + SPEECH_MS + 100).await;
    h.tap();
    h.run_for(SPEECH_MS + 300).await;
    let first = h.session_id();
    assert!(!h.ctrl.log().is_empty());

    h.say("終了").await;
    assert!(h.session_id().is_none());
    assert!(h.ctrl.log().is_empty());
    assert_eq!(
        h.ctrl.marker(),
        Some(&Marker::Interrupted(Interruption::EndCommand))
    );
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::SessionEnded);
    assert_eq!(h.last_spoken(), Some(h.msgs.session_ended.clone()));

    h.tap();
    h.run_for(SPEECH_MS + 300).await;
    assert_eq!(h.ctrl.status(), AppStatus::Listening);
    assert!(h.session_id().is_some());
    assert_ne!(h.session_id(), first);
    assert!(h.ctrl.log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sleep_command_while_listening_speaks_confirmation() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("スリープ").await;

    assert_eq!(
        h.ctrl.marker(),
        Some(&Marker::Interrupted(Interruption::SleepCommand))
    );
    assert!(!h.ctrl.is_capturing());
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.last_spoken(), Some(h.msgs.sleep_confirmation.clone()));
    assert!(h.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sleep_command_is_honoured_while_sending() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("質問").await;
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);
    assert!(h.ctrl.is_capturing());

    h.say("ストップ").await;
    h.run_for(REMOTE_MS + SPEECH_MS).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.ctrl.log().messages()[1].text, "質問への回答");
    assert!(!h.spoken().iter().any(|s| s.contains("への回答")));
}

#[tokio::test(start_paused = true)]
async fn plain_query_is_refused_while_busy() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("一つ目").await;
    h.say("二つ目").await;
    assert_eq!(h.sent(), vec!["一つ目".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn wake_is_ignored_while_listening() {
    let mut h = Harness::new();
    h.listen().await;
    let session = h.session_id();
    h.say("起動").await;

    assert_eq!(h.ctrl.status(), AppStatus::Listening);
    assert_eq!(h.session_id(), session);
    assert!(h.sent().is_empty());
    assert_eq!(h.ctrl.marker(), Some(&Marker::Processed("起動".into())));
}

/// Wake replaced the session: fresh id, empty log, listening after the prompt.
async fn assert_woken(h: &mut Harness, before: Option<u64>) {
    assert_eq!(h.ctrl.status(), AppStatus::Speaking);
    assert_eq!(h.last_spoken(), Some(h.msgs.mic_on.clone()));
    assert!(h.session_id().is_some());
    assert_ne!(h.session_id(), before);
    assert!(h.ctrl.log().is_empty());

    h.run_for(SPEECH_MS + 300).await;
    assert_eq!(h.ctrl.status(), AppStatus::Listening);
    assert!(h.ctrl.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn wake_from_sleeping_starts_a_new_session() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("天気は？").await;
    h.run_for(REMOTE_MS + SPEECH_MS + 100).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(!h.ctrl.log().is_empty());
    let before = h.session_id();

    assert!(h.ctrl.run_phrase("起動"));
    h.run_for(10).await;
    assert_woken(&mut h, before).await;
}

#[tokio::test(start_paused = true)]
async fn wake_from_session_ended_starts_a_new_session() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("終了").await;
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::SessionEnded);
    assert!(h.session_id().is_none());

    assert!(h.ctrl.run_phrase("起動"));
    h.run_for(10).await;
    assert_woken(&mut h, None).await;
}

#[tokio::test(start_paused = true)]
async fn wake_from_error_starts_a_new_session() {
    let mut h = Harness::new();
    h.listen().await;
    h.mic.fail(NOT_ALLOWED);
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Error);
    let before = h.session_id();

    assert!(h.ctrl.run_phrase("起動"));
    h.run_for(10).await;
    assert_woken(&mut h, before).await;
}

#[tokio::test(start_paused = true)]
async fn wake_from_idle_starts_a_new_session() {
    let mut h = Harness::new();
    assert_eq!(h.ctrl.status(), AppStatus::Idle);
    let before = h.session_id();

    assert!(h.ctrl.run_phrase("起動"));
    h.run_for(10).await;
    assert_woken(&mut h, before).await;
}

#[tokio::test(start_paused = true)]
async fn wake_is_refused_while_sending() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("天気は？").await;
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);
    let before = h.session_id();
    let spoken = h.spoken().len();

    assert!(!h.ctrl.run_phrase("起動"));
    assert_eq!(h.ctrl.status(), AppStatus::SendingToRemote);
    assert_eq!(h.session_id(), before);
    assert_eq!(h.spoken().len(), spoken);

    // the request still completes into the same session
    h.run_for(REMOTE_MS + 50).await;
    assert_eq!(h.last_spoken().as_deref(), Some("天気は？への回答"));
    assert_eq!(h.ctrl.chat().session().unwrap().history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeat_replays_last_utterance_then_sleeps() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("もう一度").await;

    assert_eq!(h.ctrl.status(), AppStatus::Speaking);
    assert_eq!(h.spoken(), vec![h.msgs.mic_on.clone(), h.msgs.mic_on.clone()]);
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(h.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn processed_transcript_is_not_sent_twice() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("質問").await;

    // the recogniser wavering over the same words changes nothing
    h.mic.interim("質問");
    h.mic.phrase("質問");
    h.run_for(400).await;
    assert_eq!(h.sent(), vec!["質問".to_string()]);
    assert_eq!(h.ctrl.log().len(), 2);
}

// ---------------------------------------------------------------------------
// Capture failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silent_capture_stop_falls_asleep() {
    let mut h = Harness::new();
    h.listen().await;
    h.mic.fail(NO_SPEECH);
    h.run_for(10).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.spoken().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn microphone_failure_enters_error_and_survives_suspend() {
    let mut h = Harness::new();
    h.listen().await;
    h.mic.fail(NOT_ALLOWED);
    h.run_for(10).await;
    assert_eq!(h.ctrl.status(), AppStatus::Speaking);
    assert_eq!(h.last_spoken(), Some(h.msgs.microphone_error.clone()));

    h.run_for(SPEECH_MS).await;
    assert_eq!(h.ctrl.status(), AppStatus::Error);
    assert_eq!(h.ctrl.status_message(), h.msgs.microphone_error);

    h.ctrl.handle(ControllerEvent::Suspend);
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    h.ctrl.handle(ControllerEvent::Resume);
    assert_eq!(h.ctrl.status(), AppStatus::Error);

    // tap retries
    h.tap();
    h.run_for(SPEECH_MS + 300).await;
    assert_eq!(h.ctrl.status(), AppStatus::Listening);
}

// ---------------------------------------------------------------------------
// Suspend / resume / shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn suspend_stops_everything_and_resume_sleeps() {
    let mut h = Harness::new();
    h.listen().await;
    h.mic.interim("途中");

    h.ctrl.handle(ControllerEvent::Suspend);
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(!h.ctrl.is_capturing());
    assert!(h.ctrl.is_interrupted());

    h.tap();
    h.run_for(1000).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(h.sent().is_empty());

    h.ctrl.handle(ControllerEvent::Resume);
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert!(!h.ctrl.is_interrupted());
}

#[tokio::test(start_paused = true)]
async fn resume_keeps_session_ended() {
    let mut h = Harness::new();
    h.listen().await;
    h.say("さようなら").await;
    h.run_for(SPEECH_MS + 50).await;
    assert_eq!(h.ctrl.status(), AppStatus::SessionEnded);

    h.ctrl.handle(ControllerEvent::Suspend);
    h.ctrl.handle(ControllerEvent::Resume);
    assert_eq!(h.ctrl.status(), AppStatus::SessionEnded);
    assert_eq!(h.ctrl.status_message(), h.msgs.session_ended);
}

#[tokio::test(start_paused = true)]
async fn suspend_while_speaking_resumes_to_sleeping() {
    let mut h = Harness::new();
    h.tap();
    h.ctrl.handle(ControllerEvent::Suspend);
    assert!(!h.ctrl.is_speaking());
    h.run_for(500).await;
    h.ctrl.handle(ControllerEvent::Resume);
    h.run_for(500).await;
    assert_eq!(h.ctrl.status(), AppStatus::Sleeping);
    assert_eq!(h.mic.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_ends_session_and_stops_loop() {
    let mut h = Harness::new();
    h.listen().await;
    assert!(!h.ctrl.handle(ControllerEvent::Shutdown));
    assert!(h.session_id().is_none());
    assert!(!h.ctrl.is_capturing());
}
