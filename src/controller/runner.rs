//! Interaction controller: the event loop behind the single button.
//!
//! [`InteractionController`] owns the status, both speech adapters, the
//! remote session and the chat log.  Every outside happening arrives as a
//! [`ControllerEvent`] and is handled to completion before the next one, so
//! decisions always read the current status directly.
//!
//! # Interaction flow
//!
//! ```text
//! Tap (Idle/Sleeping/…) ─▶ speak "mic on" ─▶ Listening ─150 ms─▶ capture starts
//! transcript update ─300 ms debounce─▶ CommandInterpreter
//!        ├─ sleep / end / wake / repeat ─▶ command transition
//!        └─ finished phrase            ─▶ query
//! Tap (Listening) ─▶ query
//! query ─▶ SendingToRemote ─▶ RemoteChat ─▶ speak reply ─▶ Sleeping
//! ```
//!
//! Timers and remote requests run as spawned tasks that post back into the
//! queue.  Each carries a generation or request id, and stale ones are
//! dropped on arrival.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::chat::{ChatError, ChatReply, RemoteChat};
use crate::command::{Command, CommandInterpreter};
use crate::config::{AppConfig, Messages};
use crate::speech::{Observation, SpeechCapture, SpeechOutput};
use crate::stt::{RecognitionEngine, RecognitionEvent, RecognitionSink};
use crate::tts::SpeechSynthesizer;

use super::chat_log::{ChatLog, Sender};
use super::event::{ControllerEvent, EventReceiver, EventSender};
use super::state::{AppStatus, SharedState};
use super::transcript::{InterruptFlag, Interruption, Marker, TranscriptRecord};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Take the timer in `slot` if it is the one that fired.
fn fired(slot: &mut Option<Timer>, generation: u64) -> bool {
    if slot.as_ref().is_some_and(|t| t.generation == generation) {
        *slot = None;
        true
    } else {
        false
    }
}

fn cancel(slot: &mut Option<Timer>) {
    if let Some(timer) = slot.take() {
        timer.task.abort();
    }
}

/// Where to go once utterance `utterance` has been spoken.
struct AfterSpeech {
    utterance: u64,
    status: AppStatus,
    message: String,
}

/// What was showing when the application went to the background.
struct Suspended {
    status: AppStatus,
    message: String,
    keep_error: bool,
}

/// The three collaborators the controller drives.
pub struct Adapters {
    pub recognizer: Box<dyn RecognitionEngine>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub chat: RemoteChat,
}

// ---------------------------------------------------------------------------
// InteractionController
// ---------------------------------------------------------------------------

pub struct InteractionController {
    shared: SharedState,
    events: EventSender,

    capture: SpeechCapture,
    output: SpeechOutput,
    chat: RemoteChat,
    commands: CommandInterpreter,

    messages: Messages,
    system_instruction: String,
    debounce_delay: Duration,
    restart_delay: Duration,
    device_error_patterns: Vec<String>,

    status: AppStatus,
    status_message: String,
    fatal: Option<String>,
    log: ChatLog,
    record: TranscriptRecord,
    interrupt: InterruptFlag,
    last_spoken: Option<String>,

    utterance: u64,
    after_speech: Option<AfterSpeech>,
    timer_generation: u64,
    debounce: Option<Timer>,
    restart: Option<Timer>,
    request: u64,

    /// The current `Error` status comes from a microphone failure.
    mic_error: bool,
    suspended: Option<Suspended>,
}

impl InteractionController {
    /// Build a controller posting its own timer, speech and remote events to
    /// `events`.  Recogniser output is routed there too.
    pub fn new(
        config: &AppConfig,
        adapters: Adapters,
        shared: SharedState,
        events: EventSender,
    ) -> Self {
        let tx = events.clone();
        let sink: RecognitionSink = Arc::new(move |ev: RecognitionEvent| {
            let _ = tx.send(ControllerEvent::Recognition(ev));
        });

        Self {
            shared,
            events,
            capture: SpeechCapture::new(adapters.recognizer, sink),
            output: SpeechOutput::new(adapters.synthesizer, &config.tts),
            chat: adapters.chat,
            commands: CommandInterpreter::new(&config.commands),
            messages: config.messages.clone(),
            system_instruction: config.chat.system_instruction.clone(),
            debounce_delay: Duration::from_millis(config.interaction.debounce_ms),
            restart_delay: Duration::from_millis(config.interaction.capture_restart_delay_ms),
            device_error_patterns: config
                .interaction
                .device_error_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            status: AppStatus::BootingSpeech,
            status_message: config.messages.booting.clone(),
            fatal: None,
            log: ChatLog::default(),
            record: TranscriptRecord::default(),
            interrupt: InterruptFlag::default(),
            last_spoken: None,
            utterance: 0,
            after_speech: None,
            timer_generation: 0,
            debounce: None,
            restart: None,
            request: 0,
            mic_error: false,
            suspended: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Boot, then handle events until [`ControllerEvent::Shutdown`].
    pub async fn run(mut self, mut events: EventReceiver) {
        self.boot();
        while let Some(event) = events.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        log::info!("controller: event loop finished");
    }

    /// Capability check and first session.
    pub fn boot(&mut self) {
        if !self.capture.is_supported() || !self.output.is_supported() {
            log::error!(
                "controller: speech unavailable (capture: {}, output: {})",
                self.capture.is_supported(),
                self.output.is_supported()
            );
            let notice = self.messages.speech_unsupported.clone();
            self.fatal = Some(notice.clone());
            self.set_status(AppStatus::Error, notice);
        } else {
            self.chat.start_session(&self.system_instruction);
            self.record.reset();
            self.set_status(AppStatus::Idle, self.messages.welcome.clone());
        }
        self.publish();
    }

    /// Handle one event.  Returns `false` once the controller has shut down.
    pub fn handle(&mut self, event: ControllerEvent) -> bool {
        let running = match event {
            ControllerEvent::Tap => {
                self.on_tap();
                true
            }
            ControllerEvent::Recognition(ev) => {
                self.on_recognition(ev);
                true
            }
            ControllerEvent::SpeechFinished { utterance } => {
                self.on_speech_finished(utterance);
                true
            }
            ControllerEvent::DebounceElapsed { generation } => {
                if fired(&mut self.debounce, generation) {
                    self.on_debounce_elapsed();
                }
                true
            }
            ControllerEvent::RestartCapture { generation } => {
                if fired(&mut self.restart, generation) {
                    self.on_restart_capture();
                }
                true
            }
            ControllerEvent::RemoteSettled {
                request,
                session_id,
                user_text,
                placeholder,
                result,
            } => {
                self.on_remote_settled(request, session_id, &user_text, placeholder, result);
                true
            }
            ControllerEvent::Suspend => {
                self.on_suspend();
                true
            }
            ControllerEvent::Resume => {
                self.on_resume();
                true
            }
            ControllerEvent::Shutdown => {
                self.shutdown();
                false
            }
        };

        if running {
            self.settle();
        }
        self.publish();
        running
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.record.marker()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_raised()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_listening()
    }

    pub fn is_speaking(&self) -> bool {
        self.output.is_speaking()
    }

    pub fn chat(&self) -> &RemoteChat {
        &self.chat
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn on_tap(&mut self) {
        if self.fatal.is_some() || self.suspended.is_some() {
            log::debug!("controller: tap ignored in {}", self.status);
            return;
        }

        if self.output.is_speaking() || self.status == AppStatus::Speaking {
            self.interrupt.raise();
            self.output.cancel();
            self.halt();
            self.record.interrupt(Interruption::Tap);
            self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
            return;
        }

        match self.status {
            AppStatus::Listening => {
                let text = self.capture.transcript().trim().to_string();
                self.record.set_pending_final(&text);
                self.halt();
                if text.is_empty() {
                    self.record.set_marker(Marker::EmptyTap);
                    self.record.set_pending_final("");
                    self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
                } else {
                    self.record.set_marker(Marker::Processed(text.clone()));
                    self.handle_user_query(&text);
                }
            }
            AppStatus::Sleeping => self.start_interaction(false),
            AppStatus::Idle
            | AppStatus::SessionEnded
            | AppStatus::Error
            | AppStatus::BootingSpeech => self.start_interaction(true),
            AppStatus::SendingToRemote | AppStatus::ProcessingCommand => {
                self.halt();
                self.interrupt.raise();
                self.record.interrupt(Interruption::BusyTap);
                self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
            }
            AppStatus::Speaking => {}
        }
    }

    fn on_recognition(&mut self, event: RecognitionEvent) {
        match self.capture.apply(event) {
            Some(Observation::Transcript(text)) => self.on_transcript(&text),
            Some(Observation::Error(message)) => self.on_capture_error(&message),
            Some(Observation::Ended) | None => {}
        }
    }

    fn on_transcript(&mut self, text: &str) {
        if self.status == AppStatus::Speaking && self.interrupt.is_raised() {
            return;
        }
        if text.is_empty() || self.record.is_processed(text) {
            return;
        }
        cancel(&mut self.debounce);
        self.debounce = Some(self.schedule(self.debounce_delay, |generation| {
            ControllerEvent::DebounceElapsed { generation }
        }));
    }

    fn on_debounce_elapsed(&mut self) {
        if self.status == AppStatus::Speaking && self.interrupt.is_raised() {
            return;
        }
        let current = self.capture.transcript().to_string();
        if current.trim().is_empty() || self.record.is_processed(&current) {
            return;
        }

        let command = self.commands.classify(&current);
        if command == Command::None
            && self.status == AppStatus::Listening
            && !self.capture.is_final()
        {
            // interim hypothesis; the finished phrase reschedules
            return;
        }

        let handled = self.execute(command, &current);
        if !handled || !self.commands.mentions_lifecycle(&current) {
            self.record.set_marker(Marker::Processed(current));
        }
    }

    /// Classify `text` and act on it as a finished phrase, without going
    /// through the microphone.
    #[cfg(test)]
    pub(crate) fn run_phrase(&mut self, text: &str) -> bool {
        let command = self.commands.classify(text);
        self.execute(command, text)
    }

    /// Run `command` if the current status allows it.
    fn execute(&mut self, command: Command, text: &str) -> bool {
        log::debug!("controller: {command:?} in {}", self.status);
        match command {
            Command::Sleep => {
                self.sleep_command();
                true
            }
            Command::EndSession => {
                self.end_command();
                true
            }
            _ if self.status.is_busy() => false,
            Command::Wake if self.status.accepts_wake() && self.fatal.is_none() => {
                self.start_interaction(true);
                true
            }
            Command::Repeat if self.status.accepts_repeat() => {
                self.repeat_command();
                true
            }
            Command::None if self.status == AppStatus::Listening => {
                self.handle_user_query(text);
                true
            }
            _ => false,
        }
    }

    fn on_speech_finished(&mut self, utterance: u64) {
        if !self
            .after_speech
            .as_ref()
            .is_some_and(|a| a.utterance == utterance)
        {
            return;
        }
        let Some(after) = self.after_speech.take() else {
            return;
        };
        if self.interrupt.is_raised() {
            self.capture.stop_listening();
            return;
        }

        self.set_status(after.status, after.message);
        if after.status == AppStatus::Listening {
            if self.capture.is_supported() && !self.capture.is_listening() {
                cancel(&mut self.restart);
                self.restart = Some(self.schedule(self.restart_delay, |generation| {
                    ControllerEvent::RestartCapture { generation }
                }));
            }
        } else {
            self.capture.stop_listening();
        }
    }

    fn on_restart_capture(&mut self) {
        if self.status != AppStatus::Listening || self.capture.is_listening() {
            return;
        }
        self.capture.start_listening();
        if !self.capture.is_listening() {
            if let Some(message) = self.capture.error().map(str::to_string) {
                self.on_capture_error(&message);
            }
        }
    }

    fn on_capture_error(&mut self, message: &str) {
        let lower = message.to_lowercase();
        if !self.device_error_patterns.iter().any(|p| lower.contains(p.as_str())) {
            log::debug!("controller: capture reported {message:?}");
            return;
        }
        log::error!("controller: microphone failure: {message}");
        if self.fatal.is_some() {
            return;
        }
        self.mic_error = true;
        let notice = self.messages.microphone_error.clone();
        self.speak_then(notice.clone(), AppStatus::Error, notice);
    }

    fn on_remote_settled(
        &mut self,
        request: u64,
        session_id: Option<u64>,
        user_text: &str,
        placeholder: u64,
        result: Result<ChatReply, ChatError>,
    ) {
        let spoken = match result {
            Err(e) => {
                log::warn!("controller: remote request {request} failed: {e}");
                let notice = self.messages.remote_error.clone();
                self.log
                    .resolve(placeholder, Sender::System, &notice, Vec::new());
                notice
            }
            Ok(reply) if reply.text.trim().is_empty() => {
                log::warn!("controller: remote request {request} returned no text");
                self.log.resolve(
                    placeholder,
                    Sender::System,
                    &self.messages.empty_response,
                    reply.citations,
                );
                self.messages.no_response.clone()
            }
            Ok(reply) => {
                let text = reply.text.trim().to_string();
                if let Some(id) = session_id {
                    self.chat.record_exchange(id, user_text, &text);
                }
                self.log
                    .resolve(placeholder, Sender::Remote, &text, reply.citations);
                text
            }
        };

        let current = request == self.request
            && self.status == AppStatus::SendingToRemote
            && !self.interrupt.is_raised();
        if current {
            self.speak_then(spoken, AppStatus::Sleeping, self.messages.sleeping.clone());
        } else {
            log::debug!("controller: reply to request {request} not spoken");
        }
    }

    fn on_suspend(&mut self) {
        if self.suspended.is_some() {
            return;
        }
        log::info!("controller: suspended in {}", self.status);
        self.suspended = Some(Suspended {
            status: self.status,
            message: self.status_message.clone(),
            keep_error: self.fatal.is_some() || self.mic_error,
        });
        self.interrupt.raise();
        self.halt();
        self.output.cancel();
        if self.fatal.is_none() {
            self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
        }
    }

    fn on_resume(&mut self) {
        let Some(prior) = self.suspended.take() else {
            return;
        };
        log::info!("controller: resumed (was {})", prior.status);
        self.interrupt.clear();
        match prior.status {
            AppStatus::Error if prior.keep_error => {
                self.set_status(AppStatus::Error, prior.message);
            }
            AppStatus::Error => {
                self.mic_error = false;
                self.set_status(AppStatus::Idle, self.messages.welcome.clone());
            }
            AppStatus::SessionEnded => {
                self.set_status(AppStatus::SessionEnded, self.messages.session_ended.clone());
            }
            _ => self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone()),
        }
    }

    fn shutdown(&mut self) {
        log::info!("controller: shutting down");
        self.interrupt.raise();
        self.halt();
        self.output.cancel();
        self.chat.end_session();
    }

    /// Listening that quietly lost its capture falls asleep.
    fn settle(&mut self) {
        let stalled = self.status == AppStatus::Listening
            && !self.capture.is_listening()
            && !self.output.is_speaking()
            && self.restart.is_none()
            && self.debounce.is_none()
            && self.record.pending_final().is_empty()
            && !self.interrupt.is_raised()
            && !self.record.is_interruption();
        if stalled {
            log::debug!("controller: capture stopped while listening");
            self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Speak the mic-on prompt and listen afterwards.  `new_session` replaces
    /// the session and clears the log; otherwise a session is only created
    /// when none is live.
    fn start_interaction(&mut self, new_session: bool) {
        self.record.reset();
        self.interrupt.clear();
        self.mic_error = false;
        if new_session {
            self.chat.start_session(&self.system_instruction);
            self.log.clear();
        } else if !self.chat.is_active() {
            self.chat.start_session(&self.system_instruction);
        }
        let prompt = self.messages.mic_on.clone();
        self.speak_then(prompt.clone(), AppStatus::Listening, prompt);
    }

    fn sleep_command(&mut self) {
        let was_speaking = self.cancel_speech();
        self.halt();
        self.record.interrupt(Interruption::SleepCommand);
        self.set_status(AppStatus::Sleeping, self.messages.sleeping.clone());
        if !was_speaking {
            self.speak_then(
                self.messages.sleep_confirmation.clone(),
                AppStatus::Sleeping,
                self.messages.sleeping.clone(),
            );
        }
    }

    fn end_command(&mut self) {
        let was_speaking = self.cancel_speech();
        self.halt();
        self.chat.end_session();
        self.record.interrupt(Interruption::EndCommand);
        self.log.clear();
        let notice = self.messages.session_ended.clone();
        self.set_status(AppStatus::SessionEnded, notice.clone());
        if !was_speaking {
            self.speak_then(notice.clone(), AppStatus::SessionEnded, notice);
        }
    }

    fn repeat_command(&mut self) {
        self.cancel_speech();
        let text = self
            .last_spoken
            .clone()
            .unwrap_or_else(|| self.messages.nothing_to_repeat.clone());
        self.speak_then(text, AppStatus::Sleeping, self.messages.sleeping.clone());
    }

    fn handle_user_query(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        log::debug!("controller: query {query:?}");

        self.log.push(Sender::User, query);
        self.set_status(AppStatus::SendingToRemote, self.messages.processing.clone());
        let placeholder = self.log.push_placeholder(self.messages.generating.clone());

        self.request += 1;
        let request = self.request;
        let session_id = self.chat.session().map(|s| s.id);
        let reply = self.chat.send_message(query);
        let user_text = query.to_string();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = reply.await;
            let _ = tx.send(ControllerEvent::RemoteSettled {
                request,
                session_id,
                user_text,
                placeholder,
                result,
            });
        });
    }

    /// Speak `text`, then move to `next` with `message`; an empty `text`
    /// moves immediately.  Capture is stopped while speaking.
    fn speak_then(&mut self, text: String, next: AppStatus, message: String) {
        self.interrupt.clear();
        self.capture.stop_listening();
        cancel(&mut self.restart);

        let text = text.trim().to_string();
        self.utterance += 1;
        let utterance = self.utterance;
        self.after_speech = Some(AfterSpeech {
            utterance,
            status: next,
            message,
        });

        if text.is_empty() {
            self.on_speech_finished(utterance);
            return;
        }

        self.last_spoken = Some(text.clone());
        self.set_status(AppStatus::Speaking, self.messages.speaking.clone());
        let tx = self.events.clone();
        self.output.speak(&text, move || {
            let _ = tx.send(ControllerEvent::SpeechFinished { utterance });
        });
    }

    /// Interrupt whatever is being spoken.  Returns whether anything was.
    fn cancel_speech(&mut self) -> bool {
        let speaking = self.output.is_speaking() || self.status == AppStatus::Speaking;
        if speaking {
            self.interrupt.raise();
            self.output.cancel();
        }
        speaking
    }

    /// Stop capture and both timers.
    fn halt(&mut self) {
        cancel(&mut self.debounce);
        cancel(&mut self.restart);
        self.capture.stop_listening();
    }

    fn schedule(&mut self, delay: Duration, event: fn(u64) -> ControllerEvent) -> Timer {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event(generation));
        });
        Timer { generation, task }
    }

    fn set_status(&mut self, status: AppStatus, message: String) {
        if self.status != status {
            log::debug!("controller: {} → {}", self.status, status);
        }
        self.status = status;
        self.status_message = message;
    }

    fn publish(&self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = shared.status != self.status
            || shared.status_message != self.status_message
            || shared.fatal != self.fatal
            || shared.messages.as_slice() != self.log.messages();
        if changed {
            shared.status = self.status;
            shared.status_message = self.status_message.clone();
            shared.fatal = self.fatal.clone();
            shared.messages = self.log.messages().to_vec();
            shared.revision += 1;
        }
    }
}
