//! Conversation sessions and the single-session owner, [`RemoteChat`].
//!
//! At most one [`ChatSession`] is live at a time.  Starting a session
//! replaces the previous one; ending it drops all history.  Requests work on
//! a snapshot of the session, and a reply is recorded only into the session
//! that issued it, so a reply that resolves after the session was replaced
//! never leaks into the new conversation.

use std::future::Future;
use std::sync::Arc;

use super::client::{ChatClient, ChatError, ChatReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// A live remote conversation: identity, fixed instruction, and the turns
/// exchanged so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: u64,
    pub system_instruction: String,
    pub history: Vec<Turn>,
}

/// Owns the (optional) current session and the client that serves it.
pub struct RemoteChat {
    client: Arc<dyn ChatClient>,
    session: Option<ChatSession>,
    next_id: u64,
    web_grounding: bool,
}

impl RemoteChat {
    pub fn new(client: Arc<dyn ChatClient>, web_grounding: bool) -> Self {
        Self {
            client,
            session: None,
            next_id: 1,
            web_grounding,
        }
    }

    /// Replace any existing session.  Returns the new session id.
    pub fn start_session(&mut self, system_instruction: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.session = Some(ChatSession {
            id,
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        });
        log::info!("chat: session {id} started");
        id
    }

    pub fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("chat: session {} ended", session.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    /// Send `text` within the current session.
    ///
    /// The returned future owns everything it needs, so it can be spawned.
    /// It fails with [`ChatError::NoSession`] when no session is live.
    pub fn send_message(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<ChatReply, ChatError>> + Send + 'static {
        let client = Arc::clone(&self.client);
        let session = self.session.clone();
        let text = text.to_string();
        let grounding = self.web_grounding;
        async move {
            let session = session.ok_or(ChatError::NoSession)?;
            client.send_message(&session, &text, grounding).await
        }
    }

    /// Append a completed exchange to session `session_id`, if that session
    /// is still the live one.  Blank replies are not recorded.
    pub fn record_exchange(&mut self, session_id: u64, user: &str, reply: &str) {
        let Some(session) = self.session.as_mut().filter(|s| s.id == session_id) else {
            log::debug!("chat: dropping reply for stale session {session_id}");
            return;
        };
        if reply.trim().is_empty() {
            return;
        }
        session.history.push(Turn {
            role: Role::User,
            text: user.to_string(),
        });
        session.history.push(Turn {
            role: Role::Model,
            text: reply.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the text and remembers the history length it was sent with.
    #[derive(Default)]
    struct EchoClient {
        seen_history: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn send_message(
            &self,
            session: &ChatSession,
            text: &str,
            _web_grounding: bool,
        ) -> Result<ChatReply, ChatError> {
            self.seen_history.lock().unwrap().push(session.history.len());
            Ok(ChatReply {
                text: format!("echo: {text}"),
                citations: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn send_without_session_fails() {
        let chat = RemoteChat::new(Arc::new(EchoClient::default()), true);
        let err = chat.send_message("こんにちは").await.unwrap_err();
        assert!(matches!(err, ChatError::NoSession));
    }

    #[tokio::test]
    async fn exchanges_build_history() {
        let client = Arc::new(EchoClient::default());
        let mut chat = RemoteChat::new(client.clone(), true);
        let id = chat.start_session("instruction");

        let reply = chat.send_message("一").await.unwrap();
        chat.record_exchange(id, "一", &reply.text);
        chat.send_message("二").await.unwrap();

        assert_eq!(*client.seen_history.lock().unwrap(), vec![0, 2]);
        assert_eq!(chat.session().unwrap().history[1].text, "echo: 一");
    }

    #[test]
    fn start_replaces_and_end_clears() {
        let mut chat = RemoteChat::new(Arc::new(EchoClient::default()), false);
        let first = chat.start_session("a");
        chat.record_exchange(first, "q", "r");
        let second = chat.start_session("b");
        assert_ne!(first, second);
        assert!(chat.session().unwrap().history.is_empty());

        chat.end_session();
        assert!(!chat.is_active());
        assert!(chat.session().is_none());
    }

    #[test]
    fn stale_or_blank_replies_are_not_recorded() {
        let mut chat = RemoteChat::new(Arc::new(EchoClient::default()), false);
        let old = chat.start_session("a");
        let current = chat.start_session("a");
        chat.record_exchange(old, "q", "r");
        chat.record_exchange(current, "q", "   ");
        assert!(chat.session().unwrap().history.is_empty());
    }
}
