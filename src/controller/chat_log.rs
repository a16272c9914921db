//! The visible chat transcript.

use chrono::{DateTime, Local};

use crate::chat::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Remote,
    System,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "ユーザー",
            Sender::Remote => "AI",
            Sender::System => "システム",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Local>,
    pub citations: Vec<Citation>,
    /// The remote reply for this entry has not arrived yet.
    pub generating: bool,
}

impl ChatMessage {
    /// `HH:MM` in local time.
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Append-only list with in-place update by id.  Ids are never reused, even
/// across [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ChatLog {
    pub fn push(&mut self, sender: Sender, text: impl Into<String>) -> u64 {
        self.push_entry(sender, text.into(), false)
    }

    /// A remote entry that is still being generated.
    pub fn push_placeholder(&mut self, text: impl Into<String>) -> u64 {
        self.push_entry(Sender::Remote, text.into(), true)
    }

    fn push_entry(&mut self, sender: Sender, text: String, generating: bool) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.messages.push(ChatMessage {
            id,
            sender,
            text,
            timestamp: Local::now(),
            citations: Vec::new(),
            generating,
        });
        id
    }

    /// Finish entry `id` with its final sender, text and citations, and
    /// refresh its timestamp.  Returns `false` when the entry is gone.
    pub fn resolve(
        &mut self,
        id: u64,
        sender: Sender,
        text: &str,
        citations: Vec<Citation>,
    ) -> bool {
        let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        msg.sender = sender;
        msg.text = text.to_string();
        msg.citations = citations;
        msg.generating = false;
        msg.timestamp = Local::now();
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
