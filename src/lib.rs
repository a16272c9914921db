//! Voice chat: speak to a hosted language model and hear the answer.
//!
//! One button drives everything.  Tapping it speaks a prompt and opens the
//! microphone; a finished phrase (or a second tap) goes to the remote model
//! and the reply is read aloud.  Spoken commands put the assistant to sleep,
//! end the conversation, wake it up or repeat the last answer, and they win
//! over whatever is currently happening.
//!
//! The [`controller`] module holds the interaction state machine; the other
//! modules are the adapters it drives.

pub mod app;
pub mod audio;
pub mod chat;
pub mod command;
pub mod config;
pub mod controller;
pub mod hotkey;
pub mod speech;
pub mod stt;
pub mod tts;
