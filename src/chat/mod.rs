//! Remote chat service.
//!
//! This module provides:
//! * [`ChatClient`]: async trait implemented by every backend.
//! * [`GeminiClient`]: Gemini `generateContent` with optional web grounding.
//! * [`OpenAiCompatibleClient`]: any `/v1/chat/completions` endpoint.
//! * [`RemoteChat`]: owner of the single live [`ChatSession`].
//! * [`ChatError`]: error variants for chat operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_chat::chat::{build_client, RemoteChat};
//! use voice_chat::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = build_client(&config.chat).expect("no API key");
//!
//!     let mut chat = RemoteChat::new(client, config.chat.web_grounding);
//!     let session = chat.start_session(&config.chat.system_instruction);
//!
//!     let reply = chat.send_message("今日のニュースは？").await.unwrap();
//!     chat.record_exchange(session, "今日のニュースは？", &reply.text);
//!     println!("{}", reply.text);
//! }
//! ```

pub mod client;
pub mod gemini;
pub mod openai;
pub mod session;

use std::sync::Arc;

use crate::config::{ChatConfig, ChatProvider};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ChatClient, ChatError, ChatReply, Citation};
pub use gemini::GeminiClient;
pub use openai::OpenAiCompatibleClient;
pub use session::{ChatSession, RemoteChat, Role, Turn};

/// Build the backend selected by `config`.
///
/// Fails with [`ChatError::NotConfigured`] when no credential can be found,
/// except for an OpenAI-compatible server on the local machine, which is
/// allowed to run keyless.
pub fn build_client(config: &ChatConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    build_client_with_key(config, config.resolved_api_key())
}

fn build_client_with_key(
    config: &ChatConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn ChatClient>, ChatError> {
    match (config.provider, api_key) {
        (ChatProvider::Gemini, Some(key)) => Ok(Arc::new(GeminiClient::from_config(config, key))),
        (ChatProvider::OpenAiCompatible, Some(key)) => Ok(Arc::new(
            OpenAiCompatibleClient::from_config(config, Some(key)),
        )),
        (ChatProvider::OpenAiCompatible, None) if is_local(&config.base_url) => {
            Ok(Arc::new(OpenAiCompatibleClient::from_config(config, None)))
        }
        (_, None) => Err(ChatError::NotConfigured(format!(
            "set chat.api_key or one of {}",
            config.key_env_vars().join(", ")
        ))),
    }
}

/// Loopback servers (`localhost`, `127.0.0.0/8`, `::1`) may run without a key.
fn is_local(base_url: &str) -> bool {
    // "localhost:1234" parses as a scheme, so retry with one
    let url = reqwest::Url::parse(base_url)
        .ok()
        .filter(reqwest::Url::has_host)
        .or_else(|| reqwest::Url::parse(&format!("http://{base_url}")).ok());
    let Some(host) = url.as_ref().and_then(reqwest::Url::host_str) else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_without_key_is_not_configured() {
        let cfg = ChatConfig::default();
        let err = build_client_with_key(&cfg, None).err().unwrap();
        assert!(matches!(err, ChatError::NotConfigured(ref m) if m.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn gemini_with_key_builds() {
        assert!(build_client_with_key(&ChatConfig::default(), Some("k".into())).is_ok());
    }

    #[test]
    fn local_openai_server_runs_keyless() {
        let cfg = ChatConfig {
            provider: ChatProvider::OpenAiCompatible,
            base_url: "http://localhost:11434".into(),
            ..ChatConfig::default()
        };
        assert!(build_client_with_key(&cfg, None).is_ok());
    }

    #[test]
    fn remote_openai_server_needs_key() {
        let cfg = ChatConfig {
            provider: ChatProvider::OpenAiCompatible,
            base_url: "https://api.openai.com".into(),
            ..ChatConfig::default()
        };
        assert!(build_client_with_key(&cfg, None).is_err());
        assert!(build_client_with_key(&cfg, Some("sk".into())).is_ok());
    }

    #[test]
    fn local_host_detection() {
        assert!(is_local("http://127.0.0.1:8080/"));
        assert!(is_local("localhost:1234"));
        assert!(is_local("http://LOCALHOST:11434/v1"));
        assert!(is_local("http://[::1]:8080"));
        assert!(is_local("http://127.0.0.2"));
        assert!(!is_local("https://example.com"));
        assert!(!is_local("http://localhost.example.com"));
        assert!(!is_local("http://localhost@evil.example:8080"));
        assert!(!is_local("not a url"));
    }
}
