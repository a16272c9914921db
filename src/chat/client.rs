//! `ChatClient` trait, reply types and `ChatError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::ChatSession;

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Every way a remote call can fail.  The controller treats all of them the
/// same; the variants exist for logs and tests.
#[derive(Debug, Error)]
pub enum ChatError {
    /// `send_message` was called with no live session.
    #[error("chat session is not active")]
    NoSession,

    /// No credential (or endpoint) is configured for the selected provider.
    #[error("chat service is not configured: {0}")]
    NotConfigured(String),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("chat request timed out")]
    Timeout,

    /// The response body was not the JSON shape expected.
    #[error("failed to parse chat response: {0}")]
    Parse(String),

    /// The service answered with a non-success HTTP status.
    #[error("chat service returned {code}: {body}")]
    Status { code: u16, body: String },
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else {
            ChatError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Reply types
// ---------------------------------------------------------------------------

/// A web source the reply was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

impl Citation {
    /// Title when present, otherwise the URI.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.uri)
    }
}

/// The complete reply to one message.  `text` may be empty; that is a valid
/// answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub citations: Vec<Citation>,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// One request/response exchange with a hosted model.
///
/// Implementors send `session`'s system instruction and history along with
/// `text`.  No retries, no streaming: the future resolves once, with the
/// full reply.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(
        &self,
        session: &ChatSession,
        text: &str,
        web_grounding: bool,
    ) -> Result<ChatReply, ChatError>;
}

/// Read a non-success response into [`ChatError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> ChatError {
    let code = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error body".to_string());
    ChatError::Status { code, body }
}

/// Shared HTTP client with the configured per-request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
