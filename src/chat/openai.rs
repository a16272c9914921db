//! OpenAI-compatible `/v1/chat/completions` backend.
//!
//! Works with OpenAI, Groq, Ollama (OpenAI mode), LM Studio, vLLM, or any
//! provider speaking the chat-completions wire format.  These endpoints have
//! no web grounding, so replies never carry citations.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::{http_client, status_error, ChatClient, ChatError, ChatReply};
use super::session::{ChatSession, Role};
use crate::config::ChatConfig;

pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &ChatConfig, api_key: Option<String>) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        }
    }

    fn body(&self, session: &ChatSession, text: &str) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": session.system_instruction })];
        messages.extend(session.history.iter().map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Model => "assistant",
            };
            json!({ "role": role, "content": turn.text })
        }));
        messages.push(json!({ "role": "user", "content": text }));

        json!({
            "model":       self.model,
            "messages":    messages,
            "stream":      false,
            "temperature": self.temperature
        })
    }
}

/// `choices[0].message.content`; a null or missing content is an empty reply.
fn parse_response(json: &Value) -> Result<ChatReply, ChatError> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| ChatError::Parse("response has no choices[0].message".into()))?;
    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(ChatReply {
        text,
        citations: Vec::new(),
    })
}

#[async_trait]
impl ChatClient for OpenAiCompatibleClient {
    /// The `Authorization: Bearer …` header is attached only when a
    /// non-empty key is configured, so keyless local servers work.
    async fn send_message(
        &self,
        session: &ChatSession,
        text: &str,
        _web_grounding: bool,
    ) -> Result<ChatReply, ChatError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&self.body(session, text));

        let key = self.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;
        parse_response(&json)
    }
}
