//! Google Gemini `generateContent` backend.
//!
//! The session history is replayed as `contents` on every call, with the
//! system instruction in `systemInstruction`.  When web grounding is on, the
//! `google_search` tool is attached and citations are read from
//! `candidates[].groundingMetadata.groundingChunks[].web`.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{http_client, status_error, ChatClient, ChatError, ChatReply, Citation};
use super::session::{ChatSession, Role};
use crate::config::ChatConfig;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Default)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize, Default)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

fn text_part(text: &str) -> Vec<Part> {
    vec![Part {
        text: text.to_string(),
    }]
}

fn build_request(
    session: &ChatSession,
    text: &str,
    web_grounding: bool,
    temperature: f32,
) -> GenerateContentRequest {
    let mut contents: Vec<Content> = session
        .history
        .iter()
        .map(|turn| Content {
            role: match turn.role {
                Role::User => "user",
                Role::Model => "model",
            },
            parts: text_part(&turn.text),
        })
        .collect();
    contents.push(Content {
        role: "user",
        parts: text_part(text),
    });

    GenerateContentRequest {
        contents,
        system_instruction: SystemInstruction {
            parts: text_part(&session.system_instruction),
        },
        tools: if web_grounding {
            vec![Tool::default()]
        } else {
            Vec::new()
        },
        generation_config: GenerationConfig { temperature },
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

/// Extract reply text and de-duplicated citations from a `generateContent`
/// response body.  A response with no candidate text is an empty reply.
fn parse_response(body: &str) -> Result<ChatReply, ChatError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Parse(e.to_string()))?;
    let candidates = response.candidates.unwrap_or_default();

    let text: String = candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let citations = candidates
        .into_iter()
        .filter_map(|c| c.grounding_metadata)
        .flat_map(|m| m.grounding_chunks)
        .filter_map(|chunk| chunk.web)
        .filter_map(|web| {
            let uri = web.uri.filter(|u| !u.is_empty())?;
            if !seen.insert(uri.clone()) {
                return None;
            }
            Some(Citation {
                uri,
                title: web.title.filter(|t| !t.is_empty()),
            })
        })
        .collect();

    Ok(ChatReply {
        text: text.trim().to_string(),
        citations,
    })
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn from_config(config: &ChatConfig, api_key: String) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    async fn send_message(
        &self,
        session: &ChatSession,
        text: &str,
        web_grounding: bool,
    ) -> Result<ChatReply, ChatError> {
        let body = build_request(session, text, web_grounding, self.temperature);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;
        parse_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
