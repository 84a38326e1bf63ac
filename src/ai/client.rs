//! HTTP client for the Gemini generateContent API.
//!
//! The rest of the crate depends only on the [`CompletionApi`] trait; this
//! module holds the production implementation plus the wire types. Responses
//! are reduced to a [`Completion`]: concatenated text, filtered grounding
//! citations, and a safety-block flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::types::{ChatRole, GroundingSource};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Transport timeout. Nothing above this layer enforces its own deadline, so
/// a hung request would otherwise stall its workflow indefinitely.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Placeholder uri substituted for citations with no link; filtered out
/// before the sources reach callers.
const PLACEHOLDER_URI: &str = "#";

// ============================================================================
// Request model
// ============================================================================

/// One piece of a turn: text, or an inline base64 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

/// One conversation turn in the service's multi-turn input format.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: ChatRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// A completion request: turns plus an optional web-grounding flag for
/// time-sensitive queries.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub grounding: bool,
}

impl CompletionRequest {
    /// Single-turn prompt without grounding.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(text)],
            grounding: false,
        }
    }

    /// Single-turn prompt with web grounding enabled.
    pub fn grounded(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user_text(text)],
            grounding: true,
        }
    }
}

/// The reduced response every intent works from.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    /// True when the service returned no text because of a safety block.
    pub safety_blocked: bool,
}

#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn generate(&self, request: CompletionRequest) -> Result<Completion, WorkflowError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: WireInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "googleSearch")]
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
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
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn reduce_response(response: GenerateContentResponse) -> Completion {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Completion::default();
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let sources = candidate
        .grounding_metadata
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .map(|web| GroundingSource {
                    uri: web.uri.unwrap_or_else(|| PLACEHOLDER_URI.to_string()),
                    title: web.title.unwrap_or_else(|| "Unknown Source".to_string()),
                })
                .filter(|source| source.uri != PLACEHOLDER_URI)
                .collect()
        })
        .unwrap_or_default();

    let safety_blocked =
        text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY");

    Completion {
        text,
        sources,
        safety_blocked,
    }
}

// ============================================================================
// Production client
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    fn build_payload(request: &CompletionRequest) -> GenerateContentRequest {
        let contents = request
            .turns
            .iter()
            .map(|turn| WireContent {
                role: turn.role.as_str(),
                parts: turn
                    .parts
                    .iter()
                    .map(|part| match part {
                        Part::Text(text) => WirePart::Text { text: text.clone() },
                        Part::InlineImage { mime_type, data } => WirePart::InlineData {
                            inline_data: WireInlineData {
                                mime_type: mime_type.clone(),
                                data: data.clone(),
                            },
                        },
                    })
                    .collect(),
            })
            .collect();

        let tools = request.grounding.then(|| {
            vec![WireTool {
                google_search: serde_json::json!({}),
            }]
        });

        GenerateContentRequest { contents, tools }
    }
}

#[async_trait]
impl CompletionApi for GeminiClient {
    async fn generate(&self, request: CompletionRequest) -> Result<Completion, WorkflowError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = Self::build_payload(&request);

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkflowError::Api("request timed out".to_string())
                } else {
                    WorkflowError::Api(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WorkflowError::Api(format!(
                "completion request failed with {}: {}",
                status, body
            )));
        }

        let response: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| WorkflowError::Api(format!("unreadable completion response: {}", e)))?;

        Ok(reduce_response(response))
    }
}
