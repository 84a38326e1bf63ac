//! AI gateway: one operation per completion intent.
//!
//! Every operation builds a deterministic prompt (`prompts`), invokes the
//! completion service through the [`CompletionApi`] trait (`client`), and
//! decodes the free-text answer with the response parser. Parser failures
//! surface as `MalformedResponse` carrying the operation name and the raw
//! text; an empty answer flagged as a safety block becomes
//! `ContentPolicyBlocked` instead.

pub mod client;
pub mod prompts;

use std::sync::Arc;
use std::sync::OnceLock;

use base64::Engine as _;
use chrono::NaiveDateTime;
use regex::Regex;

use crate::error::WorkflowError;
use crate::parser;
use crate::types::{
    Analysis, AttachmentKind, ChatMessage, Conversion, EmailDraft, FileAttachment, LookupOutcome,
    ZoneFacts,
};

pub use client::{Completion, CompletionApi, CompletionRequest, GeminiClient, Part, Turn};

/// Keys a successful timezone lookup must contain.
const LOOKUP_KEYS: [&str; 6] = ["Time", "Timezone", "Offset", "DST", "Location", "DST Info"];

fn data_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:([^;,]+);base64,(.+)$").expect("valid regex"))
}

#[derive(Clone)]
pub struct AiGateway {
    api: Arc<dyn CompletionApi>,
}

impl AiGateway {
    pub fn new(api: Arc<dyn CompletionApi>) -> Self {
        Self { api }
    }

    /// Run a request and enforce the non-empty-text contract shared by all
    /// intents.
    async fn complete(
        &self,
        operation: &'static str,
        request: CompletionRequest,
    ) -> Result<Completion, WorkflowError> {
        let completion = self.api.generate(request).await?;
        if completion.text.trim().is_empty() {
            if completion.safety_blocked {
                return Err(WorkflowError::ContentPolicyBlocked);
            }
            return Err(WorkflowError::MalformedResponse {
                operation,
                detail: "the AI returned an empty response".to_string(),
                raw: completion.text,
            });
        }
        Ok(completion)
    }

    /// Look up current time and zone facts for a location. Ambiguity is a
    /// distinct outcome, not an error.
    pub async fn timezone_lookup(&self, location: &str) -> Result<LookupOutcome, WorkflowError> {
        const OP: &str = "timezone lookup";
        let completion = self
            .complete(OP, CompletionRequest::grounded(prompts::timezone_lookup(location)))
            .await?;
        let text = completion.text.trim().to_string();

        if let Some(candidates) = parser::ambiguous_candidates(&text) {
            return Ok(LookupOutcome::Ambiguous(candidates));
        }

        let map = parser::key_value(&text);
        for key in LOOKUP_KEYS {
            if !map.contains_key(key) {
                return Err(WorkflowError::MalformedResponse {
                    operation: OP,
                    detail: format!("missing required key '{}'", key),
                    raw: text,
                });
            }
        }

        let initial_time = parse_local_time(&map["Time"]).ok_or_else(|| {
            WorkflowError::MalformedResponse {
                operation: OP,
                detail: format!("'{}' is not a local timestamp", map["Time"]),
                raw: text.clone(),
            }
        })?;

        Ok(LookupOutcome::Found(ZoneFacts {
            location: map["Location"].clone(),
            timezone: map["Timezone"].clone(),
            utc_offset: map["Offset"].clone(),
            is_dst: map["DST"].eq_ignore_ascii_case("true"),
            dst_info: map["DST Info"].clone(),
            initial_time,
            grounding_sources: completion.sources,
        }))
    }

    /// Convert an instant between two zones, with a prose explanation.
    pub async fn convert_time(
        &self,
        date_time: &str,
        from_zone: &str,
        to_zone: &str,
    ) -> Result<Conversion, WorkflowError> {
        const OP: &str = "time conversion";
        let completion = self
            .complete(
                OP,
                CompletionRequest::grounded(prompts::convert_time(date_time, from_zone, to_zone)),
            )
            .await?;

        let (converted_time, explanation) =
            parser::converted_time(&completion.text).map_err(|detail| {
                WorkflowError::MalformedResponse {
                    operation: OP,
                    detail,
                    raw: completion.text.clone(),
                }
            })?;

        Ok(Conversion {
            converted_time,
            explanation,
            grounding_sources: completion.sources,
        })
    }

    /// Milliseconds from now until the given local time in the given zone.
    pub async fn reminder_delay(
        &self,
        date_time: &str,
        zone: &str,
    ) -> Result<u64, WorkflowError> {
        const OP: &str = "reminder delay";
        let completion = self
            .complete(
                OP,
                CompletionRequest::grounded(prompts::reminder_delay(date_time, zone)),
            )
            .await?;

        parser::delay_ms(&completion.text).map_err(|detail| WorkflowError::MalformedResponse {
            operation: OP,
            detail,
            raw: completion.text.clone(),
        })
    }

    pub async fn compose_reminder_email(
        &self,
        message: &str,
        zone: &str,
    ) -> Result<EmailDraft, WorkflowError> {
        const OP: &str = "reminder email";
        let completion = self
            .complete(OP, CompletionRequest::prompt(prompts::reminder_email(message, zone)))
            .await?;
        draft_from(OP, &completion.text)
    }

    /// Summarize a document and judge its sentiment.
    pub async fn analyze_document(&self, content: &str) -> Result<Analysis, WorkflowError> {
        const OP: &str = "document analysis";
        let completion = self
            .complete(OP, CompletionRequest::prompt(prompts::analyze_document(content)))
            .await?;

        let (summary, sentiment) =
            parser::summary_sentiment(&completion.text).map_err(|detail| {
                WorkflowError::MalformedResponse {
                    operation: OP,
                    detail,
                    raw: completion.text.clone(),
                }
            })?;

        Ok(Analysis { summary, sentiment })
    }

    pub async fn compose_analysis_email(
        &self,
        summary: &str,
        sentiment: &str,
        filename: &str,
    ) -> Result<EmailDraft, WorkflowError> {
        const OP: &str = "analysis email";
        let completion = self
            .complete(
                OP,
                CompletionRequest::prompt(prompts::analysis_email(summary, sentiment, filename)),
            )
            .await?;
        draft_from(OP, &completion.text)
    }

    /// Free-form generation; the raw text is the result.
    pub async fn generate(&self, prompt: &str) -> Result<String, WorkflowError> {
        let completion = self
            .complete("content generation", CompletionRequest::prompt(prompt))
            .await?;
        Ok(completion.text)
    }

    /// One chat turn: the full prior conversation plus the new message, in
    /// the service's multi-turn format.
    ///
    /// Malformed image attachments in *history* are skipped with a warning —
    /// the user cannot fix them by retrying. A malformed image on the *new*
    /// message is an error, raised before the service is invoked.
    pub async fn chat(
        &self,
        history: &[ChatMessage],
        new_message: &ChatMessage,
    ) -> Result<String, WorkflowError> {
        let mut turns = Vec::with_capacity(history.len() + 1);
        for message in history {
            turns.push(lenient_turn(message));
        }
        turns.push(strict_turn(new_message)?);

        let completion = self
            .complete(
                "chat",
                CompletionRequest {
                    turns,
                    grounding: false,
                },
            )
            .await?;
        Ok(completion.text)
    }
}

fn draft_from(operation: &'static str, text: &str) -> Result<EmailDraft, WorkflowError> {
    let (subject, html_body) =
        parser::subject_body(text).map_err(|detail| WorkflowError::MalformedResponse {
            operation,
            detail,
            raw: text.to_string(),
        })?;
    Ok(EmailDraft { subject, html_body })
}

/// Accept "YYYY-MM-DDTHH:mm:ss", tolerating a missing seconds field.
fn parse_local_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Decode an image attachment's data URL into an inline part.
pub fn image_part(attachment: &FileAttachment) -> Result<Part, String> {
    let captures = data_url_re()
        .captures(attachment.content.trim())
        .ok_or_else(|| "invalid data URL. Could not extract mime type and data".to_string())?;

    let mime_type = captures[1].to_string();
    let data = captures[2].to_string();

    base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| format!("invalid base64 image payload: {}", e))?;

    Ok(Part::InlineImage { mime_type, data })
}

/// Reject an unusable new-message attachment before any transcript or
/// service side effect happens.
pub fn validate_attachment(attachment: &FileAttachment) -> Result<(), WorkflowError> {
    match attachment.kind {
        AttachmentKind::Text => Ok(()),
        AttachmentKind::Image => image_part(attachment).map(|_| ()).map_err(|_| {
            WorkflowError::Validation(
                "there was an issue processing the image. Please try another one".to_string(),
            )
        }),
    }
}

/// Message text with any text attachment inlined under a provenance marker.
fn message_text(message: &ChatMessage) -> String {
    let mut text = message.text.clone();
    if let Some(attachment) = &message.attachment {
        if attachment.kind == AttachmentKind::Text {
            text.push_str(&prompts::attachment_marker(&attachment.name));
            text.push_str(&attachment.content);
        }
    }
    text
}

/// Turn for a history message: a broken image is dropped, not fatal.
fn lenient_turn(message: &ChatMessage) -> Turn {
    let mut parts = vec![Part::Text(message_text(message))];
    if let Some(attachment) = &message.attachment {
        if attachment.kind == AttachmentKind::Image {
            match image_part(attachment) {
                Ok(part) => parts.push(part),
                Err(e) => {
                    log::warn!("Skipping invalid image attachment from history: {}", e);
                }
            }
        }
    }
    Turn {
        role: message.role,
        parts,
    }
}

/// Turn for the message being sent now: a broken image aborts the turn.
fn strict_turn(message: &ChatMessage) -> Result<Turn, WorkflowError> {
    let mut parts = vec![Part::Text(message_text(message))];
    if let Some(attachment) = &message.attachment {
        if attachment.kind == AttachmentKind::Image {
            validate_attachment(attachment)?;
            if let Ok(part) = image_part(attachment) {
                parts.push(part);
            }
        }
    }
    Ok(Turn {
        role: message.role,
        parts,
    })
}
