//! Core data model shared across the orchestration layer.
//!
//! Everything here is a plain value type: the orchestrator owns the canonical
//! in-memory copies, the persistence store and any UI layer only ever see
//! clones. Serde derives use camelCase so records serialize the way a
//! frontend expects them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A web citation returned by the AI service when search grounding was used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// The parsed result of a successful timezone lookup, before an id is
/// assigned. This is the unit the cache layer stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneFacts {
    /// Corrected or more specific display name (e.g. "Tokyo, Japan").
    pub location: String,
    /// IANA timezone identifier (e.g. "Asia/Tokyo").
    pub timezone: String,
    /// Current UTC offset as reported, e.g. "+09:00".
    pub utc_offset: String,
    pub is_dst: bool,
    /// Free-text note about the next DST change.
    pub dst_info: String,
    /// Local wall-clock time in the zone at lookup time.
    pub initial_time: NaiveDateTime,
    pub grounding_sources: Vec<GroundingSource>,
}

/// A timezone card: immutable once created, except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneCard {
    pub id: String,
    pub location: String,
    pub timezone: String,
    pub utc_offset: String,
    pub is_dst: bool,
    pub dst_info: String,
    pub initial_time: NaiveDateTime,
    pub grounding_sources: Vec<GroundingSource>,
}

impl TimezoneCard {
    /// Mint a new card from lookup facts.
    pub fn from_facts(facts: ZoneFacts) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            location: facts.location,
            timezone: facts.timezone,
            utc_offset: facts.utc_offset,
            is_dst: facts.is_dst,
            dst_info: facts.dst_info,
            initial_time: facts.initial_time,
            grounding_sources: facts.grounding_sources,
        }
    }
}

/// Outcome of a timezone lookup. Ambiguity is a distinct outcome that routes
/// to a resolution step, never an error.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(ZoneFacts),
    Ambiguous(Vec<String>),
}

/// Result of the add-timezone workflow: either a card was created, or the
/// pipeline halted awaiting an ambiguity resolution.
#[derive(Debug, Clone)]
pub enum AddZoneOutcome {
    Added(TimezoneCard),
    NeedsResolution(AmbiguityState),
}

/// A pending ambiguous lookup awaiting user selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguityState {
    pub original_query: String,
    pub candidates: Vec<String>,
}

/// A scheduled email reminder. Lives only in memory — reminders do not
/// survive a restart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub message: String,
    pub recipient_email: String,
    pub fire_date: DateTime<Utc>,
    /// Timezone identifier the reminder was scheduled against.
    pub location: String,
}

/// An address-book contact. Email is unique, case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// An analyzed document produced by the document workflow. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub original_text: String,
    pub summary: String,
    pub sentiment: String,
}

/// Summary + one-word sentiment from document analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub summary: String,
    pub sentiment: String,
}

/// Result of a time conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    /// "YYYY-MM-DD HH:mm:ss" in the target zone.
    pub converted_time: String,
    pub explanation: String,
    pub grounding_sources: Vec<GroundingSource>,
}

/// A composed email before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDraft {
    pub subject: String,
    pub html_body: String,
}

/// Receipt from the email delivery service. Dry-run sends get a synthetic id
/// prefixed with `simulated_`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Text,
}

/// A file attached to a chat message.
///
/// `content` is a `data:` URL for images and the raw text for text files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub content: String,
    pub name: String,
}

/// One turn of the chat transcript. The transcript is persisted as a whole
/// list, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<FileAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A user-facing transient notification emitted by background pipelines
/// (e.g. the reminder-fired path).
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }
}
