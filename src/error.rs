//! Error types for workflow execution
//!
//! One variant per failure class the orchestrator can surface. All of these
//! are caught at the orchestrator boundary and turned into a user-facing
//! result or notice; none of them crash the process or corrupt in-memory
//! state. An ambiguous timezone lookup is deliberately NOT an error — see
//! [`crate::types::LookupOutcome`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The entity already exists (timezone card location, contact email).
    #[error("{0}")]
    Duplicate(String),

    /// The AI service answered, but the text did not match the shape the
    /// operation expects. Carries the raw response for diagnosis.
    #[error("could not parse the {operation} response from AI: {detail}. Response: {raw}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
        raw: String,
    },

    /// The AI service declined to respond for content-policy reasons.
    #[error("the response was blocked due to safety settings. Please adjust your prompt")]
    ContentPolicyBlocked,

    /// The email delivery service rejected or failed the send.
    #[error("failed to send email: {0}")]
    Delivery(String),

    /// Text extraction from an uploaded file failed.
    #[error("failed to extract text from '{filename}': {detail}")]
    Extraction { filename: String, detail: String },

    /// Caught before any external call is made (bad form input, reminder
    /// time in the past, unknown timezone, unreadable attachment).
    #[error("{0}")]
    Validation(String),

    /// Transport-level failure talking to the AI completion service.
    #[error("the AI service failed to respond: {0}")]
    Api(String),

    /// The persistence store backend failed.
    #[error("storage error: {0}")]
    Store(String),
}

/// Coarse classification for a UI layer deciding how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Duplicate,
    MalformedResponse,
    ContentPolicyBlocked,
    Delivery,
    Extraction,
    Validation,
    Api,
    Store,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Duplicate(_) => ErrorKind::Duplicate,
            WorkflowError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            WorkflowError::ContentPolicyBlocked => ErrorKind::ContentPolicyBlocked,
            WorkflowError::Delivery(_) => ErrorKind::Delivery,
            WorkflowError::Extraction { .. } => ErrorKind::Extraction,
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Api(_) => ErrorKind::Api,
            WorkflowError::Store(_) => ErrorKind::Store,
        }
    }

    /// True when the failure was caught before any external call was made.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::Duplicate(_) | WorkflowError::Validation(_)
        )
    }
}

impl From<crate::store::StoreError> for WorkflowError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::Duplicate(msg) => WorkflowError::Duplicate(msg),
            crate::store::StoreError::Backend(msg) => WorkflowError::Store(msg),
        }
    }
}
