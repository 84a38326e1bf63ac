//! Email delivery via the Resend HTTP API.
//!
//! The orchestrator depends on the [`EmailApi`] trait. The production
//! [`ResendMailer`] has a dry-run mode: with no API key configured it logs
//! the would-be send and returns a synthetic receipt, so every workflow that
//! ends in an email stays exercisable without live credentials.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::WorkflowError;
use crate::types::DeliveryReceipt;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[async_trait]
pub trait EmailApi: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, WorkflowError>;
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    /// `"Name <addr>"` sender line.
    from: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from: from.into(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.api_key.is_none()
    }
}

#[async_trait]
impl EmailApi for ResendMailer {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, WorkflowError> {
        let Some(api_key) = &self.api_key else {
            log::warn!("No Resend API key configured. Simulating successful email send.");
            log::info!(
                "Email details:\nTo: {}\nSubject: {}\nBody:\n{}",
                to,
                subject,
                html_body
            );
            return Ok(DeliveryReceipt {
                id: format!("simulated_{}", Utc::now().timestamp_millis()),
            });
        };

        let body = serde_json::json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "html": html_body,
        });

        let resp = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WorkflowError::Delivery(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|err| err.message)
                .unwrap_or_else(|| status.to_string());
            return Err(WorkflowError::Delivery(format!(
                "Resend API error: {}",
                detail
            )));
        }

        let receipt: SendResponse = resp
            .json()
            .await
            .map_err(|e| WorkflowError::Delivery(format!("unreadable Resend response: {}", e)))?;

        log::info!("Email sent via Resend: {}", receipt.id);
        Ok(DeliveryReceipt { id: receipt.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_returns_simulated_receipt() {
        let mailer = ResendMailer::new(None, "Flowdesk <onboarding@resend.dev>");
        assert!(mailer.is_dry_run());

        let receipt = mailer
            .send_email("jane@example.com", "Hello", "<p>Hi</p>")
            .await
            .expect("dry-run always succeeds");
        assert!(receipt.id.starts_with("simulated_"));
    }

    #[test]
    fn test_configured_mailer_is_not_dry_run() {
        let mailer = ResendMailer::new(Some("re_123".to_string()), "Flowdesk <x@y>");
        assert!(!mailer.is_dry_run());
    }

    #[test]
    fn test_error_response_parsing() {
        let parsed: ErrorResponse =
            serde_json::from_str(r#"{"statusCode":422,"message":"Invalid `to`"}"#).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("Invalid `to`"));

        let empty: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.message.is_none());
    }
}
