use async_trait::async_trait;

use crate::error::EmailError;

/// A transport-neutral email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub body: Option<String>,
    pub html_body: Option<String>,
    pub reply_to: Option<String>,
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct EmailResult {
    /// Transport-assigned message identifier, when available.
    pub message_id: Option<String>,
    /// Human-readable status (e.g. `"sent"`).
    pub status: String,
}

/// Pluggable email transport.
#[async_trait]
pub trait EmailBackend: Send + Sync + std::fmt::Debug {
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError>;

    /// Verify the transport is reachable.
    async fn health_check(&self) -> Result<(), EmailError>;

    /// Backend name (e.g. `"smtp"`).
    fn backend_name(&self) -> &'static str;
}
