use thiserror::Error;

/// Errors raised while building or sending an email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("transient SMTP error: {0}")]
    Transient(String),

    #[error("permanent SMTP error: {0}")]
    Permanent(String),

    #[error("SMTP connection error: {0}")]
    Connection(String),

    #[error("invalid email configuration: {0}")]
    Configuration(String),
}
