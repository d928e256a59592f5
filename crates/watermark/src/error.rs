use thiserror::Error;

/// Reasons a document could not be stamped. No output is produced in any
/// of these cases.
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("document could not be parsed: {0}")]
    Parse(String),

    #[error("document is encrypted")]
    Encrypted,

    #[error("document has no pages")]
    NoPages,

    #[error("page {0} has no usable media box")]
    MissingMediaBox(u32),

    #[error("malformed page {page}: {reason}")]
    MalformedPage { page: u32, reason: String },

    #[error("watermark identity is empty")]
    EmptyIdentity,

    #[error("render was cancelled")]
    Cancelled,

    #[error("failed to write document: {0}")]
    Write(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
