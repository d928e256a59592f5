use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object exceeds the maximum allowed size.
    #[error("object too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        limit: u64,
    },

    /// The backend cannot perform this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A storage backend error occurred.
    #[error("object storage error: {0}")]
    Storage(String),
}
