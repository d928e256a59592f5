use thiserror::Error;
use vellum_blob::BlobError;

/// Failure modes of S3 requests.
#[derive(Debug, Error)]
pub enum AwsError {
    #[error("S3 service error: {0}")]
    Service(String),

    #[error("S3 request throttled")]
    Throttled,

    #[error("S3 connection error: {0}")]
    Connection(String),

    #[error("S3 request timed out")]
    Timeout,

    #[error("invalid S3 configuration: {0}")]
    Configuration(String),
}

impl From<AwsError> for BlobError {
    fn from(err: AwsError) -> Self {
        BlobError::Storage(err.to_string())
    }
}

/// Classify an SDK error message into an [`AwsError`].
pub fn classify_sdk_error(error_str: &str) -> AwsError {
    let lower = error_str.to_lowercase();
    if lower.contains("throttl") || lower.contains("slow down") || lower.contains("too many") {
        AwsError::Throttled
    } else if lower.contains("timeout") || lower.contains("timed out") {
        AwsError::Timeout
    } else if lower.contains("connect") || lower.contains("dns") || lower.contains("network") {
        AwsError::Connection(error_str.to_owned())
    } else {
        AwsError::Service(error_str.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_throttled() {
        assert!(matches!(
            classify_sdk_error("SlowDown: Please reduce your request rate"),
            AwsError::Throttled
        ));
    }

    #[test]
    fn classify_timeout() {
        assert!(matches!(
            classify_sdk_error("operation timed out"),
            AwsError::Timeout
        ));
    }

    #[test]
    fn classify_connection() {
        assert!(matches!(
            classify_sdk_error("dispatch failure: Connection refused"),
            AwsError::Connection(_)
        ));
    }

    #[test]
    fn classify_other() {
        assert!(matches!(
            classify_sdk_error("AccessDenied: Access Denied"),
            AwsError::Service(_)
        ));
    }

    #[test]
    fn converts_to_storage_error() {
        let err: BlobError = AwsError::Throttled.into();
        assert!(matches!(err, BlobError::Storage(msg) if msg == "S3 request throttled"));
    }
}
