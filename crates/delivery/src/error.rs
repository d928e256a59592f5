use chrono::{DateTime, Utc};
use thiserror::Error;

use vellum_core::PolicyError;
use vellum_store::StoreError;
use vellum_watermark::WatermarkError;

/// Errors returned by [`DeliveryService`](crate::DeliveryService).
///
/// Messages are safe to show to callers: they never carry storage keys or
/// backend error text.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A purchase, offering, document or buyer does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The purchase expired at `expired_at`.
    #[error("purchase expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// Every permitted download has been used.
    #[error("download limit of {limit} reached")]
    QuotaExceeded { limit: u32 },

    /// A collaborator (object store, renderer, database) failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// The source document cannot be stamped.
    #[error("document cannot be rendered: {0}")]
    Render(String),

    /// The request itself is invalid.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl DeliveryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Expired { .. } => "expired",
            Self::QuotaExceeded { .. } => "download_limit_exceeded",
            Self::Upstream(_) => "upstream_error",
            Self::Render(_) => "render_error",
            Self::Validation(_) => "validation_error",
        }
    }

    /// Whole days since expiry, for [`DeliveryError::Expired`].
    pub fn days_expired(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            Self::Expired { expired_at } => Some((now - *expired_at).num_days().max(0)),
            _ => None,
        }
    }
}

impl From<StoreError> for DeliveryError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "purchase store failure");
        Self::Upstream("purchase storage unavailable".into())
    }
}

impl From<PolicyError> for DeliveryError {
    fn from(e: PolicyError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<WatermarkError> for DeliveryError {
    fn from(e: WatermarkError) -> Self {
        match e {
            WatermarkError::Cancelled => Self::Upstream("watermark engine timed out".into()),
            WatermarkError::Write(_) | WatermarkError::Io(_) => {
                tracing::error!(error = %e, "watermark output failure");
                Self::Upstream("watermark engine failed".into())
            }
            other => Self::Render(other.to_string()),
        }
    }
}

/// A notifier could not deliver one or more notices.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn store_errors_hide_backend_detail() {
        let err = DeliveryError::from(StoreError::Backend("relation vellum_purchases".into()));
        assert!(matches!(err, DeliveryError::Upstream(_)));
        assert!(!err.to_string().contains("vellum_purchases"));
    }

    #[test]
    fn watermark_errors_split_by_cause() {
        assert!(matches!(
            DeliveryError::from(WatermarkError::Encrypted),
            DeliveryError::Render(_)
        ));
        assert!(matches!(
            DeliveryError::from(WatermarkError::Write("disk full".into())),
            DeliveryError::Upstream(_)
        ));
        assert!(matches!(
            DeliveryError::from(WatermarkError::Cancelled),
            DeliveryError::Upstream(_)
        ));
    }

    #[test]
    fn policy_errors_are_validation_failures() {
        let err = DeliveryError::from(PolicyError::ExpiryOutOfRange);
        assert!(matches!(err, DeliveryError::Validation(_)));
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn days_expired_counts_whole_days() {
        let now = Utc::now();
        let err = DeliveryError::Expired {
            expired_at: now - Duration::hours(50),
        };
        assert_eq!(err.days_expired(now), Some(2));
        assert_eq!(err.code(), "expired");
        assert_eq!(
            DeliveryError::QuotaExceeded { limit: 1 }.days_expired(now),
            None
        );
    }
}
