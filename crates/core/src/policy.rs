use chrono::{DateTime, Duration, Utc};

use crate::purchase::DownloadLimit;

/// Validity applied when a batch does not specify one.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Largest finite download cap. Stores persist the cap as a 32-bit column.
pub const MAX_DOWNLOAD_LIMIT: u32 = i32::MAX.unsigned_abs();

/// Why a [`GrantPolicy`] cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("validity of {0} days is out of range")]
    ValidityOutOfRange(i64),

    #[error("validity must be a positive duration")]
    NonPositiveValidity,

    #[error("download limit must be at least 1")]
    ZeroLimit,

    #[error("download limit must not exceed {}", MAX_DOWNLOAD_LIMIT)]
    LimitTooLarge,

    #[error("expiry falls outside the supported date range")]
    ExpiryOutOfRange,
}

/// Expiry and download cap applied to every purchase in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPolicy {
    /// How long access lasts from creation. `None` means forever.
    pub validity: Option<Duration>,
    pub download_limit: DownloadLimit,
}

impl GrantPolicy {
    /// A policy expiring after `days` days with the given cap.
    ///
    /// Fails when `days` does not fit in a [`Duration`].
    pub fn days(days: i64, download_limit: DownloadLimit) -> Result<Self, PolicyError> {
        let validity = Duration::try_days(days).ok_or(PolicyError::ValidityOutOfRange(days))?;
        Ok(Self {
            validity: Some(validity),
            download_limit,
        })
    }

    /// Reject policies no purchase can be created under.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.validity.is_some_and(|v| v <= Duration::zero()) {
            return Err(PolicyError::NonPositiveValidity);
        }
        match self.download_limit {
            DownloadLimit::Limited(0) => Err(PolicyError::ZeroLimit),
            DownloadLimit::Limited(n) if n > MAX_DOWNLOAD_LIMIT => Err(PolicyError::LimitTooLarge),
            _ => Ok(()),
        }
    }

    /// Absolute expiry for a purchase created at `created_at`.
    pub fn expires_at(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, PolicyError> {
        self.validity
            .map(|v| {
                created_at
                    .checked_add_signed(v)
                    .ok_or(PolicyError::ExpiryOutOfRange)
            })
            .transpose()
    }
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            validity: Some(Duration::days(DEFAULT_VALIDITY_DAYS)),
            download_limit: DownloadLimit::Unlimited,
        }
    }
}
