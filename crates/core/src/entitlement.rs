//! Access decision for a single download attempt.
//!
//! The evaluator is pure: it reads the purchase and a clock value and does no
//! I/O. The same checks are repeated atomically by the purchase store when a
//! download is recorded, so a decision made here can still lose a race.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::purchase::{DownloadLimit, Purchase};

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Entitlement {
    /// Another download is permitted.
    Allowed,
    /// The purchase expired at `since`.
    Expired { since: DateTime<Utc> },
    /// Every permitted download has been used.
    LimitExceeded { limit: u32 },
}

impl Entitlement {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Whole days elapsed since expiry, for expired purchases.
    #[must_use]
    pub fn days_expired(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            Self::Expired { since } => Some((now - *since).num_days().max(0)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Entitlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::Expired { .. } => f.write_str("expired"),
            Self::LimitExceeded { .. } => f.write_str("limit_exceeded"),
        }
    }
}

/// Decide whether `purchase` permits another download at `now`.
///
/// Expiry is checked first: a purchase that is both expired and out of
/// downloads reports [`Entitlement::Expired`]. A purchase is expired from the
/// instant `now` reaches `expires_at`.
#[must_use]
pub fn evaluate(purchase: &Purchase, now: DateTime<Utc>) -> Entitlement {
    if let Some(expires_at) = purchase.expires_at.filter(|at| now >= *at) {
        return Entitlement::Expired { since: expires_at };
    }

    match purchase.download_limit {
        DownloadLimit::Limited(limit) if purchase.downloads_used >= limit => {
            Entitlement::LimitExceeded { limit }
        }
        _ => Entitlement::Allowed,
    }
}
