use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of downloads a purchase grants.
///
/// Serialized as an optional integer: `null` means unlimited. Storage backends
/// that need a scalar use [`DownloadLimit::as_raw`], where a negative value
/// means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum DownloadLimit {
    /// At most this many downloads.
    Limited(u32),
    /// No cap on downloads.
    Unlimited,
}

impl DownloadLimit {
    /// Decode the scalar storage form. Negative values mean unlimited.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }

    /// Encode into the scalar storage form (`-1` for unlimited).
    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Limited(n) => i64::from(n),
            Self::Unlimited => -1,
        }
    }

    /// Whether another download is permitted after `used` downloads.
    #[must_use]
    pub fn permits(self, used: u32) -> bool {
        match self {
            Self::Limited(n) => used < n,
            Self::Unlimited => true,
        }
    }

    /// Downloads left after `used`, or `None` when unlimited.
    #[must_use]
    pub fn remaining(self, used: u32) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(n.saturating_sub(used)),
            Self::Unlimited => None,
        }
    }
}

impl From<Option<u32>> for DownloadLimit {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Self::Unlimited, Self::Limited)
    }
}

impl From<DownloadLimit> for Option<u32> {
    fn from(value: DownloadLimit) -> Self {
        match value {
            DownloadLimit::Limited(n) => Some(n),
            DownloadLimit::Unlimited => None,
        }
    }
}

impl std::fmt::Display for DownloadLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Buyer identity captured when the purchase was created.
///
/// Later edits to the buyer record never change what gets stamped on
/// documents delivered for an existing purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BuyerSnapshot {
    pub name: String,
    pub tax_id: String,
    pub email: String,
}

impl BuyerSnapshot {
    /// The text stamped onto every delivered page.
    #[must_use]
    pub fn watermark_text(&self) -> String {
        format!("{} - {} - {}", self.name, self.tax_id, self.email)
    }
}

/// A buyer's right to download the documents of one offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Unique identifier (UUID-v7).
    pub id: Uuid,
    /// The offering this purchase grants access to.
    pub offering_id: Uuid,
    /// The buyer who owns the purchase.
    pub buyer_id: Uuid,
    /// Identity frozen at creation time.
    pub buyer: BuyerSnapshot,
    /// When the purchase was created.
    pub created_at: DateTime<Utc>,
    /// When access ends. `None` means never.
    pub expires_at: Option<DateTime<Utc>>,
    /// Downloads consumed so far. Never decreases.
    pub downloads_used: u32,
    /// Maximum number of downloads.
    pub download_limit: DownloadLimit,
}

impl Purchase {
    /// Build a fresh purchase with no downloads consumed.
    #[must_use]
    pub fn new(
        offering_id: Uuid,
        buyer_id: Uuid,
        buyer: BuyerSnapshot,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        download_limit: DownloadLimit,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            offering_id,
            buyer_id,
            buyer,
            created_at,
            expires_at,
            downloads_used: 0,
            download_limit,
        }
    }

    /// Downloads left, or `None` when unlimited.
    #[must_use]
    pub fn remaining_downloads(&self) -> Option<u32> {
        self.download_limit.remaining(self.downloads_used)
    }
}

/// One successful delivery of one document. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DownloadLog {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub document_id: Uuid,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadLog {
    #[must_use]
    pub fn new(purchase_id: Uuid, document_id: Uuid, downloaded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            purchase_id,
            document_id,
            downloaded_at,
        }
    }
}
