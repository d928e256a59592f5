use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use vellum_core::{DownloadLog, Purchase};

use crate::error::StoreError;

/// Result of an attempt to consume one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The counter was incremented and the log written. Holds the purchase
    /// as it is after the increment.
    Consumed(Purchase),
    /// The purchase had expired when the update ran.
    Expired { since: DateTime<Utc> },
    /// No downloads were left when the update ran.
    LimitExceeded { limit: u32 },
    /// No purchase with that id exists.
    NotFound,
}

/// Durable storage for purchases and their download logs.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Insert every purchase or none of them.
    ///
    /// Fails with [`StoreError::Duplicate`] when any id already exists, in
    /// which case nothing is written.
    async fn insert_batch(&self, purchases: &[Purchase]) -> Result<(), StoreError>;

    /// Load a purchase by id.
    async fn get(&self, id: Uuid) -> Result<Option<Purchase>, StoreError>;

    /// Atomically record one download.
    ///
    /// The expiry and quota checks are re-evaluated against the stored row at
    /// `log.downloaded_at`. The counter increment and the log insert commit
    /// together or not at all. When two callers race for the last remaining
    /// download exactly one of them observes [`ConsumeOutcome::Consumed`].
    async fn consume_download(&self, log: &DownloadLog) -> Result<ConsumeOutcome, StoreError>;

    /// Download logs for a purchase, oldest first.
    async fn download_logs(&self, purchase_id: Uuid) -> Result<Vec<DownloadLog>, StoreError>;
}
