use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use vellum_core::{DownloadLog, Entitlement, Purchase, evaluate};
use vellum_store::{ConsumeOutcome, PurchaseStore, StoreError};

/// In-memory [`PurchaseStore`] backed by [`DashMap`].
///
/// A download is consumed while holding the purchase's shard lock, so the
/// entitlement check, the increment and the log append happen as one step.
/// Batch inserts are serialized by a separate gate so a failed batch never
/// leaves partial rows behind.
#[derive(Debug, Default)]
pub struct MemoryPurchaseStore {
    purchases: DashMap<Uuid, Purchase>,
    logs: DashMap<Uuid, Vec<DownloadLog>>,
    insert_gate: Mutex<()>,
}

impl MemoryPurchaseStore {
    /// Create a new, empty in-memory purchase store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored purchases.
    pub fn len(&self) -> usize {
        self.purchases.len()
    }

    /// Whether the store holds no purchases.
    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }
}

#[async_trait]
impl PurchaseStore for MemoryPurchaseStore {
    async fn insert_batch(&self, purchases: &[Purchase]) -> Result<(), StoreError> {
        let _gate = self
            .insert_gate
            .lock()
            .map_err(|e| StoreError::Backend(format!("insert gate poisoned: {e}")))?;

        let mut seen = std::collections::HashSet::with_capacity(purchases.len());
        for p in purchases {
            if !seen.insert(p.id) || self.purchases.contains_key(&p.id) {
                return Err(StoreError::Duplicate(p.id.to_string()));
            }
        }

        for p in purchases {
            self.purchases.insert(p.id, p.clone());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.purchases.get(&id).map(|p| p.clone()))
    }

    async fn consume_download(&self, log: &DownloadLog) -> Result<ConsumeOutcome, StoreError> {
        let Some(mut purchase) = self.purchases.get_mut(&log.purchase_id) else {
            return Ok(ConsumeOutcome::NotFound);
        };

        match evaluate(&purchase, log.downloaded_at) {
            Entitlement::Expired { since } => return Ok(ConsumeOutcome::Expired { since }),
            Entitlement::LimitExceeded { limit } => {
                return Ok(ConsumeOutcome::LimitExceeded { limit });
            }
            Entitlement::Allowed => {}
        }

        purchase.downloads_used += 1;
        self.logs
            .entry(log.purchase_id)
            .or_default()
            .push(log.clone());

        Ok(ConsumeOutcome::Consumed(purchase.clone()))
    }

    async fn download_logs(&self, purchase_id: Uuid) -> Result<Vec<DownloadLog>, StoreError> {
        let mut logs = self
            .logs
            .get(&purchase_id)
            .map(|l| l.clone())
            .unwrap_or_default();
        logs.sort_by_key(|l| l.downloaded_at);
        Ok(logs)
    }
}
