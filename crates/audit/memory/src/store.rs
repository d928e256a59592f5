use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use vellum_audit::error::AuditError;
use vellum_audit::record::AccessRecord;
use vellum_audit::store::AuditStore;

/// In-memory audit store using `DashMap`. Suitable for development and testing.
///
/// Records are grouped by purchase id; each group keeps insertion order.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    by_purchase: DashMap<Uuid, Vec<AccessRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all purchases.
    pub fn len(&self) -> usize {
        self.by_purchase.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: AccessRecord) -> Result<(), AuditError> {
        self.by_purchase
            .entry(entry.purchase_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn query_by_purchase(&self, purchase_id: Uuid) -> Result<Vec<AccessRecord>, AuditError> {
        let mut records = self
            .by_purchase
            .get(&purchase_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        // Ids are v7, so they break ties between equal timestamps.
        records.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }
}
