use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuditError;
use crate::record::AccessRecord;

/// Append-only storage for access records.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an access record.
    async fn record(&self, entry: AccessRecord) -> Result<(), AuditError>;

    /// All records for a purchase, newest first.
    async fn query_by_purchase(&self, purchase_id: Uuid) -> Result<Vec<AccessRecord>, AuditError>;
}
