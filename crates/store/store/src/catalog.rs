use async_trait::async_trait;
use uuid::Uuid;

use vellum_core::{Buyer, Offering};

use crate::error::StoreError;

/// Read-only view of offerings and buyers.
///
/// Catalog data is owned by other parts of the platform; delivery only reads
/// it.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Load an offering together with its documents.
    async fn offering(&self, id: Uuid) -> Result<Option<Offering>, StoreError>;

    /// Load the buyers with the given ids. Unknown ids are skipped, so the
    /// result may be shorter than `ids`. Order is unspecified.
    async fn buyers(&self, ids: &[Uuid]) -> Result<Vec<Buyer>, StoreError>;
}
