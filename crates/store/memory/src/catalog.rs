use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use vellum_core::{Buyer, Offering};
use vellum_store::{Catalog, StoreError};

/// In-memory [`Catalog`] seeded through [`insert_offering`](Self::insert_offering)
/// and [`insert_buyer`](Self::insert_buyer).
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    offerings: DashMap<Uuid, Offering>,
    buyers: DashMap<Uuid, Buyer>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an offering.
    pub fn insert_offering(&self, offering: Offering) {
        self.offerings.insert(offering.id, offering);
    }

    /// Add or replace a buyer.
    pub fn insert_buyer(&self, buyer: Buyer) {
        self.buyers.insert(buyer.id, buyer);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn offering(&self, id: Uuid) -> Result<Option<Offering>, StoreError> {
        Ok(self.offerings.get(&id).map(|o| o.clone()))
    }

    async fn buyers(&self, ids: &[Uuid]) -> Result<Vec<Buyer>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.buyers.get(id).map(|b| b.clone()))
            .collect())
    }
}
