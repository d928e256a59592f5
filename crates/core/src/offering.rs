use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::purchase::BuyerSnapshot;
use crate::size::format_size;

/// The only media type the watermark renderer accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A stored file that can be delivered as part of an offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Document {
    pub id: Uuid,
    /// Object store key. Content-addressed; never shown to buyers.
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// File name as uploaded by the creator.
    pub file_name: String,
    pub size_bytes: u64,
    pub media_type: String,
}

impl Document {
    /// Whether the document can be stamped before delivery.
    #[must_use]
    pub fn is_watermarkable(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }

    /// Human-readable size, e.g. `"1.5 MB"`.
    #[must_use]
    pub fn formatted_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// A sellable bundle of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: Uuid,
    pub title: String,
    pub creator_name: String,
    /// Documents in display order.
    pub documents: Vec<Document>,
}

impl Offering {
    /// Look up one of this offering's documents.
    #[must_use]
    pub fn document(&self, id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }
}

/// A buyer as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub email: String,
}

impl Buyer {
    /// Freeze the identity fields for a new purchase.
    #[must_use]
    pub fn snapshot(&self) -> BuyerSnapshot {
        BuyerSnapshot {
            name: self.name.clone(),
            tax_id: self.tax_id.clone(),
            email: self.email.clone(),
        }
    }
}
