use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use vellum_core::{Document, Purchase};

/// A watermarked document ready to be sent to the buyer.
#[derive(Debug, Clone)]
pub struct DeliveredFile {
    pub content: Bytes,
    /// Suggested download name, e.g. `guide_20260105_143000.pdf`.
    pub file_name: String,
    pub media_type: String,
    /// The purchase after this download was counted.
    pub purchase: Purchase,
}

/// One entry of a [`PurchaseListing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListedDocument {
    pub id: Uuid,
    pub file_name: String,
    pub media_type: String,
    pub size_bytes: u64,
    /// Human-readable size, e.g. `"1.5 MB"`.
    pub size: String,
}

impl From<&Document> for ListedDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            file_name: doc.file_name.clone(),
            media_type: doc.media_type.clone(),
            size_bytes: doc.size_bytes,
            size: doc.formatted_size(),
        }
    }
}

/// What a buyer may still download under a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PurchaseListing {
    pub purchase_id: Uuid,
    pub offering_id: Uuid,
    pub offering_title: String,
    pub documents: Vec<ListedDocument>,
    pub downloads_used: u32,
    /// `None` when downloads are unlimited.
    pub remaining_downloads: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Name a delivered copy after the original file and the delivery time.
///
/// `report.pdf` delivered at 2026-01-05 14:30:00 becomes
/// `report_20260105_143000.pdf`. Names without an extension get none.
pub fn download_file_name(original: &str, at: DateTime<Utc>) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let stamp = at.format("%Y%m%d_%H%M%S");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{stamp}.{ext}"),
        None => format!("{stem}_{stamp}"),
    }
}
