use chrono::{DateTime, Utc};
use uuid::Uuid;

use vellum_core::{Buyer, BuyerSnapshot, Document, DownloadLimit, DownloadLog, Purchase};
use vellum_store::StoreError;

/// Column list matching [`PurchaseRow`].
pub(crate) const PURCHASE_COLUMNS: &str = "id, offering_id, buyer_id, buyer_name, buyer_tax_id, \
     buyer_email, created_at, expires_at, downloads_used, download_limit";

#[derive(sqlx::FromRow)]
pub(crate) struct PurchaseRow {
    id: Uuid,
    offering_id: Uuid,
    buyer_id: Uuid,
    buyer_name: String,
    buyer_tax_id: String,
    buyer_email: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    downloads_used: i32,
    download_limit: i32,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = StoreError;

    fn try_from(row: PurchaseRow) -> Result<Self, StoreError> {
        let downloads_used = u32::try_from(row.downloads_used).map_err(|_| {
            StoreError::Serialization(format!(
                "purchase {} has negative downloads_used {}",
                row.id, row.downloads_used
            ))
        })?;
        Ok(Self {
            id: row.id,
            offering_id: row.offering_id,
            buyer_id: row.buyer_id,
            buyer: BuyerSnapshot {
                name: row.buyer_name,
                tax_id: row.buyer_tax_id,
                email: row.buyer_email,
            },
            created_at: row.created_at,
            expires_at: row.expires_at,
            downloads_used,
            download_limit: DownloadLimit::from_raw(i64::from(row.download_limit)),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DownloadLogRow {
    id: Uuid,
    purchase_id: Uuid,
    document_id: Uuid,
    downloaded_at: DateTime<Utc>,
}

impl From<DownloadLogRow> for DownloadLog {
    fn from(row: DownloadLogRow) -> Self {
        Self {
            id: row.id,
            purchase_id: row.purchase_id,
            document_id: row.document_id,
            downloaded_at: row.downloaded_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DocumentRow {
    id: Uuid,
    storage_key: String,
    file_name: String,
    size_bytes: i64,
    media_type: String,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, StoreError> {
        let size_bytes = u64::try_from(row.size_bytes).map_err(|_| {
            StoreError::Serialization(format!(
                "document {} has negative size {}",
                row.id, row.size_bytes
            ))
        })?;
        Ok(Self {
            id: row.id,
            storage_key: row.storage_key,
            file_name: row.file_name,
            size_bytes,
            media_type: row.media_type,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BuyerRow {
    id: Uuid,
    name: String,
    tax_id: String,
    email: String,
}

impl From<BuyerRow> for Buyer {
    fn from(row: BuyerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            tax_id: row.tax_id,
            email: row.email,
        }
    }
}

/// Encode a limit for the `INTEGER` column. Unlimited is stored as `-1`.
pub(crate) fn limit_column(limit: DownloadLimit) -> Result<i32, StoreError> {
    i32::try_from(limit.as_raw()).map_err(|_| {
        StoreError::Serialization(format!("download limit {limit} exceeds column range"))
    })
}

pub(crate) fn size_column(size_bytes: u64) -> Result<i64, StoreError> {
    i64::try_from(size_bytes).map_err(|_| {
        StoreError::Serialization(format!("document size {size_bytes} exceeds column range"))
    })
}

pub(crate) fn used_column(used: u32) -> Result<i32, StoreError> {
    i32::try_from(used).map_err(|_| {
        StoreError::Serialization(format!("downloads_used {used} exceeds column range"))
    })
}
