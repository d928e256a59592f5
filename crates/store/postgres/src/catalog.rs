use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use vellum_core::{Buyer, Document, Offering};
use vellum_store::{Catalog, StoreError};

use crate::config::PostgresConfig;
use crate::rows::{BuyerRow, DocumentRow, size_column};

/// Postgres-backed [`Catalog`] reading the offering, document and buyer tables.
pub struct PostgresCatalog {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresCatalog {
    /// Wrap a pool opened with [`connect`](crate::connect).
    pub fn from_pool(pool: PgPool, config: PostgresConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// Write an offering and its documents, replacing existing rows.
    ///
    /// Catalog data is normally maintained elsewhere; this is for seeding.
    pub async fn upsert_offering(&self, offering: &Offering) -> Result<(), StoreError> {
        let offerings = self.config.offerings_table();
        let documents = self.config.documents_table();
        let links = self.config.offering_documents_table();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO {offerings} (id, title, creator_name) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, \
             creator_name = EXCLUDED.creator_name"
        ))
        .bind(offering.id)
        .bind(&offering.title)
        .bind(&offering.creator_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(&format!("DELETE FROM {links} WHERE offering_id = $1"))
            .bind(offering.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        for (position, doc) in offering.documents.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                StoreError::Serialization(format!("offering {} has too many documents", offering.id))
            })?;
            sqlx::query(&format!(
                "INSERT INTO {documents} (id, storage_key, file_name, size_bytes, media_type) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO UPDATE SET storage_key = EXCLUDED.storage_key, \
                 file_name = EXCLUDED.file_name, size_bytes = EXCLUDED.size_bytes, \
                 media_type = EXCLUDED.media_type"
            ))
            .bind(doc.id)
            .bind(&doc.storage_key)
            .bind(&doc.file_name)
            .bind(size_column(doc.size_bytes)?)
            .bind(&doc.media_type)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

            sqlx::query(&format!(
                "INSERT INTO {links} (offering_id, document_id, position) VALUES ($1, $2, $3)"
            ))
            .bind(offering.id)
            .bind(doc.id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Write a buyer, replacing an existing row with the same id.
    pub async fn upsert_buyer(&self, buyer: &Buyer) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, name, tax_id, email) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             tax_id = EXCLUDED.tax_id, email = EXCLUDED.email",
            self.config.buyers_table()
        ))
        .bind(buyer.id)
        .bind(&buyer.name)
        .bind(&buyer.tax_id)
        .bind(&buyer.email)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn offering(&self, id: Uuid) -> Result<Option<Offering>, StoreError> {
        let header: Option<(Uuid, String, String)> = sqlx::query_as(&format!(
            "SELECT id, title, creator_name FROM {} WHERE id = $1",
            self.config.offerings_table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some((id, title, creator_name)) = header else {
            return Ok(None);
        };

        let documents: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT d.id, d.storage_key, d.file_name, d.size_bytes, d.media_type \
             FROM {} d JOIN {} l ON l.document_id = d.id \
             WHERE l.offering_id = $1 ORDER BY l.position ASC, d.id ASC",
            self.config.documents_table(),
            self.config.offering_documents_table()
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Some(Offering {
            id,
            title,
            creator_name,
            documents: documents
                .into_iter()
                .map(Document::try_from)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn buyers(&self, ids: &[Uuid]) -> Result<Vec<Buyer>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<BuyerRow> = sqlx::query_as(&format!(
            "SELECT id, name, tax_id, email FROM {} WHERE id = ANY($1)",
            self.config.buyers_table()
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use vellum_core::Document;

    use super::*;
    use crate::connect;

    #[tokio::test]
    async fn offering_and_buyers_roundtrip() {
        let config = PostgresConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/vellum_test".to_string()),
            table_prefix: format!("test_{}_", Uuid::new_v4().simple()),
            ..PostgresConfig::default()
        };
        let pool = connect(&config).await.expect("connect");
        let catalog = PostgresCatalog::from_pool(pool, config);

        let offering = Offering {
            id: Uuid::now_v7(),
            title: "Atlas".into(),
            creator_name: "Vellum Press".into(),
            documents: vec![Document {
                id: Uuid::now_v7(),
                storage_key: "aa/bb".into(),
                file_name: "atlas.pdf".into(),
                size_bytes: 2048,
                media_type: "application/pdf".into(),
            }],
        };
        catalog.upsert_offering(&offering).await.expect("upsert offering");
        assert_eq!(catalog.offering(offering.id).await.unwrap(), Some(offering));

        let buyer = Buyer {
            id: Uuid::now_v7(),
            name: "Eva".into(),
            tax_id: "9".into(),
            email: "eva@example.com".into(),
        };
        catalog.upsert_buyer(&buyer).await.expect("upsert buyer");
        let found = catalog.buyers(&[buyer.id, Uuid::now_v7()]).await.unwrap();
        assert_eq!(found, vec![buyer]);
    }
}
