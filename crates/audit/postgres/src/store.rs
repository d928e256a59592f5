use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use vellum_audit::error::AuditError;
use vellum_audit::record::AccessRecord;
use vellum_audit::store::AuditStore;

use crate::config::PostgresAuditConfig;
use crate::migrations;

/// Postgres-backed audit store using `sqlx`.
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Connect to Postgres and run migrations.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let pool = PgPool::connect(&config.url)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Self::from_pool(pool, config).await
    }

    /// Create from an existing pool, e.g. the one shared with the purchase store.
    pub async fn from_pool(pool: PgPool, config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let table = config.table();
        migrations::run_migrations(&pool, &table)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, entry: AccessRecord) -> Result<(), AuditError> {
        let sql = format!(
            "INSERT INTO {} (id, purchase_id, document_id, action, outcome, detail, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table
        );

        sqlx::query(&sql)
            .bind(entry.id)
            .bind(entry.purchase_id)
            .bind(entry.document_id)
            .bind(entry.action.as_str())
            .bind(entry.outcome.as_str())
            .bind(&entry.detail)
            .bind(entry.occurred_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn query_by_purchase(&self, purchase_id: Uuid) -> Result<Vec<AccessRecord>, AuditError> {
        let sql = format!(
            "SELECT id, purchase_id, document_id, action, outcome, detail, occurred_at \
             FROM {} WHERE purchase_id = $1 ORDER BY occurred_at DESC, id DESC",
            self.table
        );

        let rows = sqlx::query_as::<_, AccessRow>(&sql)
            .bind(purchase_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        rows.into_iter().map(AccessRecord::try_from).collect()
    }
}

/// Internal row type for mapping database rows to `AccessRecord`.
#[derive(sqlx::FromRow)]
struct AccessRow {
    id: Uuid,
    purchase_id: Uuid,
    document_id: Option<Uuid>,
    action: String,
    outcome: String,
    detail: String,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<AccessRow> for AccessRecord {
    type Error = AuditError;

    fn try_from(row: AccessRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            purchase_id: row.purchase_id,
            document_id: row.document_id,
            action: row.action.parse().map_err(AuditError::Serialization)?,
            outcome: row.outcome.parse().map_err(AuditError::Serialization)?,
            detail: row.detail,
            occurred_at: row.occurred_at,
        })
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use vellum_audit::testing::run_audit_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn audit_conformance() {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/vellum_test".to_string());
        let config = PostgresAuditConfig::new(url)
            .with_prefix(format!("test_{}_", Uuid::new_v4().simple()));
        let store = PostgresAuditStore::new(&config).await.unwrap();
        run_audit_conformance_tests(&store).await.unwrap();
    }
}
