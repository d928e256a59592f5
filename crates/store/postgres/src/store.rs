use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use vellum_core::{DownloadLog, Entitlement, Purchase, evaluate};
use vellum_store::{ConsumeOutcome, PurchaseStore, StoreError};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::rows::{DownloadLogRow, PURCHASE_COLUMNS, PurchaseRow, limit_column, used_column};

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StoreError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// Open a connection pool and run migrations.
///
/// The returned pool can be shared between [`PostgresPurchaseStore`] and
/// [`PostgresCatalog`](crate::PostgresCatalog).
///
/// # Errors
///
/// Returns [`StoreError::Connection`] if pool creation fails, or
/// [`StoreError::Backend`] if migrations fail.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let connect_options = build_connect_options(config)?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect_with(connect_options)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    migrations::run_migrations(&pool, config)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(pool)
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_owned()),
        _ => backend(e),
    }
}

/// PostgreSQL-backed implementation of [`PurchaseStore`].
///
/// A download is consumed with a single conditional `UPDATE ... RETURNING`
/// whose `WHERE` clause repeats the expiry and quota checks. Row locking in
/// Postgres makes a concurrent loser re-read the incremented row and match
/// nothing, so two racers can never both take the last download.
pub struct PostgresPurchaseStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresPurchaseStore {
    /// Create a new store, connecting to Postgres and running migrations.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let pool = connect(&config).await?;
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Create a store from an existing pool and config.
    ///
    /// Runs migrations on creation.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Work out why the conditional update matched no row.
    async fn classify_refusal(&self, log: &DownloadLog) -> Result<ConsumeOutcome, StoreError> {
        let Some(current) = self.get(log.purchase_id).await? else {
            return Ok(ConsumeOutcome::NotFound);
        };
        match evaluate(&current, log.downloaded_at) {
            Entitlement::Expired { since } => Ok(ConsumeOutcome::Expired { since }),
            Entitlement::LimitExceeded { limit } => Ok(ConsumeOutcome::LimitExceeded { limit }),
            Entitlement::Allowed => Err(StoreError::Backend(format!(
                "conditional update for purchase {} matched no row",
                log.purchase_id
            ))),
        }
    }
}

#[async_trait]
impl PurchaseStore for PostgresPurchaseStore {
    async fn insert_batch(&self, purchases: &[Purchase]) -> Result<(), StoreError> {
        if purchases.is_empty() {
            return Ok(());
        }
        let columns = purchases
            .iter()
            .map(|p| Ok((used_column(p.downloads_used)?, limit_column(p.download_limit)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let table = self.config.purchases_table();
        let chunk_size = self.config.insert_chunk_size.max(1);

        let mut tx = self.pool.begin().await.map_err(backend)?;

        for (chunk, counts) in purchases.chunks(chunk_size).zip(columns.chunks(chunk_size)) {
            let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
                "INSERT INTO {table} ({PURCHASE_COLUMNS}) "
            ));
            builder.push_values(chunk.iter().zip(counts), |mut row, (p, (used, limit))| {
                row.push_bind(p.id)
                    .push_bind(p.offering_id)
                    .push_bind(p.buyer_id)
                    .push_bind(&p.buyer.name)
                    .push_bind(&p.buyer.tax_id)
                    .push_bind(&p.buyer.email)
                    .push_bind(p.created_at)
                    .push_bind(p.expires_at)
                    .push_bind(*used)
                    .push_bind(*limit);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(insert_error)?;
        }

        tx.commit().await.map_err(backend)?;
        debug!(count = purchases.len(), "inserted purchase batch");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM {} WHERE id = $1",
            self.config.purchases_table()
        );

        let row: Option<PurchaseRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Purchase::try_from).transpose()
    }

    async fn consume_download(&self, log: &DownloadLog) -> Result<ConsumeOutcome, StoreError> {
        let purchases = self.config.purchases_table();
        let logs = self.config.download_logs_table();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let update = format!(
            "UPDATE {purchases} SET downloads_used = downloads_used + 1 \
             WHERE id = $1 \
               AND (download_limit < 0 OR downloads_used < download_limit) \
               AND (expires_at IS NULL OR expires_at > $2) \
             RETURNING {PURCHASE_COLUMNS}"
        );
        let updated: Option<PurchaseRow> = sqlx::query_as(&update)
            .bind(log.purchase_id)
            .bind(log.downloaded_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;

        let Some(updated) = updated else {
            tx.rollback().await.map_err(backend)?;
            return self.classify_refusal(log).await;
        };
        let purchase = Purchase::try_from(updated)?;

        let insert = format!(
            "INSERT INTO {logs} (id, purchase_id, document_id, downloaded_at) \
             VALUES ($1, $2, $3, $4)"
        );
        sqlx::query(&insert)
            .bind(log.id)
            .bind(log.purchase_id)
            .bind(log.document_id)
            .bind(log.downloaded_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        Ok(ConsumeOutcome::Consumed(purchase))
    }

    async fn download_logs(&self, purchase_id: Uuid) -> Result<Vec<DownloadLog>, StoreError> {
        let sql = format!(
            "SELECT id, purchase_id, document_id, downloaded_at FROM {} \
             WHERE purchase_id = $1 ORDER BY downloaded_at ASC, id ASC",
            self.config.download_logs_table()
        );

        let rows: Vec<DownloadLogRow> = sqlx::query_as(&sql)
            .bind(purchase_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> PostgresConfig {
        PostgresConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/vellum_test".to_string()),
            table_prefix: format!("test_{}_", Uuid::new_v4().simple()),
            insert_chunk_size: 2,
            ..PostgresConfig::default()
        }
    }

    #[tokio::test]
    async fn store_conformance() {
        let store = PostgresPurchaseStore::new(test_config())
            .await
            .expect("pool creation should succeed");
        vellum_store::testing::run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }
}
