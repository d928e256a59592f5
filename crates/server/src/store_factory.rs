use std::sync::Arc;

use vellum_store::{Catalog, PurchaseStore};
use vellum_store_memory::{MemoryCatalog, MemoryPurchaseStore};
#[cfg(feature = "postgres")]
use vellum_store_postgres::{PostgresCatalog, PostgresConfig, PostgresPurchaseStore};

use crate::config::StoreConfig;
use crate::error::ServerError;

/// The purchase store and the catalog it reads offerings and buyers from.
pub struct StoreBackends {
    pub purchases: Arc<dyn PurchaseStore>,
    pub catalog: Arc<dyn Catalog>,
}

/// Create the purchase store and catalog from the given configuration.
///
/// The Postgres backend shares one connection pool between both and runs
/// migrations on connect.
#[allow(clippy::unused_async)]
pub async fn create_store(config: &StoreConfig) -> Result<StoreBackends, ServerError> {
    match config.backend.as_str() {
        "memory" => Ok(StoreBackends {
            purchases: Arc::new(MemoryPurchaseStore::new()),
            catalog: Arc::new(MemoryCatalog::new()),
        }),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let pg_config = postgres_config(config)?;
            let pool = vellum_store_postgres::connect(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("store postgres: {e}")))?;
            let purchases = PostgresPurchaseStore::from_pool(pool.clone(), pg_config.clone())
                .await
                .map_err(|e| ServerError::Config(format!("store postgres: {e}")))?;
            let catalog = PostgresCatalog::from_pool(pool, pg_config);
            Ok(StoreBackends {
                purchases: Arc::new(purchases),
                catalog: Arc::new(catalog),
            })
        }
        other => Err(ServerError::Config(format!(
            "unsupported store backend: {other}"
        ))),
    }
}

#[cfg(feature = "postgres")]
pub(crate) fn postgres_config(config: &StoreConfig) -> Result<PostgresConfig, ServerError> {
    let url = config
        .url
        .clone()
        .ok_or_else(|| ServerError::Config("store postgres backend requires [store] url".into()))?;
    Ok(PostgresConfig {
        url,
        pool_size: config.pool_size,
        schema: config.schema.clone(),
        table_prefix: config.table_prefix.clone(),
        insert_chunk_size: config.insert_chunk_size,
        ssl_mode: config.ssl_mode.clone(),
        ssl_root_cert: config.ssl_root_cert.clone(),
    })
}

/// Create the store tables and exit. A no-op for the memory backend.
#[allow(clippy::unused_async)]
pub async fn migrate_store(config: &StoreConfig) -> Result<(), ServerError> {
    match config.backend.as_str() {
        "memory" => {
            tracing::info!("store backend is memory, nothing to migrate");
            Ok(())
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let pg_config = postgres_config(config)?;
            vellum_store_postgres::connect(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("store postgres: {e}")))?;
            tracing::info!(
                schema = %pg_config.schema,
                prefix = %pg_config.table_prefix,
                "store migrations applied"
            );
            Ok(())
        }
        other => Err(ServerError::Config(format!(
            "unsupported store backend: {other}"
        ))),
    }
}
