use std::sync::Arc;

use vellum_audit::AuditStore;
use vellum_audit_memory::MemoryAuditStore;
#[cfg(feature = "postgres")]
use vellum_audit_postgres::{PostgresAuditConfig, PostgresAuditStore};

use crate::config::AuditConfig;
use crate::error::ServerError;

/// Create an audit store from the given configuration.
///
/// Returns `None` when auditing is disabled.
#[allow(clippy::unused_async)]
pub async fn create_audit_store(
    config: &AuditConfig,
) -> Result<Option<Arc<dyn AuditStore>>, ServerError> {
    if !config.enabled {
        return Ok(None);
    }

    let store: Arc<dyn AuditStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryAuditStore::new()),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("audit postgres backend requires [audit] url".into())
            })?;

            let pg_config = PostgresAuditConfig::new(url).with_prefix(&config.prefix);

            let store = PostgresAuditStore::new(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("audit postgres: {e}")))?;

            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported audit backend: {other}"
            )));
        }
    };

    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_yields_none() {
        let store = create_audit_store(&AuditConfig::default()).await.unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn enabled_memory_yields_store() {
        let config = AuditConfig {
            enabled: true,
            ..AuditConfig::default()
        };
        assert!(create_audit_store(&config).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_backend_rejected() {
        let config = AuditConfig {
            enabled: true,
            backend: "clickhouse".into(),
            ..AuditConfig::default()
        };
        assert!(create_audit_store(&config).await.is_err());
    }
}
