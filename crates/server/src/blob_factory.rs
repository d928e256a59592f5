use std::sync::Arc;

#[cfg(feature = "s3")]
use vellum_aws::{S3Config, S3ObjectStore};
use vellum_blob::{MemoryObjectStore, ObjectStore};

use crate::config::BlobConfig;
use crate::error::ServerError;

/// Create the object store holding document bytes.
#[allow(clippy::unused_async)]
pub async fn create_object_store(config: &BlobConfig) -> Result<Arc<dyn ObjectStore>, ServerError> {
    let store: Arc<dyn ObjectStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryObjectStore::new()),
        #[cfg(feature = "s3")]
        "s3" => {
            let bucket = config.bucket.as_deref().ok_or_else(|| {
                ServerError::Config("blob s3 backend requires [blob] bucket".into())
            })?;

            let mut s3_config = S3Config::new(&config.region, bucket);
            if let Some(prefix) = &config.prefix {
                s3_config = s3_config.with_prefix(prefix);
            }
            if let Some(endpoint) = &config.endpoint_url {
                s3_config = s3_config.with_endpoint_url(endpoint);
            }

            let store = S3ObjectStore::new(s3_config)
                .await
                .map_err(|e| ServerError::Config(format!("blob s3: {e}")))?;
            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported blob backend: {other}"
            )));
        }
    };

    tracing::info!(backend = store.backend_name(), "object store ready");
    Ok(store)
}
