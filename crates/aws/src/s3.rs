use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use vellum_blob::{BlobError, ObjectMetadata, ObjectStore, content_key};

use crate::auth::build_sdk_config;
use crate::config::AwsBaseConfig;
use crate::error::{AwsError, classify_sdk_error};

/// Configuration for the S3 object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(flatten)]
    pub aws: AwsBaseConfig,

    /// Bucket holding document bytes.
    pub bucket: String,

    /// Key prefix applied to every object (e.g. `"documents/"`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Use path-style addressing, required by most S3-compatible servers.
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            aws: AwsBaseConfig::new(region),
            bucket: bucket.into(),
            prefix: None,
            force_path_style: false,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Point at an S3-compatible endpoint and switch to path-style addressing.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.aws.endpoint_url = Some(endpoint_url.into());
        self.force_path_style = true;
        self
    }
}

/// [`ObjectStore`] backed by an S3 bucket.
pub struct S3ObjectStore {
    config: S3Config,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3ObjectStore {
    /// Build an SDK client from `config`.
    pub async fn new(config: S3Config) -> Result<Self, AwsError> {
        if config.bucket.trim().is_empty() {
            return Err(AwsError::Configuration("bucket must not be empty".into()));
        }
        let sdk_config = build_sdk_config(&config.aws).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);
        Ok(Self { config, client })
    }

    /// Wrap a pre-built client.
    pub fn with_client(config: S3Config, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    fn prefixed_key(&self, key: &str) -> String {
        match &self.config.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_owned(),
        }
    }

    /// Whether the object exists, via `HeadObject`.
    async fn exists(&self, object_key: &str) -> Result<bool, BlobError> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(classify_sdk_error(&e.to_string()).into()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, data), fields(bucket = %self.config.bucket, size = data.len()))]
    async fn put(&self, content_type: &str, data: Bytes) -> Result<ObjectMetadata, BlobError> {
        let key = content_key(&data);
        let object_key = self.prefixed_key(&key);
        let size_bytes = data.len() as u64;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                error!(error = %err_str, "S3 put_object failed");
                BlobError::from(classify_sdk_error(&err_str))
            })?;

        info!(key = %object_key, "S3 object uploaded");
        Ok(ObjectMetadata {
            key,
            content_type: content_type.to_owned(),
            size_bytes,
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        let object_key = self.prefixed_key(key);
        debug!(key = %object_key, "downloading object from S3");

        let result = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return BlobError::NotFound(key.to_owned());
                }
                let err_str = e.to_string();
                error!(error = %err_str, "S3 get_object failed");
                BlobError::from(classify_sdk_error(&err_str))
            })?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Storage(format!("failed to read S3 body: {e}")))?
            .into_bytes();

        debug!(key = %object_key, size = body.len(), "S3 object downloaded");
        Ok(body)
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let object_key = self.prefixed_key(key);
        if !self.exists(&object_key).await? {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                error!(error = %err_str, "S3 delete_object failed");
                BlobError::from(classify_sdk_error(&err_str))
            })?;

        info!(key = %object_key, "S3 object deleted");
        Ok(true)
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| BlobError::Storage(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(self.prefixed_key(key))
            .presigned(presigning)
            .await
            .map_err(|e| BlobError::from(classify_sdk_error(&e.to_string())))?;

        Ok(request.uri().to_owned())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_new_sets_region_and_bucket() {
        let config = S3Config::new("sa-east-1", "ebooks");
        assert_eq!(config.aws.region, "sa-east-1");
        assert_eq!(config.bucket, "ebooks");
        assert!(config.prefix.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn endpoint_override_enables_path_style() {
        let config = S3Config::new("us-east-1", "b").with_endpoint_url("http://localhost:9000");
        assert!(config.force_path_style);
        assert_eq!(
            config.aws.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn config_deserializes_flattened() {
        let config: S3Config = serde_json::from_str(
            r#"{"region":"sa-east-1","bucket":"docs","prefix":"files/"}"#,
        )
        .unwrap();
        assert_eq!(config.aws.region, "sa-east-1");
        assert_eq!(config.prefix.as_deref(), Some("files/"));
    }

    #[tokio::test]
    async fn empty_bucket_is_rejected() {
        let err = S3ObjectStore::new(S3Config::new("sa-east-1", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, AwsError::Configuration(_)));
    }
}
