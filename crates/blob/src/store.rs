use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::types::ObjectMetadata;

/// Key-addressed storage for document bytes (S3, in-memory, ...).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under its content-addressed key and return its metadata.
    ///
    /// Writing identical bytes twice yields the same key.
    async fn put(&self, content_type: &str, data: Bytes) -> Result<ObjectMetadata, BlobError>;

    /// Fetch the full content of an object.
    ///
    /// Returns [`BlobError::NotFound`] when no object exists under `key`.
    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Delete an object. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, BlobError>;

    /// A time-limited URL granting direct read access to an object.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}
