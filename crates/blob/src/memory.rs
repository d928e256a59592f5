use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;

use crate::error::BlobError;
use crate::store::ObjectStore;
use crate::types::{ObjectMetadata, content_key};

/// In-memory [`ObjectStore`] for development and tests.
///
/// Presigned URLs use a `memory://` scheme and are not fetchable.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, (ObjectMetadata, Bytes)>,
    max_object_size: Option<u64>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes larger than `limit` bytes.
    #[must_use]
    pub fn with_max_object_size(mut self, limit: u64) -> Self {
        self.max_object_size = Some(limit);
        self
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, content_type: &str, data: Bytes) -> Result<ObjectMetadata, BlobError> {
        let size = data.len() as u64;
        if let Some(limit) = self.max_object_size.filter(|limit| size > *limit) {
            return Err(BlobError::TooLarge { size, limit });
        }

        let key = content_key(&data);
        let metadata = ObjectMetadata {
            key: key.clone(),
            content_type: content_type.to_owned(),
            size_bytes: size,
            created_at: Utc::now(),
        };
        self.objects.insert(key, (metadata.clone(), data));
        Ok(metadata)
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        self.objects
            .get(key)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_owned()))
    }

    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.objects.remove(key).is_some())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        if !self.objects.contains_key(key) {
            return Err(BlobError::NotFound(key.to_owned()));
        }
        Ok(format!("memory://{key}?expires_in={}", ttl.as_secs()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
