use serde::Deserialize;

/// Object storage holding document bytes.
#[derive(Debug, Deserialize)]
pub struct BlobConfig {
    /// `"memory"` or `"s3"`.
    #[serde(default = "default_blob_backend")]
    pub backend: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket name, required by `s3`.
    pub bucket: Option<String>,
    /// Key prefix applied to every object.
    pub prefix: Option<String>,
    /// Endpoint of an S3-compatible service (`MinIO`, `LocalStack`).
    pub endpoint_url: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: default_blob_backend(),
            region: default_region(),
            bucket: None,
            prefix: None,
            endpoint_url: None,
        }
    }
}

fn default_blob_backend() -> String {
    "memory".to_owned()
}

fn default_region() -> String {
    "sa-east-1".to_owned()
}
