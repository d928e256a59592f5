use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Key the object is stored under.
    pub key: String,
    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// When the object was written.
    pub created_at: DateTime<Utc>,
}

/// Content-addressed key for `data`: the hex `SHA-256` digest, fanned out
/// into a two-character directory (`"ab/abcdef..."`).
pub fn content_key(data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    format!("{}/{digest}", &digest[..2])
}
