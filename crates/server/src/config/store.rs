use serde::Deserialize;

/// Purchase store and catalog backend.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// `"memory"` or `"postgres"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Connection URL, required by `postgres`.
    pub url: Option<String>,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    /// Rows per multi-row insert when creating a purchase batch.
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
    /// SSL mode for `PostgreSQL` connections.
    #[serde(default)]
    pub ssl_mode: Option<String>,
    /// Path to the CA certificate for `PostgreSQL` SSL verification.
    #[serde(default)]
    pub ssl_root_cert: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            pool_size: default_pool_size(),
            schema: default_schema(),
            table_prefix: default_table_prefix(),
            insert_chunk_size: default_insert_chunk_size(),
            ssl_mode: None,
            ssl_root_cert: None,
        }
    }
}

fn default_store_backend() -> String {
    "memory".to_owned()
}

fn default_pool_size() -> u32 {
    5
}

fn default_schema() -> String {
    "public".to_owned()
}

fn default_table_prefix() -> String {
    "vellum_".to_owned()
}

fn default_insert_chunk_size() -> usize {
    1000
}
