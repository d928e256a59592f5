use serde::Deserialize;

/// Configuration for the access audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Whether download and listing attempts are recorded.
    #[serde(default)]
    pub enabled: bool,
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_audit_backend")]
    pub backend: String,
    /// Connection URL for the `postgres` backend.
    pub url: Option<String>,
    /// Table prefix for the audit backend.
    #[serde(default = "default_audit_prefix")]
    pub prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_audit_backend(),
            url: None,
            prefix: default_audit_prefix(),
        }
    }
}

fn default_audit_backend() -> String {
    "memory".to_owned()
}

fn default_audit_prefix() -> String {
    "vellum_".to_owned()
}
