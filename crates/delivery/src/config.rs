use std::path::PathBuf;
use std::time::Duration;

use vellum_core::GrantPolicy;

/// Runtime settings for [`DeliveryService`](crate::DeliveryService).
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Policy applied when a batch request leaves expiry or limit unset.
    pub default_policy: GrantPolicy,
    /// Upper bound on fetching a source document.
    pub fetch_timeout: Duration,
    /// Upper bound on stamping a document.
    pub render_timeout: Duration,
    /// Parent directory for per-request scratch space. System temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Public base URL used to build links in notifications.
    pub external_url: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_policy: GrantPolicy::default(),
            fetch_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            temp_dir: None,
            external_url: "http://localhost:8080".to_owned(),
        }
    }
}

impl DeliveryConfig {
    /// Link a buyer follows to reach a purchase.
    pub fn download_url(&self, purchase_id: uuid::Uuid) -> String {
        format!(
            "{}/v1/purchases/{purchase_id}/download",
            self.external_url.trim_end_matches('/')
        )
    }
}
