use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use vellum_core::{DEFAULT_VALIDITY_DAYS, DownloadLimit, GrantPolicy, PolicyError};
use vellum_delivery::DeliveryConfig;

use crate::error::ServerError;

/// Purchase defaults and delivery pipeline timeouts.
#[derive(Debug, Deserialize)]
pub struct DeliveryServerConfig {
    /// Validity applied when a batch request leaves `expires_in_days` unset.
    /// `0` means purchases never expire.
    #[serde(default = "default_validity_days")]
    pub default_validity_days: i64,
    /// Cap applied when a batch request leaves `download_limit` unset.
    /// Unlimited when absent.
    #[serde(default)]
    pub default_download_limit: Option<u32>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    #[serde(default = "default_render_timeout")]
    pub render_timeout_seconds: u64,
    /// Scratch directory for rendering. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for DeliveryServerConfig {
    fn default() -> Self {
        Self {
            default_validity_days: default_validity_days(),
            default_download_limit: None,
            fetch_timeout_seconds: default_fetch_timeout(),
            render_timeout_seconds: default_render_timeout(),
            temp_dir: None,
        }
    }
}

impl DeliveryServerConfig {
    /// Build the delivery service settings, rejecting unusable defaults.
    pub fn to_delivery_config(&self, external_url: String) -> Result<DeliveryConfig, ServerError> {
        if self.default_validity_days < 0 {
            return Err(ServerError::Config(
                "[delivery] default_validity_days must not be negative".into(),
            ));
        }

        let download_limit = DownloadLimit::from(self.default_download_limit);
        let default_policy = if self.default_validity_days == 0 {
            GrantPolicy {
                validity: None,
                download_limit,
            }
        } else {
            GrantPolicy::days(self.default_validity_days, download_limit).map_err(policy_error)?
        };
        default_policy.validate().map_err(policy_error)?;
        default_policy.expires_at(Utc::now()).map_err(policy_error)?;

        Ok(DeliveryConfig {
            default_policy,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_seconds),
            render_timeout: Duration::from_secs(self.render_timeout_seconds),
            temp_dir: self.temp_dir.clone(),
            external_url,
        })
    }
}

fn policy_error(e: PolicyError) -> ServerError {
    ServerError::Config(format!("[delivery] unusable default policy: {e}"))
}

fn default_validity_days() -> i64 {
    DEFAULT_VALIDITY_DAYS
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_render_timeout() -> u64 {
    60
}
