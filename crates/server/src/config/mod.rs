mod audit;
mod blob;
mod delivery;
mod email;
mod server;
mod store;
mod telemetry;


pub use audit::*;
pub use blob::*;
pub use delivery::*;
pub use email::*;
pub use server::*;
pub use store::*;
pub use telemetry::*;

use serde::Deserialize;

/// Top-level configuration for the Vellum server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct VellumConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Purchase store and catalog backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Access audit trail.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Where document bytes live.
    #[serde(default)]
    pub blob: BlobConfig,
    /// Purchase notification email.
    #[serde(default)]
    pub email: EmailServerConfig,
    /// Purchase defaults and pipeline timeouts.
    #[serde(default)]
    pub delivery: DeliveryServerConfig,
    /// Log output.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Environment variable overriding `[email] password`.
pub const SMTP_PASSWORD_ENV: &str = "VELLUM_SMTP_PASSWORD";
/// Environment variable overriding `[server] app_key`.
pub const APP_KEY_ENV: &str = "VELLUM_APP_KEY";

impl VellumConfig {
    /// Replace secrets with values from `lookup` when present and non-empty.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(password) = get(SMTP_PASSWORD_ENV) {
            self.email.password = Some(password);
        }
        if let Some(key) = get(APP_KEY_ENV) {
            self.server.app_key = Some(key);
        }
    }

    /// Public base URL used in download links.
    pub fn external_url(&self) -> String {
        self.server
            .external_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port))
    }
}
