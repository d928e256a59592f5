use serde::Deserialize;

use vellum_email::{EmailConfig, SmtpConfig};

/// Purchase notification email settings.
///
/// When disabled, new purchases are only written to the log.
#[derive(Deserialize)]
pub struct EmailServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    /// Prefer `VELLUM_SMTP_PASSWORD` over storing this in the file.
    pub password: Option<String>,
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl std::fmt::Debug for EmailServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailServerConfig")
            .field("enabled", &self.enabled)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("from_address", &self.from_address)
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl Default for EmailServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            tls: default_tls(),
            from_address: default_from_address(),
            app_name: default_app_name(),
        }
    }
}

impl EmailServerConfig {
    pub fn to_email_config(&self) -> EmailConfig {
        EmailConfig {
            from_address: self.from_address.clone(),
            app_name: self.app_name.clone(),
            smtp: SmtpConfig {
                smtp_host: self.smtp_host.clone(),
                smtp_port: self.smtp_port,
                username: self.username.clone(),
                password: self.password.clone(),
                tls: self.tls,
            },
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_owned()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_tls() -> bool {
    true
}

fn default_from_address() -> String {
    "noreply@localhost".to_owned()
}

fn default_app_name() -> String {
    "Vellum".to_owned()
}
