use serde::{Deserialize, Serialize};

/// Connection settings for an SMTP relay.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub smtp_host: String,

    /// Defaults to 587 (STARTTLS submission port).
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Use STARTTLS. Defaults to `true`.
    #[serde(default = "default_tls")]
    pub tls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_tls() -> bool {
    true
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_owned(),
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            tls: default_tls(),
        }
    }
}

/// Sender identity plus transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// `From` address of outgoing email.
    pub from_address: String,

    /// Product name shown in the email body.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(flatten)]
    pub smtp: SmtpConfig,
}

fn default_app_name() -> String {
    "Vellum".to_owned()
}

impl EmailConfig {
    pub fn new(smtp_host: impl Into<String>, from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            app_name: default_app_name(),
            smtp: SmtpConfig {
                smtp_host: smtp_host.into(),
                ..SmtpConfig::default()
            },
        }
    }
}
