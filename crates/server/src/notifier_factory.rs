use std::sync::Arc;

use vellum_delivery::{EmailNotifier, LoggingNotifier, Notifier};
use vellum_email::SmtpBackend;

use crate::config::EmailServerConfig;
use crate::error::ServerError;

/// Pick how buyers hear about new purchases: SMTP email when enabled,
/// the log otherwise.
pub fn create_notifier(config: &EmailServerConfig) -> Result<Arc<dyn Notifier>, ServerError> {
    if !config.enabled {
        tracing::info!("email disabled, purchase notices go to the log");
        return Ok(Arc::new(LoggingNotifier));
    }

    let email_config = config.to_email_config();
    let backend = SmtpBackend::new(email_config.smtp.clone())
        .map_err(|e| ServerError::Config(format!("email: {e}")))?;
    tracing::info!(
        smtp_host = %email_config.smtp.smtp_host,
        from = %email_config.from_address,
        "purchase emails enabled"
    );
    Ok(Arc::new(EmailNotifier::new(Arc::new(backend), email_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_uses_log() {
        assert!(create_notifier(&EmailServerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn enabled_builds_smtp() {
        let config = EmailServerConfig {
            enabled: true,
            smtp_host: "smtp.example.com".into(),
            ..EmailServerConfig::default()
        };
        assert!(create_notifier(&config).is_ok());
    }
}
