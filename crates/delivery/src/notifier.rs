use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use vellum_core::PurchaseNotice;
use vellum_email::{EmailBackend, EmailConfig, download_ready};

use crate::error::NotifyError;

/// Tells buyers that new purchases are available.
///
/// Called in the background after a batch commits. Failures are logged by
/// the caller and never undo the batch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_purchases(&self, notices: &[PurchaseNotice]) -> Result<(), NotifyError>;
}

/// Writes each notice to the log. Used when email is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_purchases(&self, notices: &[PurchaseNotice]) -> Result<(), NotifyError> {
        for notice in notices {
            info!(
                purchase.id = %notice.purchase_id,
                offering = %notice.offering_title,
                documents = notice.document_count,
                url = %notice.download_url,
                "purchase ready"
            );
        }
        Ok(())
    }
}

/// Sends one "documents are ready" email per notice.
#[derive(Debug)]
pub struct EmailNotifier {
    backend: Arc<dyn EmailBackend>,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(backend: Arc<dyn EmailBackend>, config: EmailConfig) -> Self {
        Self { backend, config }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_purchases(&self, notices: &[PurchaseNotice]) -> Result<(), NotifyError> {
        let mut failed = 0usize;
        for notice in notices {
            let Some(message) = download_ready(notice, &self.config) else {
                debug!(purchase.id = %notice.purchase_id, "buyer has no email, skipping");
                continue;
            };
            if let Err(e) = self.backend.send(&message).await {
                warn!(
                    purchase.id = %notice.purchase_id,
                    backend = self.backend.backend_name(),
                    error = %e,
                    "purchase email failed"
                );
                failed += 1;
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(NotifyError(format!(
                "{failed} of {} emails failed",
                notices.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use uuid::Uuid;
    use vellum_email::{EmailError, EmailMessage, EmailResult};

    use super::*;

    #[derive(Debug, Default)]
    struct CapturingBackend {
        sent: Mutex<Vec<EmailMessage>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl EmailBackend for CapturingBackend {
        async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
            if self.reject.as_deref() == Some(message.to.as_str()) {
                return Err(EmailError::Permanent("mailbox unavailable".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(EmailResult {
                message_id: None,
                status: "sent".into(),
            })
        }

        async fn health_check(&self) -> Result<(), EmailError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "capturing"
        }
    }

    fn notice(email: &str) -> PurchaseNotice {
        PurchaseNotice {
            purchase_id: Uuid::now_v7(),
            buyer_name: "Ana".into(),
            buyer_email: email.into(),
            offering_title: "Guide".into(),
            document_count: 1,
            download_url: "https://shop.example.com/v1/purchases/x/download".into(),
        }
    }

    fn config() -> EmailConfig {
        EmailConfig::new("smtp.example.com", "noreply@example.com")
    }

    #[tokio::test]
    async fn sends_one_email_per_addressable_notice() {
        let backend = Arc::new(CapturingBackend::default());
        let notifier = EmailNotifier::new(backend.clone(), config());
        notifier
            .notify_purchases(&[notice("a@example.com"), notice(""), notice("b@example.com")])
            .await
            .unwrap();
        let sent = backend.sent.lock().unwrap();
        let to: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(to, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn keeps_going_after_a_failure() {
        let backend = Arc::new(CapturingBackend {
            reject: Some("a@example.com".into()),
            ..CapturingBackend::default()
        });
        let notifier = EmailNotifier::new(backend.clone(), config());
        let err = notifier
            .notify_purchases(&[notice("a@example.com"), notice("b@example.com")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
        assert_eq!(backend.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn logging_notifier_never_fails() {
        assert!(
            LoggingNotifier
                .notify_purchases(&[notice("")])
                .await
                .is_ok()
        );
    }
}
