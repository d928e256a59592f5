use std::sync::Arc;

use tokio_util::task::TaskTracker;

use vellum_audit::AuditStore;
use vellum_blob::ObjectStore;
use vellum_store::{Catalog, PurchaseStore};
use vellum_watermark::Watermarker;

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::notifier::{LoggingNotifier, Notifier};
use crate::service::DeliveryService;

/// Fluent builder for [`DeliveryService`].
///
/// A purchase store, a catalog and an object store are required. The
/// notifier defaults to [`LoggingNotifier`]; auditing is off unless an
/// audit store is supplied.
#[derive(Default)]
pub struct DeliveryServiceBuilder {
    store: Option<Arc<dyn PurchaseStore>>,
    catalog: Option<Arc<dyn Catalog>>,
    objects: Option<Arc<dyn ObjectStore>>,
    audit: Option<Arc<dyn AuditStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    watermarker: Option<Watermarker>,
    config: DeliveryConfig,
}

impl DeliveryServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn PurchaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn objects(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Record every download and listing attempt.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(audit);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Override the default watermark style.
    #[must_use]
    pub fn watermarker(mut self, watermarker: Watermarker) -> Self {
        self.watermarker = Some(watermarker);
        self
    }

    #[must_use]
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DeliveryService, DeliveryError> {
        let store = self
            .store
            .ok_or_else(|| DeliveryError::Validation("purchase store is required".into()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| DeliveryError::Validation("catalog is required".into()))?;
        let objects = self
            .objects
            .ok_or_else(|| DeliveryError::Validation("object store is required".into()))?;

        Ok(DeliveryService {
            store,
            catalog,
            objects,
            audit: self.audit,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(LoggingNotifier)),
            watermarker: Arc::new(self.watermarker.unwrap_or_default()),
            config: self.config,
            tracker: TaskTracker::new(),
        })
    }
}
