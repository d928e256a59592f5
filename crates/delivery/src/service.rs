use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tempfile::TempDir;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use vellum_audit::{AccessAction, AccessOutcome, AccessRecord, AuditStore};
use vellum_blob::ObjectStore;
use vellum_core::{
    DownloadLog, Entitlement, GrantPolicy, Offering, Purchase, PurchaseNotice, evaluate,
};
use vellum_store::{Catalog, ConsumeOutcome, PurchaseStore, StoreError};
use vellum_watermark::{RenderCancel, WatermarkError, Watermarker};

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::file::{DeliveredFile, ListedDocument, PurchaseListing, download_file_name};
use crate::notifier::Notifier;

const SOURCE_FILE: &str = "source";
const OUTPUT_FILE: &str = "stamped";

/// Orchestrates purchase creation and gated, watermarked delivery.
///
/// Build one with [`DeliveryServiceBuilder`](crate::DeliveryServiceBuilder).
pub struct DeliveryService {
    pub(crate) store: Arc<dyn PurchaseStore>,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) audit: Option<Arc<dyn AuditStore>>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) watermarker: Arc<Watermarker>,
    pub(crate) config: DeliveryConfig,
    /// Background notification and audit tasks.
    pub(crate) tracker: TaskTracker,
}

impl DeliveryService {
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Create one purchase per buyer for `offering_id`.
    ///
    /// All purchases are persisted together or not at all. Duplicate buyer
    /// ids are collapsed, keeping first-seen order. Buyers are notified in
    /// the background once the batch has committed.
    #[instrument(
        name = "delivery.create_batch",
        skip_all,
        fields(offering.id = %offering_id, buyers = buyer_ids.len())
    )]
    pub async fn create_batch(
        &self,
        offering_id: Uuid,
        buyer_ids: &[Uuid],
        policy: GrantPolicy,
    ) -> Result<Vec<Purchase>, DeliveryError> {
        let buyer_ids = normalize_buyer_ids(buyer_ids)?;
        policy.validate()?;
        let created_at = Utc::now();
        let expires_at = policy.expires_at(created_at)?;

        let offering = self
            .catalog
            .offering(offering_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound("offering".into()))?;

        let buyers: HashMap<Uuid, _> = self
            .catalog
            .buyers(&buyer_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        let missing = buyer_ids.iter().filter(|id| !buyers.contains_key(id)).count();
        if missing > 0 {
            return Err(DeliveryError::NotFound(format!(
                "{missing} of {} buyers",
                buyer_ids.len()
            )));
        }

        let purchases: Vec<Purchase> = buyer_ids
            .iter()
            .filter_map(|id| buyers.get(id))
            .map(|buyer| {
                Purchase::new(
                    offering.id,
                    buyer.id,
                    buyer.snapshot(),
                    created_at,
                    expires_at,
                    policy.download_limit,
                )
            })
            .collect();

        self.store.insert_batch(&purchases).await?;
        info!(
            created = purchases.len(),
            limit = %policy.download_limit,
            "purchase batch created"
        );

        self.notify(offering.id, purchases.iter().map(|p| p.id).collect());
        Ok(purchases)
    }

    /// Deliver a watermarked copy of `document_id` and count the download.
    ///
    /// The download is only counted once the copy has been rendered, and the
    /// copy is only returned once the count has been committed. Scratch files
    /// are removed on every path.
    #[instrument(
        name = "delivery.request_download",
        skip_all,
        fields(purchase.id = %purchase_id, document.id = %document_id)
    )]
    pub async fn request_download(
        &self,
        purchase_id: Uuid,
        document_id: Uuid,
    ) -> Result<DeliveredFile, DeliveryError> {
        let result = self.download(purchase_id, document_id).await;
        self.record_access(purchase_id, Some(document_id), AccessAction::Download, &result);
        result
    }

    /// List the documents a purchase grants, behind the same entitlement
    /// check as downloads.
    #[instrument(name = "delivery.list_documents", skip_all, fields(purchase.id = %purchase_id))]
    pub async fn list_documents(&self, purchase_id: Uuid) -> Result<PurchaseListing, DeliveryError> {
        let result = self.listing(purchase_id).await;
        self.record_access(purchase_id, None, AccessAction::Listing, &result);
        result
    }

    /// Stamp an arbitrary PDF, bounded by the render timeout.
    pub async fn watermark(&self, source: Bytes, identity: String) -> Result<Vec<u8>, DeliveryError> {
        let watermarker = Arc::clone(&self.watermarker);
        self.render(move |cancel| watermarker.stamp_cancellable(&source, &identity, cancel))
            .await
    }

    /// Stop accepting background work and wait up to `timeout` for pending
    /// notifications and audit records. Returns `false` on timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if drained {
            info!("delivery background tasks drained");
        } else {
            warn!(
                pending = self.tracker.len(),
                "delivery background tasks still running at shutdown"
            );
        }
        drained
    }

    async fn download(
        &self,
        purchase_id: Uuid,
        document_id: Uuid,
    ) -> Result<DeliveredFile, DeliveryError> {
        let purchase = self.entitled_purchase(purchase_id).await?;
        let offering = self.offering_of(&purchase).await?;
        let document = offering
            .document(document_id)
            .ok_or_else(|| DeliveryError::NotFound("document".into()))?;
        if !document.is_watermarkable() {
            return Err(DeliveryError::Render(format!(
                "media type {} cannot be watermarked",
                document.media_type
            )));
        }

        let scratch = self.scratch_dir()?;
        let source_path = scratch.path().join(SOURCE_FILE);
        let output_path = scratch.path().join(OUTPUT_FILE);

        let source = tokio::time::timeout(
            self.config.fetch_timeout,
            self.objects.fetch(&document.storage_key),
        )
        .await
        .map_err(|_| DeliveryError::Upstream("timed out fetching document".into()))?
        .map_err(|e| {
            error!(error = %e, "document fetch failed");
            DeliveryError::Upstream("document content unavailable".into())
        })?;
        tokio::fs::write(&source_path, &source)
            .await
            .map_err(scratch_failure)?;
        debug!(bytes = source.len(), "source document fetched");

        let watermarker = Arc::clone(&self.watermarker);
        let identity = purchase.buyer.watermark_text();
        let (src, dst) = (source_path.clone(), output_path.clone());
        let written = self
            .render(move |cancel| watermarker.stamp_file(&src, &dst, &identity, cancel))
            .await?;
        let content = tokio::fs::read(&output_path)
            .await
            .map_err(scratch_failure)?;
        debug!(bytes = written, "document stamped");

        let log = DownloadLog::new(purchase.id, document.id, Utc::now());
        let purchase = match self.store.consume_download(&log).await {
            Ok(ConsumeOutcome::Consumed(purchase)) => purchase,
            Ok(ConsumeOutcome::Expired { since }) => {
                return Err(DeliveryError::Expired { expired_at: since });
            }
            Ok(ConsumeOutcome::LimitExceeded { limit }) => {
                return Err(DeliveryError::QuotaExceeded { limit });
            }
            Ok(ConsumeOutcome::NotFound) => {
                return Err(DeliveryError::NotFound("purchase".into()));
            }
            Err(e) => {
                error!(error = %e, "failed to record download, discarding rendered copy");
                return Err(DeliveryError::Upstream("failed to record download".into()));
            }
        };

        info!(
            downloads_used = purchase.downloads_used,
            limit = %purchase.download_limit,
            "document delivered"
        );
        Ok(DeliveredFile {
            content: Bytes::from(content),
            file_name: download_file_name(&document.file_name, log.downloaded_at),
            media_type: document.media_type.clone(),
            purchase,
        })
    }

    async fn listing(&self, purchase_id: Uuid) -> Result<PurchaseListing, DeliveryError> {
        let purchase = self.entitled_purchase(purchase_id).await?;
        let offering = self.offering_of(&purchase).await?;
        Ok(PurchaseListing {
            purchase_id: purchase.id,
            offering_id: offering.id,
            offering_title: offering.title.clone(),
            documents: offering.documents.iter().map(ListedDocument::from).collect(),
            downloads_used: purchase.downloads_used,
            remaining_downloads: purchase.remaining_downloads(),
            expires_at: purchase.expires_at,
        })
    }

    /// Load a purchase and reject it unless it permits another download.
    async fn entitled_purchase(&self, purchase_id: Uuid) -> Result<Purchase, DeliveryError> {
        let purchase = self
            .store
            .get(purchase_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound("purchase".into()))?;

        match evaluate(&purchase, Utc::now()) {
            Entitlement::Allowed => Ok(purchase),
            Entitlement::Expired { since } => Err(DeliveryError::Expired { expired_at: since }),
            Entitlement::LimitExceeded { limit } => Err(DeliveryError::QuotaExceeded { limit }),
        }
    }

    async fn offering_of(&self, purchase: &Purchase) -> Result<Offering, DeliveryError> {
        self.catalog
            .offering(purchase.offering_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound("offering".into()))
    }

    fn scratch_dir(&self) -> Result<TempDir, DeliveryError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vellum-");
        let dir = match self.config.temp_dir {
            Some(ref parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(scratch_failure)
    }

    /// Run `job` on the blocking pool under the render timeout.
    ///
    /// The job is cancelled when the timeout fires or this future is dropped.
    async fn render<T, F>(&self, job: F) -> Result<T, DeliveryError>
    where
        T: Send + 'static,
        F: FnOnce(&RenderCancel) -> Result<T, WatermarkError> + Send + 'static,
    {
        let cancel = RenderCancel::new();
        let _guard = cancel.guard();
        let task = tokio::task::spawn_blocking(move || job(&cancel));
        let joined = tokio::time::timeout(self.config.render_timeout, task)
            .await
            .map_err(|_| DeliveryError::Upstream("watermark engine timed out".into()))?;
        let rendered = joined.map_err(|e| {
            error!(error = %e, "render task aborted");
            DeliveryError::Upstream("watermark engine failed".into())
        })?;
        Ok(rendered?)
    }

    /// Reload the committed purchases and notify their buyers in the
    /// background.
    fn notify(&self, offering_id: Uuid, purchase_ids: Vec<Uuid>) {
        let store = Arc::clone(&self.store);
        let catalog = Arc::clone(&self.catalog);
        let notifier = Arc::clone(&self.notifier);
        let config = self.config.clone();
        self.tracker.spawn(async move {
            let notices = match committed_notices(
                store.as_ref(),
                catalog.as_ref(),
                &config,
                offering_id,
                &purchase_ids,
            )
            .await
            {
                Ok(notices) => notices,
                Err(e) => {
                    warn!(error = %e, "could not reload purchases for notification");
                    return;
                }
            };
            match notifier.notify_purchases(&notices).await {
                Ok(()) => debug!(count = notices.len(), "purchase notifications sent"),
                Err(e) => warn!(error = %e, "purchase notification failed"),
            }
        });
    }

    fn record_access<T>(
        &self,
        purchase_id: Uuid,
        document_id: Option<Uuid>,
        action: AccessAction,
        result: &Result<T, DeliveryError>,
    ) {
        let Some(ref audit) = self.audit else {
            return;
        };
        let (outcome, detail) = match result {
            Ok(_) => (AccessOutcome::Delivered, String::new()),
            Err(e) => (access_outcome(e), e.to_string()),
        };
        let record = AccessRecord::new(purchase_id, document_id, action, outcome, Utc::now())
            .with_detail(detail);

        let audit = Arc::clone(audit);
        self.tracker.spawn(async move {
            if let Err(e) = audit.record(record).await {
                warn!(error = %e, "access audit recording failed");
            }
        });
    }
}

fn access_outcome(error: &DeliveryError) -> AccessOutcome {
    match error {
        DeliveryError::Expired { .. } => AccessOutcome::Expired,
        DeliveryError::QuotaExceeded { .. } => AccessOutcome::QuotaExceeded,
        DeliveryError::NotFound(_) => AccessOutcome::NotFound,
        DeliveryError::Upstream(_) | DeliveryError::Render(_) | DeliveryError::Validation(_) => {
            AccessOutcome::Failed
        }
    }
}

/// Build notices from the stored rows of a committed batch.
async fn committed_notices(
    store: &dyn PurchaseStore,
    catalog: &dyn Catalog,
    config: &DeliveryConfig,
    offering_id: Uuid,
    purchase_ids: &[Uuid],
) -> Result<Vec<PurchaseNotice>, StoreError> {
    let Some(offering) = catalog.offering(offering_id).await? else {
        warn!(offering.id = %offering_id, "offering vanished before notification");
        return Ok(Vec::new());
    };
    let mut notices = Vec::with_capacity(purchase_ids.len());
    for id in purchase_ids {
        let Some(purchase) = store.get(*id).await? else {
            warn!(purchase.id = %id, "committed purchase not found, skipping notice");
            continue;
        };
        notices.push(PurchaseNotice {
            purchase_id: purchase.id,
            buyer_name: purchase.buyer.name,
            buyer_email: purchase.buyer.email,
            offering_title: offering.title.clone(),
            document_count: offering.documents.len(),
            download_url: config.download_url(purchase.id),
        });
    }
    Ok(notices)
}

fn scratch_failure(e: std::io::Error) -> DeliveryError {
    error!(error = %e, "scratch file operation failed");
    DeliveryError::Upstream("scratch space unavailable".into())
}

/// Reject empty or nil ids and collapse duplicates, keeping first-seen order.
fn normalize_buyer_ids(ids: &[Uuid]) -> Result<Vec<Uuid>, DeliveryError> {
    if ids.is_empty() {
        return Err(DeliveryError::Validation("buyer list is empty".into()));
    }
    if ids.iter().any(Uuid::is_nil) {
        return Err(DeliveryError::Validation("buyer ids must not be nil".into()));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    Ok(ids.iter().copied().filter(|id| seen.insert(*id)).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use vellum_audit_memory::MemoryAuditStore;
    use vellum_blob::MemoryObjectStore;
    use vellum_core::{Buyer, Document, DownloadLimit, MAX_DOWNLOAD_LIMIT, PDF_MEDIA_TYPE};
    use vellum_store_memory::{MemoryCatalog, MemoryPurchaseStore};
    use vellum_watermark::testing::sample_pdf;

    use super::*;
    use crate::builder::DeliveryServiceBuilder;
    use crate::error::NotifyError;

    // -- Recording notifier ---------------------------------------------------

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<PurchaseNotice>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_purchases(&self, notices: &[PurchaseNotice]) -> Result<(), NotifyError> {
            self.notices.lock().unwrap().extend_from_slice(notices);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify_purchases(&self, _: &[PurchaseNotice]) -> Result<(), NotifyError> {
            Err(NotifyError("smtp down".into()))
        }
    }

    // -- Store whose commits always fail ---------------------------------------

    struct CommitFailingStore {
        inner: Arc<MemoryPurchaseStore>,
    }

    #[async_trait]
    impl PurchaseStore for CommitFailingStore {
        async fn insert_batch(&self, purchases: &[Purchase]) -> Result<(), StoreError> {
            self.inner.insert_batch(purchases).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
            self.inner.get(id).await
        }

        async fn consume_download(&self, _: &DownloadLog) -> Result<ConsumeOutcome, StoreError> {
            Err(StoreError::Connection("connection reset".into()))
        }

        async fn download_logs(&self, purchase_id: Uuid) -> Result<Vec<DownloadLog>, StoreError> {
            self.inner.download_logs(purchase_id).await
        }
    }

    // -- Fixture --------------------------------------------------------------

    struct Fixture {
        service: Arc<DeliveryService>,
        store: Arc<MemoryPurchaseStore>,
        audit: Arc<MemoryAuditStore>,
        notifier: Arc<RecordingNotifier>,
        offering: Offering,
        buyers: Vec<Buyer>,
    }

    impl Fixture {
        fn pdf(&self) -> &Document {
            &self.offering.documents[0]
        }

        fn broken(&self) -> &Document {
            &self.offering.documents[1]
        }

        /// Insert a purchase directly, bypassing batch validation.
        async fn seed(
            &self,
            expires_at: Option<DateTime<Utc>>,
            used: u32,
            limit: DownloadLimit,
        ) -> Purchase {
            let buyer = &self.buyers[0];
            let mut purchase = Purchase::new(
                self.offering.id,
                buyer.id,
                buyer.snapshot(),
                Utc::now() - ChronoDuration::days(1),
                expires_at,
                limit,
            );
            purchase.downloads_used = used;
            self.store
                .insert_batch(std::slice::from_ref(&purchase))
                .await
                .unwrap();
            purchase
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(|store| store as Arc<dyn PurchaseStore>).await
    }

    async fn fixture_with(
        wrap: impl FnOnce(Arc<MemoryPurchaseStore>) -> Arc<dyn PurchaseStore>,
    ) -> Fixture {
        fixture_configured(DeliveryConfig::default(), wrap).await
    }

    async fn fixture_configured(
        config: DeliveryConfig,
        wrap: impl FnOnce(Arc<MemoryPurchaseStore>) -> Arc<dyn PurchaseStore>,
    ) -> Fixture {
        let store = Arc::new(MemoryPurchaseStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let audit = Arc::new(MemoryAuditStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let pdf = objects
            .put(PDF_MEDIA_TYPE, Bytes::from(sample_pdf(3)))
            .await
            .unwrap();
        let garbage = objects
            .put(PDF_MEDIA_TYPE, Bytes::from_static(b"not a pdf at all"))
            .await
            .unwrap();

        let offering = Offering {
            id: Uuid::now_v7(),
            title: "Tax Guide".into(),
            creator_name: "Carla".into(),
            documents: vec![
                Document {
                    id: Uuid::now_v7(),
                    storage_key: pdf.key,
                    file_name: "guide.pdf".into(),
                    size_bytes: pdf.size_bytes,
                    media_type: PDF_MEDIA_TYPE.into(),
                },
                Document {
                    id: Uuid::now_v7(),
                    storage_key: garbage.key,
                    file_name: "broken.pdf".into(),
                    size_bytes: garbage.size_bytes,
                    media_type: PDF_MEDIA_TYPE.into(),
                },
            ],
        };
        catalog.insert_offering(offering.clone());

        let buyers: Vec<Buyer> = ["ana", "bruno", "carla"]
            .iter()
            .map(|name| Buyer {
                id: Uuid::now_v7(),
                name: (*name).into(),
                tax_id: "123.456.789-00".into(),
                email: format!("{name}@example.com"),
            })
            .collect();
        for buyer in &buyers {
            catalog.insert_buyer(buyer.clone());
        }

        let service = DeliveryServiceBuilder::new()
            .store(wrap(Arc::clone(&store)))
            .catalog(catalog)
            .objects(objects)
            .audit(audit.clone())
            .notifier(notifier.clone())
            .config(DeliveryConfig {
                external_url: "https://shop.example.com".into(),
                ..config
            })
            .build()
            .unwrap();

        Fixture {
            service: Arc::new(service),
            store,
            audit,
            notifier,
            offering,
            buyers,
        }
    }

    fn ids(buyers: &[Buyer]) -> Vec<Uuid> {
        buyers.iter().map(|b| b.id).collect()
    }

    async fn drain(service: &DeliveryService) {
        assert!(service.shutdown(Duration::from_secs(5)).await);
    }

    // -- Batch creation -------------------------------------------------------

    #[tokio::test]
    async fn batch_then_downloads_until_limit() {
        let fx = fixture().await;
        let policy = GrantPolicy::days(30, DownloadLimit::Limited(2)).unwrap();
        let purchases = fx
            .service
            .create_batch(fx.offering.id, &ids(&fx.buyers), policy)
            .await
            .unwrap();

        assert_eq!(purchases.len(), 3);
        for (purchase, buyer) in purchases.iter().zip(&fx.buyers) {
            assert_eq!(purchase.buyer_id, buyer.id);
            assert_eq!(purchase.downloads_used, 0);
            let days = (purchase.expires_at.unwrap() - purchase.created_at).num_days();
            assert_eq!(days, 30);
        }

        let first = &purchases[0];
        let doc = fx.pdf().id;
        let one = fx.service.request_download(first.id, doc).await.unwrap();
        assert_eq!(one.purchase.downloads_used, 1);
        let two = fx.service.request_download(first.id, doc).await.unwrap();
        assert_eq!(two.purchase.downloads_used, 2);
        let err = fx.service.request_download(first.id, doc).await.unwrap_err();
        assert!(matches!(err, DeliveryError::QuotaExceeded { limit: 2 }));

        let stored = fx.store.get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 2);
        assert_eq!(fx.store.download_logs(first.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_without_writes() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_batch(fx.offering.id, &[], GrantPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Validation(_)));
        assert!(fx.store.is_empty());
        drain(&fx.service).await;
        assert!(fx.notifier.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn nil_buyer_id_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_batch(fx.offering.id, &[fx.buyers[0].id, Uuid::nil()], GrantPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Validation(_)));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_and_negative_validity_are_rejected() {
        let fx = fixture().await;
        let buyers = ids(&fx.buyers);
        for policy in [
            GrantPolicy::days(30, DownloadLimit::Limited(0)).unwrap(),
            GrantPolicy::days(-1, DownloadLimit::Unlimited).unwrap(),
            GrantPolicy::days(30, DownloadLimit::Limited(MAX_DOWNLOAD_LIMIT + 1)).unwrap(),
        ] {
            let err = fx
                .service
                .create_batch(fx.offering.id, &buyers, policy)
                .await
                .unwrap_err();
            assert!(matches!(err, DeliveryError::Validation(_)));
        }
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn expiry_past_calendar_range_is_rejected() {
        let fx = fixture().await;
        let policy = GrantPolicy::days(100_000_000, DownloadLimit::Unlimited).unwrap();
        let handle = {
            let service = Arc::clone(&fx.service);
            let offering = fx.offering.id;
            let buyers = ids(&fx.buyers);
            tokio::spawn(async move { service.create_batch(offering, &buyers, policy).await })
        };
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, DeliveryError::Validation(msg) if msg.contains("date range")));
        assert!(fx.store.is_empty());
        drain(&fx.service).await;
        assert!(fx.notifier.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_buyers_are_collapsed() {
        let fx = fixture().await;
        let a = fx.buyers[0].id;
        let b = fx.buyers[1].id;
        let purchases = fx
            .service
            .create_batch(fx.offering.id, &[a, b, a], GrantPolicy::default())
            .await
            .unwrap();
        let buyers: Vec<Uuid> = purchases.iter().map(|p| p.buyer_id).collect();
        assert_eq!(buyers, vec![a, b]);
        assert_eq!(fx.store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_buyer_fails_whole_batch() {
        let fx = fixture().await;
        let mut buyers = ids(&fx.buyers);
        buyers.push(Uuid::now_v7());
        let err = fx
            .service
            .create_batch(fx.offering.id, &buyers, GrantPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound(ref m) if m.starts_with("1 of 4")));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn unknown_offering_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_batch(Uuid::now_v7(), &ids(&fx.buyers), GrantPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_enqueues_notifications() {
        let fx = fixture().await;
        let purchases = fx
            .service
            .create_batch(fx.offering.id, &ids(&fx.buyers), GrantPolicy::default())
            .await
            .unwrap();
        drain(&fx.service).await;

        let notices = fx.notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 3);
        assert_eq!(notices[0].purchase_id, purchases[0].id);
        assert_eq!(notices[0].buyer_email, "ana@example.com");
        assert_eq!(notices[0].offering_title, "Tax Guide");
        assert_eq!(notices[0].document_count, 2);
        assert_eq!(
            notices[0].download_url,
            format!(
                "https://shop.example.com/v1/purchases/{}/download",
                purchases[0].id
            )
        );
    }

    /// Lowercases buyer emails on insert, like a column with a normalizing
    /// trigger.
    struct LowercasingStore {
        inner: Arc<MemoryPurchaseStore>,
    }

    #[async_trait]
    impl PurchaseStore for LowercasingStore {
        async fn insert_batch(&self, purchases: &[Purchase]) -> Result<(), StoreError> {
            let stored: Vec<Purchase> = purchases
                .iter()
                .cloned()
                .map(|mut p| {
                    p.buyer.email = p.buyer.email.to_lowercase();
                    p
                })
                .collect();
            self.inner.insert_batch(&stored).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
            self.inner.get(id).await
        }

        async fn consume_download(&self, log: &DownloadLog) -> Result<ConsumeOutcome, StoreError> {
            self.inner.consume_download(log).await
        }

        async fn download_logs(&self, purchase_id: Uuid) -> Result<Vec<DownloadLog>, StoreError> {
            self.inner.download_logs(purchase_id).await
        }
    }

    #[tokio::test]
    async fn notices_use_committed_rows() {
        let catalog = Arc::new(MemoryCatalog::new());
        let offering = Offering {
            id: Uuid::now_v7(),
            title: "Guide".into(),
            creator_name: "Carla".into(),
            documents: Vec::new(),
        };
        let buyer = Buyer {
            id: Uuid::now_v7(),
            name: "Dora".into(),
            tax_id: "1".into(),
            email: "Dora@Example.COM".into(),
        };
        catalog.insert_offering(offering.clone());
        catalog.insert_buyer(buyer.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = DeliveryServiceBuilder::new()
            .store(Arc::new(LowercasingStore {
                inner: Arc::new(MemoryPurchaseStore::new()),
            }))
            .catalog(catalog)
            .objects(Arc::new(MemoryObjectStore::new()))
            .notifier(notifier.clone())
            .build()
            .unwrap();

        let purchases = service
            .create_batch(offering.id, &[buyer.id], GrantPolicy::default())
            .await
            .unwrap();
        assert_eq!(purchases[0].buyer.email, "Dora@Example.COM");
        drain(&service).await;

        let notices = notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].purchase_id, purchases[0].id);
        assert_eq!(notices[0].buyer_email, "dora@example.com");
        assert_eq!(notices[0].offering_title, "Guide");
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_batch() {
        let store = Arc::new(MemoryPurchaseStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let offering = Offering {
            id: Uuid::now_v7(),
            title: "Guide".into(),
            creator_name: "Carla".into(),
            documents: Vec::new(),
        };
        let buyer = Buyer {
            id: Uuid::now_v7(),
            name: "Ana".into(),
            tax_id: "1".into(),
            email: "ana@example.com".into(),
        };
        catalog.insert_offering(offering.clone());
        catalog.insert_buyer(buyer.clone());
        let service = DeliveryServiceBuilder::new()
            .store(store.clone())
            .catalog(catalog)
            .objects(Arc::new(MemoryObjectStore::new()))
            .notifier(Arc::new(FailingNotifier))
            .build()
            .unwrap();

        let purchases = service
            .create_batch(offering.id, &[buyer.id], GrantPolicy::default())
            .await
            .unwrap();
        assert_eq!(purchases.len(), 1);
        drain(&service).await;
        assert_eq!(store.len(), 1);
    }

    // -- Downloads ------------------------------------------------------------

    #[tokio::test]
    async fn delivered_file_is_stamped_and_named() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 0, DownloadLimit::Unlimited).await;
        let file = fx
            .service
            .request_download(purchase.id, fx.pdf().id)
            .await
            .unwrap();

        assert_eq!(file.media_type, PDF_MEDIA_TYPE);
        assert!(file.file_name.starts_with("guide_"));
        assert!(file.file_name.ends_with(".pdf"));
        let doc = lopdf::Document::load_mem(&file.content).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_ne!(file.content.as_ref(), sample_pdf(3).as_slice());
    }

    #[tokio::test]
    async fn expired_purchase_is_refused_before_fetch() {
        let fx = fixture().await;
        let expired_at = Utc::now() - ChronoDuration::seconds(1);
        let purchase = fx.seed(Some(expired_at), 0, DownloadLimit::Unlimited).await;

        let err = fx
            .service
            .request_download(purchase.id, fx.pdf().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Expired { .. }));
        let stored = fx.store.get(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 0);
    }

    #[tokio::test]
    async fn expiry_wins_over_quota() {
        let fx = fixture().await;
        let expired_at = Utc::now() - ChronoDuration::days(3);
        let purchase = fx.seed(Some(expired_at), 2, DownloadLimit::Limited(2)).await;
        let err = fx
            .service
            .request_download(purchase.id, fx.pdf().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Expired { .. }));
        assert_eq!(err.days_expired(Utc::now()), Some(3));
    }

    #[tokio::test]
    async fn unknown_purchase_and_document() {
        let fx = fixture().await;
        let err = fx
            .service
            .request_download(Uuid::now_v7(), fx.pdf().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound(ref m) if m == "purchase"));

        let purchase = fx.seed(None, 0, DownloadLimit::Limited(1)).await;
        let err = fx
            .service
            .request_download(purchase.id, Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound(ref m) if m == "document"));
        let stored = fx.store.get(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 0);
    }

    #[tokio::test]
    async fn render_failure_does_not_count() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 0, DownloadLimit::Limited(1)).await;
        let err = fx
            .service
            .request_download(purchase.id, fx.broken().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Render(_)));

        let stored = fx.store.get(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 0);
        assert!(fx.store.download_logs(purchase.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_discards_the_copy() {
        let fx =
            fixture_with(|inner| Arc::new(CommitFailingStore { inner }) as Arc<dyn PurchaseStore>)
                .await;
        let purchase = fx.seed(None, 0, DownloadLimit::Limited(1)).await;
        let err = fx
            .service
            .request_download(purchase.id, fx.pdf().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Upstream(_)));
        assert!(!err.to_string().contains("connection reset"));

        let stored = fx.store.get(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 0);
        assert!(fx.store.download_logs(purchase.id).await.unwrap().is_empty());
    }

    fn assert_no_scratch(parent: &std::path::Path) {
        let left: Vec<_> = std::fs::read_dir(parent)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert!(left.is_empty(), "scratch left behind: {left:?}");
    }

    #[tokio::test]
    async fn scratch_space_is_removed_on_every_path() {
        let parent = tempfile::tempdir().unwrap();
        let config = DeliveryConfig {
            temp_dir: Some(parent.path().to_path_buf()),
            ..DeliveryConfig::default()
        };

        let fx = fixture_configured(config.clone(), |store| store as Arc<dyn PurchaseStore>).await;
        let purchase = fx.seed(None, 0, DownloadLimit::Unlimited).await;
        fx.service
            .request_download(purchase.id, fx.pdf().id)
            .await
            .unwrap();
        assert_no_scratch(parent.path());

        let err = fx
            .service
            .request_download(purchase.id, fx.broken().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Render(_)));
        assert_no_scratch(parent.path());

        let failing = fixture_configured(config, |inner| {
            Arc::new(CommitFailingStore { inner }) as Arc<dyn PurchaseStore>
        })
        .await;
        let purchase = failing.seed(None, 0, DownloadLimit::Unlimited).await;
        let err = failing
            .service
            .request_download(purchase.id, failing.pdf().id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Upstream(_)));
        assert_no_scratch(parent.path());
    }

    /// A render job that spins until cancelled, then reports on `done`.
    fn stubborn_job(
        done: std::sync::mpsc::Sender<()>,
    ) -> impl FnOnce(&RenderCancel) -> Result<(), WatermarkError> + Send + 'static {
        move |cancel: &RenderCancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            let _ = done.send(());
            Err(WatermarkError::Cancelled)
        }
    }

    #[tokio::test]
    async fn timed_out_render_is_cancelled() {
        let config = DeliveryConfig {
            render_timeout: Duration::from_millis(20),
            ..DeliveryConfig::default()
        };
        let fx = fixture_configured(config, |store| store as Arc<dyn PurchaseStore>).await;
        let (tx, rx) = std::sync::mpsc::channel();

        let err = fx.service.render(stubborn_job(tx)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Upstream(ref m) if m.contains("timed out")));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[tokio::test]
    async fn abandoned_render_is_cancelled() {
        let fx = fixture().await;
        let (tx, rx) = std::sync::mpsc::channel();

        let render = fx.service.render(stubborn_job(tx));
        assert!(
            tokio::time::timeout(Duration::from_millis(20), render)
                .await
                .is_err()
        );
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[tokio::test]
    async fn last_download_race_has_one_winner() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 1, DownloadLimit::Limited(2)).await;
        let doc = fx.pdf().id;

        let (a, b) = tokio::join!(
            fx.service.request_download(purchase.id, doc),
            fx.service.request_download(purchase.id, doc),
        );
        let results = [a, b];
        let delivered = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(DeliveryError::QuotaExceeded { limit: 2 })))
            .count();
        assert_eq!((delivered, refused), (1, 1));

        let stored = fx.store.get(purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.downloads_used, 2);
        assert_eq!(fx.store.download_logs(purchase.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_pdf_documents_are_refused() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 0, DownloadLimit::Unlimited).await;
        let mut offering = fx.offering.clone();
        offering.documents[0].media_type = "image/png".into();
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_offering(offering.clone());
        let service = DeliveryServiceBuilder::new()
            .store(fx.store.clone())
            .catalog(catalog)
            .objects(Arc::new(MemoryObjectStore::new()))
            .build()
            .unwrap();
        let err = service
            .request_download(purchase.id, offering.documents[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Render(ref m) if m.contains("image/png")));
    }

    // -- Listing & audit ------------------------------------------------------

    #[tokio::test]
    async fn listing_reports_documents_and_quota() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 1, DownloadLimit::Limited(3)).await;
        let listing = fx.service.list_documents(purchase.id).await.unwrap();
        assert_eq!(listing.offering_title, "Tax Guide");
        assert_eq!(listing.documents.len(), 2);
        assert_eq!(listing.documents[0].file_name, "guide.pdf");
        assert_eq!(listing.downloads_used, 1);
        assert_eq!(listing.remaining_downloads, Some(2));
    }

    #[tokio::test]
    async fn listing_is_gated_by_expiry() {
        let fx = fixture().await;
        let purchase = fx
            .seed(
                Some(Utc::now() - ChronoDuration::seconds(1)),
                0,
                DownloadLimit::Unlimited,
            )
            .await;
        let err = fx.service.list_documents(purchase.id).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Expired { .. }));
    }

    #[tokio::test]
    async fn access_attempts_are_audited() {
        let fx = fixture().await;
        let purchase = fx.seed(None, 0, DownloadLimit::Limited(1)).await;
        let doc = fx.pdf().id;
        fx.service.list_documents(purchase.id).await.unwrap();
        fx.service.request_download(purchase.id, doc).await.unwrap();
        let _ = fx.service.request_download(purchase.id, doc).await;
        drain(&fx.service).await;

        let records = fx.audit.query_by_purchase(purchase.id).await.unwrap();
        let outcomes: Vec<(AccessAction, AccessOutcome)> =
            records.iter().map(|r| (r.action, r.outcome)).collect();
        assert_eq!(
            outcomes,
            vec![
                (AccessAction::Download, AccessOutcome::QuotaExceeded),
                (AccessAction::Download, AccessOutcome::Delivered),
                (AccessAction::Listing, AccessOutcome::Delivered),
            ]
        );
        assert_eq!(records[0].document_id, Some(doc));
        assert_eq!(records[2].document_id, None);
    }

    #[tokio::test]
    async fn standalone_watermark() {
        let fx = fixture().await;
        let stamped = fx
            .service
            .watermark(Bytes::from(sample_pdf(2)), "Ana - 1 - ana@example.com".into())
            .await
            .unwrap();
        assert_eq!(lopdf::Document::load_mem(&stamped).unwrap().get_pages().len(), 2);

        let err = fx
            .service
            .watermark(Bytes::from_static(b"%PDF-garbage"), "Ana".into())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Render(_)));
    }
}
