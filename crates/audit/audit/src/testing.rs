//! Behaviour every [`AuditStore`] backend must share.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::AuditError;
use crate::record::{AccessAction, AccessOutcome, AccessRecord};
use crate::store::AuditStore;

/// Run the audit store conformance suite against `store`.
///
/// # Errors
///
/// Returns the first backend error encountered.
pub async fn run_audit_conformance_tests(store: &dyn AuditStore) -> Result<(), AuditError> {
    test_unknown_purchase_is_empty(store).await?;
    test_scoped_and_newest_first(store).await?;
    Ok(())
}

async fn test_unknown_purchase_is_empty(store: &dyn AuditStore) -> Result<(), AuditError> {
    let records = store.query_by_purchase(Uuid::now_v7()).await?;
    assert!(records.is_empty(), "unknown purchase should have no records");
    Ok(())
}

async fn test_scoped_and_newest_first(store: &dyn AuditStore) -> Result<(), AuditError> {
    let purchase = Uuid::now_v7();
    let other = Uuid::now_v7();
    let document = Uuid::now_v7();
    let base = Utc::now();

    let first = AccessRecord::new(
        purchase,
        None,
        AccessAction::Listing,
        AccessOutcome::Delivered,
        base - Duration::minutes(2),
    );
    let second = AccessRecord::new(
        purchase,
        Some(document),
        AccessAction::Download,
        AccessOutcome::Delivered,
        base - Duration::minutes(1),
    );
    let third = AccessRecord::new(
        purchase,
        Some(document),
        AccessAction::Download,
        AccessOutcome::QuotaExceeded,
        base,
    )
    .with_detail("limit 1 reached");
    let unrelated = AccessRecord::new(
        other,
        None,
        AccessAction::Listing,
        AccessOutcome::Expired,
        base,
    );

    // Insert out of order to check sorting.
    store.record(second.clone()).await?;
    store.record(unrelated).await?;
    store.record(third.clone()).await?;
    store.record(first.clone()).await?;

    let records = store.query_by_purchase(purchase).await?;
    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
    assert_eq!(records[0].outcome, AccessOutcome::QuotaExceeded);
    assert_eq!(records[0].detail, "limit 1 reached");
    assert_eq!(records[1].document_id, Some(document));
    assert_eq!(records[2].document_id, None);
    Ok(())
}
