use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use vellum_core::{BuyerSnapshot, DownloadLimit, DownloadLog, Purchase};

use crate::error::StoreError;
use crate::store::{ConsumeOutcome, PurchaseStore};

fn test_purchase(expires_at: Option<DateTime<Utc>>, limit: DownloadLimit) -> Purchase {
    Purchase::new(
        Uuid::now_v7(),
        Uuid::now_v7(),
        BuyerSnapshot {
            name: "Conformance Buyer".into(),
            tax_id: "000.000.000-00".into(),
            email: "buyer@example.com".into(),
        },
        Utc::now(),
        expires_at,
        limit,
    )
}

/// Run the full purchase store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    test_get_missing(store).await?;
    test_insert_and_get(store).await?;
    test_batch_is_all_or_nothing(store).await?;
    test_consume_until_limit(store).await?;
    test_consume_expired(store).await?;
    test_consume_unlimited(store).await?;
    test_consume_missing(store).await?;
    test_logs_are_ordered(store).await?;
    test_racing_for_last_download(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let found = store.get(Uuid::now_v7()).await?;
    assert!(found.is_none(), "get on missing id should return None");
    Ok(())
}

async fn test_insert_and_get(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let expires = Utc::now() + Duration::days(30);
    let batch = vec![
        test_purchase(Some(expires), DownloadLimit::Limited(2)),
        test_purchase(None, DownloadLimit::Unlimited),
    ];
    store.insert_batch(&batch).await?;

    for expected in &batch {
        let found = store.get(expected.id).await?;
        let found = found.expect("inserted purchase should be readable");
        assert_eq!(found.id, expected.id);
        assert_eq!(found.buyer, expected.buyer);
        assert_eq!(found.downloads_used, 0);
        assert_eq!(found.download_limit, expected.download_limit);
        assert_eq!(
            found.expires_at.map(|t| t.timestamp()),
            expected.expires_at.map(|t| t.timestamp())
        );
    }
    Ok(())
}

async fn test_batch_is_all_or_nothing(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let existing = test_purchase(None, DownloadLimit::Unlimited);
    store.insert_batch(std::slice::from_ref(&existing)).await?;

    let fresh = test_purchase(None, DownloadLimit::Unlimited);
    let result = store.insert_batch(&[fresh.clone(), existing]).await;
    assert!(
        matches!(result, Err(StoreError::Duplicate(_))),
        "batch with an existing id should fail as duplicate"
    );
    assert!(
        store.get(fresh.id).await?.is_none(),
        "no purchase from a failed batch should be visible"
    );
    Ok(())
}

async fn test_consume_until_limit(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let purchase = test_purchase(
        Some(Utc::now() + Duration::days(30)),
        DownloadLimit::Limited(2),
    );
    store.insert_batch(std::slice::from_ref(&purchase)).await?;
    let document_id = Uuid::now_v7();

    for expected_used in 1..=2 {
        let log = DownloadLog::new(purchase.id, document_id, Utc::now());
        match store.consume_download(&log).await? {
            ConsumeOutcome::Consumed(p) => assert_eq!(p.downloads_used, expected_used),
            other => panic!("expected Consumed, got {other:?}"),
        }
    }

    let log = DownloadLog::new(purchase.id, document_id, Utc::now());
    let outcome = store.consume_download(&log).await?;
    assert_eq!(outcome, ConsumeOutcome::LimitExceeded { limit: 2 });

    let stored = store.get(purchase.id).await?.expect("purchase exists");
    assert_eq!(stored.downloads_used, 2, "denied attempt must not count");
    assert_eq!(store.download_logs(purchase.id).await?.len(), 2);
    Ok(())
}

async fn test_consume_expired(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let since = Utc::now() - Duration::seconds(1);
    let purchase = test_purchase(Some(since), DownloadLimit::Unlimited);
    store.insert_batch(std::slice::from_ref(&purchase)).await?;

    let log = DownloadLog::new(purchase.id, Uuid::now_v7(), Utc::now());
    let outcome = store.consume_download(&log).await?;
    match outcome {
        ConsumeOutcome::Expired { since: got } => {
            assert_eq!(got.timestamp(), since.timestamp());
        }
        other => panic!("expected Expired, got {other:?}"),
    }
    assert!(store.download_logs(purchase.id).await?.is_empty());
    Ok(())
}

async fn test_consume_unlimited(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let purchase = test_purchase(None, DownloadLimit::Unlimited);
    store.insert_batch(std::slice::from_ref(&purchase)).await?;

    for _ in 0..5 {
        let log = DownloadLog::new(purchase.id, Uuid::now_v7(), Utc::now());
        let outcome = store.consume_download(&log).await?;
        assert!(matches!(outcome, ConsumeOutcome::Consumed(_)));
    }
    let stored = store.get(purchase.id).await?.expect("purchase exists");
    assert_eq!(stored.downloads_used, 5);
    Ok(())
}

async fn test_consume_missing(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let log = DownloadLog::new(Uuid::now_v7(), Uuid::now_v7(), Utc::now());
    let outcome = store.consume_download(&log).await?;
    assert_eq!(outcome, ConsumeOutcome::NotFound);
    Ok(())
}

async fn test_logs_are_ordered(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let purchase = test_purchase(None, DownloadLimit::Unlimited);
    store.insert_batch(std::slice::from_ref(&purchase)).await?;

    let start = Utc::now();
    let mut written = Vec::new();
    for i in 0..3 {
        let log = DownloadLog::new(purchase.id, Uuid::now_v7(), start + Duration::seconds(i));
        store.consume_download(&log).await?;
        written.push(log.id);
    }

    let logs = store.download_logs(purchase.id).await?;
    let ids: Vec<Uuid> = logs.iter().map(|l| l.id).collect();
    assert_eq!(ids, written, "logs should be returned oldest first");
    Ok(())
}

async fn test_racing_for_last_download(store: &dyn PurchaseStore) -> Result<(), StoreError> {
    let purchase = test_purchase(None, DownloadLimit::Limited(1));
    store.insert_batch(std::slice::from_ref(&purchase)).await?;

    let first = DownloadLog::new(purchase.id, Uuid::now_v7(), Utc::now());
    let second = DownloadLog::new(purchase.id, Uuid::now_v7(), Utc::now());
    let (a, b) = tokio::join!(
        store.consume_download(&first),
        store.consume_download(&second)
    );
    let outcomes = [a?, b?];

    let consumed = outcomes
        .iter()
        .filter(|o| matches!(o, ConsumeOutcome::Consumed(_)))
        .count();
    let denied = outcomes
        .iter()
        .filter(|o| matches!(o, ConsumeOutcome::LimitExceeded { limit: 1 }))
        .count();
    assert_eq!(consumed, 1, "exactly one racer should win");
    assert_eq!(denied, 1, "the loser should see the limit");

    let stored = store.get(purchase.id).await?.expect("purchase exists");
    assert_eq!(stored.downloads_used, 1);
    assert_eq!(store.download_logs(purchase.id).await?.len(), 1);
    Ok(())
}
