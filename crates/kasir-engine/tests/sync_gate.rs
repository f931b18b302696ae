//! Sync idempotency gate: replays, partial failures, and batch status.

mod common;

use chrono::Duration;
use common::*;
use kasir_core::{CoreError, RefType, SyncBatchStatus, SyncOutcome, ValidationError};
use kasir_engine::{EngineError, SyncBatchRequest, SyncTransaction};

fn txn(local_txn_uuid: &str, items: Vec<kasir_core::checkout::CartLine>) -> SyncTransaction {
    SyncTransaction {
        local_txn_uuid: local_txn_uuid.to_string(),
        occurred_at: None,
        checkout: ewallet(items),
    }
}

fn batch(device_id: &str, batch_uuid: &str, transactions: Vec<SyncTransaction>) -> SyncBatchRequest {
    SyncBatchRequest {
        device_id: device_id.to_string(),
        batch_uuid: batch_uuid.to_string(),
        transactions,
    }
}

#[tokio::test]
async fn test_processed_batch_replays_as_empty() {
    let env = setup().await;
    let request = batch(
        "TILL-01",
        "batch-1",
        vec![txn("t-1", vec![line(KOPI, 1)]), txn("t-2", vec![line(ROTI, 2)])],
    );

    let first = env.engine.sync_gate().submit(request.clone(), CASHIER).await.unwrap();
    assert_eq!(first.status, SyncBatchStatus::Processed);
    assert_eq!(first.results.len(), 2);
    assert!(first.results.iter().all(|r| r.status == SyncOutcome::Processed));

    let second = env.engine.sync_gate().submit(request, CASHIER).await.unwrap();
    assert_eq!(second.batch_uuid, "batch-1");
    assert_eq!(second.status, SyncBatchStatus::Processed);
    assert!(second.results.is_empty());

    assert_eq!(env.db().sales().count().await.unwrap(), 2);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
    assert_eq!(env.on_hand(ROTI).await, OPENING_STOCK - 2);
}

#[tokio::test]
async fn test_same_transaction_in_new_batch_is_duplicate() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    let first = gate
        .submit(batch("TILL-01", "batch-1", vec![txn("t-1", vec![line(KOPI, 2)])]), CASHIER)
        .await
        .unwrap();
    let recorded = &first.results[0];

    let second = gate
        .submit(batch("TILL-01", "batch-2", vec![txn("t-1", vec![line(KOPI, 2)])]), CASHIER)
        .await
        .unwrap();

    assert_eq!(second.status, SyncBatchStatus::Processed);
    let replay = &second.results[0];
    assert_eq!(replay.status, SyncOutcome::Duplicate);
    assert_eq!(replay.sale_id, recorded.sale_id);
    assert_eq!(replay.invoice_no, recorded.invoice_no);

    assert_eq!(env.db().sales().count().await.unwrap(), 1);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 2);
}

#[tokio::test]
async fn test_same_uuid_from_another_device_is_a_duplicate() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    gate.submit(batch("TILL-01", "batch-1", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap();

    // Key is device-scoped, but the sale's local_txn_uuid is global
    let other = gate
        .submit(batch("TILL-02", "batch-2", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap();

    assert_eq!(other.results[0].status, SyncOutcome::Duplicate);
    assert_eq!(env.db().sales().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_partial_failure_fails_batch_and_keeps_successes() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    let response = gate
        .submit(
            batch(
                "TILL-01",
                "batch-1",
                vec![txn("t-1", vec![line(KOPI, 1)]), txn("t-2", vec![line("prod-hilang", 1)])],
            ),
            CASHIER,
        )
        .await
        .unwrap();

    assert_eq!(response.status, SyncBatchStatus::Failed);
    assert_eq!(response.results[0].status, SyncOutcome::Processed);
    let failed = &response.results[1];
    assert_eq!(failed.status, SyncOutcome::Failed);
    assert!(failed.sale_id.is_none());
    assert!(failed.errors.as_ref().unwrap().contains_key("items.0.product_id"));

    let stored = gate.batch("batch-1").await.unwrap();
    assert_eq!(stored.status, SyncBatchStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("1 dari 2 transaksi gagal"));
    assert!(stored.processed_at.is_some());

    // No key was written for the failure
    assert!(env.db().sync().get_key("TILL-01:t-2").await.unwrap().is_none());
    assert!(env.db().sync().get_key("TILL-01:t-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_batch_can_be_resubmitted() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    gate.submit(
        batch(
            "TILL-01",
            "batch-1",
            vec![txn("t-1", vec![line(KOPI, 1)]), txn("t-2", vec![line(ROTI, OPENING_STOCK + 5)])],
        ),
        CASHIER,
    )
    .await
    .unwrap();

    let retry = gate
        .submit(
            batch(
                "TILL-01",
                "batch-1",
                vec![txn("t-1", vec![line(KOPI, 1)]), txn("t-2", vec![line(ROTI, 1)])],
            ),
            CASHIER,
        )
        .await
        .unwrap();

    assert_eq!(retry.status, SyncBatchStatus::Processed);
    assert_eq!(retry.results[0].status, SyncOutcome::Duplicate);
    assert_eq!(retry.results[1].status, SyncOutcome::Processed);
    assert_eq!(env.db().sales().count().await.unwrap(), 2);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
    assert_eq!(env.on_hand(ROTI).await, OPENING_STOCK - 1);
}

#[tokio::test]
async fn test_offline_sale_keeps_device_time() {
    let env = setup().await;
    let offline_at = sale_time() - Duration::hours(5);

    let mut transaction = txn("t-1", vec![line(KOPI, 1)]);
    transaction.occurred_at = Some(offline_at);

    let response = env
        .engine
        .sync_gate()
        .submit(batch("TILL-01", "batch-1", vec![transaction]), CASHIER)
        .await
        .unwrap();

    let sale_id = response.results[0].sale_id.clone().unwrap();
    let sale = env.db().sales().get_by_id(&sale_id).await.unwrap().unwrap();
    assert_eq!(sale.occurred_at, Some(offline_at));
    assert_eq!(sale.synced_at, Some(sale_time()));
    assert_eq!(sale.device_id.as_deref(), Some("TILL-01"));
    assert_eq!(sale.local_txn_uuid, "t-1");

    assert_eq!(response.results[0].invoice_no.as_deref(), Some("INV-20250303-0001"));
}

#[tokio::test]
async fn test_late_replay_numbered_on_sync_day() {
    let env = setup().await;
    let live = sell_kopi_roti(&env).await;

    let mut transaction = txn("t-1", vec![line(KOPI, 1)]);
    transaction.occurred_at = Some(sale_time() - Duration::days(2));

    let response = env
        .engine
        .sync_gate()
        .submit(batch("TILL-01", "batch-1", vec![transaction]), CASHIER)
        .await
        .unwrap();

    assert_eq!(live.invoice_no, "INV-20250303-0001");
    assert_eq!(response.results[0].invoice_no.as_deref(), Some("INV-20250303-0002"));

    let sale_id = response.results[0].sale_id.clone().unwrap();
    let sale = env.db().sales().get_by_id(&sale_id).await.unwrap().unwrap();
    assert_eq!(sale.occurred_at, Some(sale_time() - Duration::days(2)));
}

#[tokio::test]
async fn test_future_occurred_at_fails_transaction() {
    let env = setup().await;

    let mut future = txn("t-x", vec![line(KOPI, 1)]);
    future.occurred_at = Some(sale_time() + Duration::days(365));
    let mut skewed = txn("t-2", vec![line(KOPI, 1)]);
    skewed.occurred_at = Some(sale_time() + Duration::minutes(2));

    let response = env
        .engine
        .sync_gate()
        .submit(batch("TILL-01", "batch-1", vec![future, skewed]), CASHIER)
        .await
        .unwrap();

    assert_eq!(response.status, SyncBatchStatus::Failed);
    assert_eq!(response.results[0].status, SyncOutcome::Failed);
    assert!(response.results[0].errors.as_ref().unwrap().contains_key("occurred_at"));
    assert!(env.db().sync().get_key("TILL-01:t-x").await.unwrap().is_none());

    assert_eq!(response.results[1].status, SyncOutcome::Processed);
    assert_eq!(env.db().sales().count().await.unwrap(), 1);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
}

#[tokio::test]
async fn test_direct_checkout_then_sync_backfills_key() {
    let env = setup().await;

    let mut request = ewallet(vec![line(KOPI, 1)]);
    request.local_txn_uuid = Some("t-1".to_string());
    let receipt = env.engine.checkout().checkout(request, CASHIER).await.unwrap();

    let response = env
        .engine
        .sync_gate()
        .submit(batch("TILL-01", "batch-1", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap();

    let result = &response.results[0];
    assert_eq!(result.status, SyncOutcome::Duplicate);
    assert_eq!(result.sale_id.as_deref(), Some(receipt.sale_id.as_str()));
    assert_eq!(result.invoice_no.as_deref(), Some(receipt.invoice_no.as_str()));

    let key = env.db().sync().get_key("TILL-01:t-1").await.unwrap().unwrap();
    assert_eq!(key.ref_type, RefType::Sale);
    assert_eq!(key.ref_id, receipt.sale_id);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
}

#[tokio::test]
async fn test_concurrent_replays_record_one_sale() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    let (a, b) = tokio::join!(
        gate.submit(batch("TILL-01", "batch-a", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER),
        gate.submit(batch("TILL-01", "batch-b", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER),
    );

    let mut outcomes = vec![a.unwrap().results[0].status, b.unwrap().results[0].status];
    outcomes.sort_by_key(|s| s.to_string());

    assert_eq!(outcomes, vec![SyncOutcome::Duplicate, SyncOutcome::Processed]);
    assert_eq!(env.db().sales().count().await.unwrap(), 1);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_on_file_database() {
    let (env, path) = setup_file(8).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = env.engine.clone();
            tokio::spawn(async move {
                engine
                    .sync_gate()
                    .submit(batch("TILL-01", &format!("batch-{i}"), vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
                    .await
            })
        })
        .collect();

    let mut processed = 0;
    let mut duplicate = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap().results[0].status {
            SyncOutcome::Processed => processed += 1,
            SyncOutcome::Duplicate => duplicate += 1,
            SyncOutcome::Failed => panic!("replay failed"),
        }
    }

    assert_eq!((processed, duplicate), (1, 7));
    assert_eq!(env.db().sales().count().await.unwrap(), 1);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);

    remove_file_db(env, path).await;
}

#[tokio::test]
async fn test_batch_uuid_owned_by_another_device() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    gate.submit(batch("TILL-01", "batch-1", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap();

    let err = gate
        .submit(batch("TILL-02", "batch-1", vec![txn("t-9", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
    ));
}

#[tokio::test]
async fn test_batch_shape_validated() {
    let env = setup().await;
    let gate = env.engine.sync_gate();

    let err = gate.submit(batch("TILL-01", "batch-1", vec![]), CASHIER).await.unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("transactions"));

    let err = gate
        .submit(batch("TILL 01", "batch-1", vec![txn("t-1", vec![line(KOPI, 1)])]), CASHIER)
        .await
        .unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("device_id"));

    assert!(gate.batch("batch-1").await.is_err());
}

#[tokio::test]
async fn test_invalid_local_txn_uuid_fails_only_that_transaction() {
    let env = setup().await;

    let response = env
        .engine
        .sync_gate()
        .submit(
            batch(
                "TILL-01",
                "batch-1",
                vec![txn("bad:id", vec![line(KOPI, 1)]), txn("t-2", vec![line(KOPI, 1)])],
            ),
            CASHIER,
        )
        .await
        .unwrap();

    assert_eq!(response.status, SyncBatchStatus::Failed);
    assert_eq!(response.results[0].status, SyncOutcome::Failed);
    assert!(response.results[0].errors.as_ref().unwrap().contains_key("local_txn_uuid"));
    assert_eq!(response.results[1].status, SyncOutcome::Processed);
}
