//! # Sync Idempotency Gate
//!
//! Replays offline sales from a terminal exactly once per
//! `(device_id, local_txn_uuid)`.
//!
//! ## Per-Transaction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  key = "device_id:local_txn_uuid"                                       │
//! │                                                                         │
//! │  key known? ───────────────────────────────► DUPLICATE (recorded sale)  │
//! │      │ no                                                               │
//! │  prepare checkout ── rule broken ──────────► FAILED (no key written)    │
//! │      │                                                                  │
//! │  BEGIN                                                                  │
//! │    INSERT key … ON CONFLICT DO NOTHING                                  │
//! │      │ lost the race ── ROLLBACK ──────────► DUPLICATE                  │
//! │    sale with this local_txn_uuid already? ─► repoint key, DUPLICATE     │
//! │    persist sale graph ── rule broken ──────► ROLLBACK, FAILED           │
//! │  COMMIT ───────────────────────────────────► PROCESSED                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The key insert is the first write, so a concurrent replay of the same
//! transaction blocks on it and then sees the conflict.
//!
//! A storage fault aborts the batch with an error and leaves it RECEIVED;
//! every transaction that committed before it stays committed and replays
//! as DUPLICATE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use kasir_core::sync::{batch_status, idempotency_key, TransactionResult};
use kasir_core::validation::{validate_client_id, validate_list_size};
use kasir_core::{CoreError, RefType, SyncBatch, SyncBatchStatus, ValidationError};
use kasir_db::{SaleRepository, SyncRepository};

use crate::checkout::{CheckoutEngine, CheckoutRequest};
use crate::error::{EngineError, EngineResult};
use crate::Engine;

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SyncBatchRequest {
    pub device_id: String,
    pub batch_uuid: String,
    pub transactions: Vec<SyncTransaction>,
}

/// One offline sale. The outer `local_txn_uuid` and `occurred_at` win over
/// anything inside `checkout`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncTransaction {
    pub local_txn_uuid: String,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    pub checkout: CheckoutRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncBatchResponse {
    pub batch_uuid: String,
    pub status: SyncBatchStatus,
    pub results: Vec<TransactionResult>,
}

// =============================================================================
// Gate
// =============================================================================

#[derive(Debug, Clone)]
pub struct SyncGate {
    engine: Engine,
}

impl SyncGate {
    pub fn new(engine: Engine) -> Self {
        SyncGate { engine }
    }

    /// Processes a batch from `device_id`, with sales attributed to
    /// `cashier_id`.
    ///
    /// A batch already PROCESSED returns immediately with no results.
    pub async fn submit(&self, request: SyncBatchRequest, cashier_id: &str) -> EngineResult<SyncBatchResponse> {
        validate_client_id("device_id", &request.device_id)?;
        validate_client_id("batch_uuid", &request.batch_uuid)?;
        validate_list_size(
            "transactions",
            request.transactions.len(),
            self.engine.config().sync_batch_limit,
        )?;

        let sync = self.engine.db().sync();

        if let Some(existing) = sync.get_batch(&request.batch_uuid).await? {
            Self::ensure_same_device(&existing, &request.device_id)?;
            if existing.status == SyncBatchStatus::Processed {
                debug!(batch_uuid = %existing.batch_uuid, "Batch already processed, skipping");
                return Ok(SyncBatchResponse {
                    batch_uuid: existing.batch_uuid,
                    status: SyncBatchStatus::Processed,
                    results: Vec::new(),
                });
            }
        }

        let batch = sync
            .create_batch_if_absent(&SyncBatch {
                id: Uuid::new_v4().to_string(),
                device_id: request.device_id.clone(),
                batch_uuid: request.batch_uuid.clone(),
                status: SyncBatchStatus::Received,
                error_message: None,
                received_at: self.engine.now(),
                processed_at: None,
            })
            .await?;
        Self::ensure_same_device(&batch, &request.device_id)?;

        let mut results = Vec::with_capacity(request.transactions.len());
        for transaction in request.transactions {
            let result = self
                .process_one(&request.device_id, transaction, cashier_id)
                .await
                .inspect_err(|e| {
                    error!(batch_uuid = %batch.batch_uuid, error = %e, "Sync batch aborted");
                })?;
            results.push(result);
        }

        let (status, error_message) = batch_status(&results);
        sync.finish_batch(&batch.id, status, error_message.as_deref(), self.engine.now())
            .await?;

        match &error_message {
            Some(message) => warn!(batch_uuid = %batch.batch_uuid, %message, "Sync batch finished with failures"),
            None => info!(batch_uuid = %batch.batch_uuid, count = results.len(), "Sync batch processed"),
        }

        Ok(SyncBatchResponse {
            batch_uuid: batch.batch_uuid,
            status,
            results,
        })
    }

    /// Stored batch by its client uuid.
    pub async fn batch(&self, batch_uuid: &str) -> EngineResult<SyncBatch> {
        self.engine
            .db()
            .sync()
            .get_batch(batch_uuid)
            .await?
            .ok_or_else(|| kasir_db::DbError::not_found("SyncBatch", batch_uuid).into())
    }

    fn ensure_same_device(batch: &SyncBatch, device_id: &str) -> EngineResult<()> {
        if batch.device_id != device_id {
            return Err(ValidationError::Duplicate {
                field: "batch_uuid".to_string(),
                value: batch.batch_uuid.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Runs one transaction. Business-rule failures become FAILED results;
    /// only storage faults return `Err`.
    async fn process_one(
        &self,
        device_id: &str,
        transaction: SyncTransaction,
        cashier_id: &str,
    ) -> EngineResult<TransactionResult> {
        let uuid = transaction.local_txn_uuid;
        if let Err(e) = validate_client_id("local_txn_uuid", &uuid) {
            return Ok(TransactionResult::failed(&uuid, &CoreError::from(e)));
        }

        let key = idempotency_key(device_id, &uuid);
        let db = self.engine.db();

        if let Some(recorded) = db.sync().get_key(&key).await? {
            return self.duplicate(&uuid, &recorded.ref_id).await;
        }

        let mut request = transaction.checkout;
        request.local_txn_uuid = Some(uuid.clone());
        if transaction.occurred_at.is_some() {
            request.occurred_at = transaction.occurred_at;
        }

        let checkout = self.engine.checkout();
        let prepared = match checkout.prepare(&request, cashier_id, Some(device_id)).await {
            Ok(prepared) => prepared,
            Err(EngineError::Core(e)) => {
                warn!(local_txn_uuid = %uuid, error = %e, "Sync transaction rejected");
                return Ok(TransactionResult::failed(&uuid, &e));
            }
            Err(e) => return Err(e),
        };

        let now = self.engine.now();
        let mut tx = db.begin().await?;

        if !SyncRepository::claim_key(&mut tx, &key, RefType::Sale, &prepared.sale_id, now).await? {
            tx.rollback().await?;
            let recorded = db
                .sync()
                .get_key(&key)
                .await?
                .ok_or_else(|| kasir_db::DbError::not_found("SyncIdempotencyKey", key.clone()))?;
            return self.duplicate(&uuid, &recorded.ref_id).await;
        }

        if let Some(sale) = SaleRepository::find_by_local_txn_uuid(&mut tx, &uuid).await? {
            SyncRepository::repoint_key(&mut tx, &key, &sale.id).await?;
            tx.commit().await?;
            debug!(local_txn_uuid = %uuid, sale_id = %sale.id, "Key back-filled to existing sale");
            return Ok(TransactionResult::duplicate(&uuid, &sale.id, Some(&sale.invoice_no)));
        }

        match CheckoutEngine::persist(&mut tx, &prepared, self.engine.config(), now).await {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    local_txn_uuid = %uuid,
                    sale_id = %receipt.sale_id,
                    invoice_no = %receipt.invoice_no,
                    "Offline sale recorded"
                );
                Ok(TransactionResult::processed(&uuid, &receipt.sale_id, &receipt.invoice_no))
            }
            Err(EngineError::Core(e)) => {
                tx.rollback().await?;
                warn!(local_txn_uuid = %uuid, error = %e, "Sync transaction rejected");
                Ok(TransactionResult::failed(&uuid, &e))
            }
            Err(e) => Err(e),
        }
    }

    async fn duplicate(&self, uuid: &str, sale_id: &str) -> EngineResult<TransactionResult> {
        let invoice_no = self
            .engine
            .db()
            .sales()
            .get_by_id(sale_id)
            .await?
            .map(|sale| sale.invoice_no);

        debug!(local_txn_uuid = %uuid, sale_id = %sale_id, "Duplicate sync transaction");
        Ok(TransactionResult::duplicate(uuid, sale_id, invoice_no.as_deref()))
    }
}
