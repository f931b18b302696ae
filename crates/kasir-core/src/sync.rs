//! # Sync Outcomes
//!
//! Pure helpers for the offline replay path: the idempotency key format and
//! how per-transaction outcomes roll up into a batch status.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  batch {device_id, batch_uuid, transactions[]}                          │
//! │     │                                                                   │
//! │     ├── txn 1 → key "TILL-01:7f1c…" new      → PROCESSED               │
//! │     ├── txn 2 → key "TILL-01:a9e2…" exists   → DUPLICATE (not a fault) │
//! │     └── txn 3 → product inactive             → FAILED (no key written) │
//! │                                                                         │
//! │  batch status = FAILED ("1 dari 3 transaksi gagal")                     │
//! │  batch status = PROCESSED iff no FAILED entry                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, FieldErrors};
use crate::types::{SyncBatchStatus, SyncOutcome};

/// Builds the idempotency key `device_id:local_txn_uuid`.
///
/// ## Example
/// ```rust
/// use kasir_core::sync::idempotency_key;
///
/// assert_eq!(idempotency_key("TILL-01", "abc"), "TILL-01:abc");
/// ```
pub fn idempotency_key(device_id: &str, local_txn_uuid: &str) -> String {
    format!("{device_id}:{local_txn_uuid}")
}

/// Outcome of one transaction in a sync batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionResult {
    pub local_txn_uuid: String,
    pub status: SyncOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl TransactionResult {
    pub fn processed(local_txn_uuid: &str, sale_id: &str, invoice_no: &str) -> Self {
        TransactionResult {
            local_txn_uuid: local_txn_uuid.to_string(),
            status: SyncOutcome::Processed,
            sale_id: Some(sale_id.to_string()),
            invoice_no: Some(invoice_no.to_string()),
            message: None,
            errors: None,
        }
    }

    pub fn duplicate(local_txn_uuid: &str, sale_id: &str, invoice_no: Option<&str>) -> Self {
        TransactionResult {
            local_txn_uuid: local_txn_uuid.to_string(),
            status: SyncOutcome::Duplicate,
            sale_id: Some(sale_id.to_string()),
            invoice_no: invoice_no.map(str::to_string),
            message: None,
            errors: None,
        }
    }

    /// A rejected transaction, with field errors when the rule names one.
    pub fn failed(local_txn_uuid: &str, err: &CoreError) -> Self {
        Self::failed_with(local_txn_uuid, err.to_string(), err.field_errors())
    }

    pub fn failed_with(local_txn_uuid: &str, message: String, errors: Option<FieldErrors>) -> Self {
        TransactionResult {
            local_txn_uuid: local_txn_uuid.to_string(),
            status: SyncOutcome::Failed,
            sale_id: None,
            invoice_no: None,
            message: Some(message),
            errors,
        }
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == SyncOutcome::Failed
    }
}

/// Rolls per-transaction outcomes into the batch status and error message.
///
/// DUPLICATE counts as success.
pub fn batch_status(results: &[TransactionResult]) -> (SyncBatchStatus, Option<String>) {
    let failed = results.iter().filter(|r| r.is_failed()).count();
    if failed == 0 {
        (SyncBatchStatus::Processed, None)
    } else {
        (
            SyncBatchStatus::Failed,
            Some(format!("{failed} dari {} transaksi gagal", results.len())),
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
