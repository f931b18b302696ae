//! # Sync Repository
//!
//! Sync batches and the idempotency keys that make device replays safe.
//!
//! ## Key Claim
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Device TILL-01 replays txn 7f1c… (network dropped the first response)  │
//! │                                                                         │
//! │  tx A: INSERT key "TILL-01:7f1c…" ON CONFLICT DO NOTHING → 1 row  ✓     │
//! │        ... sale graph ...                                    COMMIT     │
//! │                                                                         │
//! │  tx B: INSERT key "TILL-01:7f1c…" ON CONFLICT DO NOTHING → 0 rows       │
//! │        ROLLBACK, report DUPLICATE with the key's ref_id                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are written once and never deleted. Existence of a key is the
//! only "already processed" signal.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::{RefType, SyncBatch, SyncBatchStatus, SyncIdempotencyKey};

const BATCH_COLUMNS: &str = "id, device_id, batch_uuid, status, error_message, received_at, processed_at";

#[derive(Debug, Clone)]
pub struct SyncRepository {
    pool: SqlitePool,
}

impl SyncRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncRepository { pool }
    }

    // =========================================================================
    // Batches
    // =========================================================================

    pub async fn get_batch(&self, batch_uuid: &str) -> DbResult<Option<SyncBatch>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_batch(&mut conn, batch_uuid).await
    }

    pub async fn find_batch(conn: &mut SqliteConnection, batch_uuid: &str) -> DbResult<Option<SyncBatch>> {
        let batch = sqlx::query_as::<_, SyncBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM sync_batches WHERE batch_uuid = ?1"
        ))
        .bind(batch_uuid)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(batch)
    }

    /// Inserts `batch` unless its batch_uuid is already known, then returns
    /// the stored row (which may be an earlier attempt's).
    pub async fn create_batch_if_absent(&self, batch: &SyncBatch) -> DbResult<SyncBatch> {
        let mut conn = self.pool.acquire().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO sync_batches (id, device_id, batch_uuid, status, error_message, received_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(batch_uuid) DO NOTHING
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.device_id)
        .bind(&batch.batch_uuid)
        .bind(batch.status)
        .bind(&batch.error_message)
        .bind(batch.received_at)
        .bind(batch.processed_at)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        debug!(batch_uuid = %batch.batch_uuid, new = inserted == 1, "Sync batch received");

        Self::find_batch(&mut conn, &batch.batch_uuid)
            .await?
            .ok_or_else(|| DbError::not_found("SyncBatch", batch.batch_uuid.clone()))
    }

    /// Records the batch outcome.
    pub async fn finish_batch(
        &self,
        batch_id: &str,
        status: SyncBatchStatus,
        error_message: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE sync_batches SET status = ?2, error_message = ?3, processed_at = ?4 WHERE id = ?1",
        )
        .bind(batch_id)
        .bind(status)
        .bind(error_message)
        .bind(processed_at)
        .execute(&self.pool)
        .await?;

        debug!(batch_id = %batch_id, status = %status, "Sync batch finished");
        Ok(())
    }

    // =========================================================================
    // Idempotency Keys
    // =========================================================================

    pub async fn get_key(&self, key: &str) -> DbResult<Option<SyncIdempotencyKey>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_key(&mut conn, key).await
    }

    pub async fn find_key(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<SyncIdempotencyKey>> {
        let row = sqlx::query_as::<_, SyncIdempotencyKey>(
            "SELECT key, ref_type, ref_id, created_at FROM sync_idempotency_keys WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Writes `key` → `ref_id`. Returns false if the key already existed.
    pub async fn claim_key(
        conn: &mut SqliteConnection,
        key: &str,
        ref_type: RefType,
        ref_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_idempotency_keys (key, ref_type, ref_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(ref_type)
        .bind(ref_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Points a key claimed in this transaction at a different record.
    pub async fn repoint_key(conn: &mut SqliteConnection, key: &str, ref_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sync_idempotency_keys SET ref_id = ?2 WHERE key = ?1")
            .bind(key)
            .bind(ref_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
