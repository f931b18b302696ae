//! # Approval Repository
//!
//! Approval rows. The JSON `payload` column is decoded into the typed
//! [`ApprovalPayload`](kasir_core::ApprovalPayload) here, once, so nothing
//! above this layer handles raw JSON.
//!
//! ## Transition Guard
//! ```text
//! UPDATE approvals SET status = ?, approved_by = ?, decided_at = ?, ...
//!  WHERE id = ? AND status = 'PENDING'
//!        │
//!        ├── 1 row  → this caller owns the decision
//!        └── 0 rows → someone else decided first (or it never existed)
//! ```
//!
//! The partial unique index `idx_approvals_one_pending_refund` allows one
//! PENDING REFUND per sale; a second insert fails with a unique violation
//! on `approvals.sale_id`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kasir_core::approval::{decode_payload, encode_payload, Rejection};
use kasir_core::{Approval, ApprovalAction, ApprovalStatus};

const APPROVAL_COLUMNS: &str =
    "a.id, a.action, a.sale_id, a.requested_by, a.approved_by, a.status, a.payload, a.created_at, a.decided_at";

/// Raw row, before the payload is decoded.
#[derive(Debug, FromRow)]
struct ApprovalRow {
    id: String,
    action: ApprovalAction,
    sale_id: Option<String>,
    requested_by: String,
    approved_by: Option<String>,
    status: ApprovalStatus,
    payload: String,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApprovalRow> for Approval {
    type Error = DbError;

    fn try_from(row: ApprovalRow) -> DbResult<Self> {
        let (payload, rejection) = decode_payload(row.action, &row.payload)
            .map_err(|e| DbError::InvalidData(format!("approval {}: {e}", row.id)))?;

        Ok(Approval {
            id: row.id,
            action: row.action,
            sale_id: row.sale_id,
            requested_by: row.requested_by,
            approved_by: row.approved_by,
            status: row.status,
            payload,
            rejection,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ApprovalListRow {
    #[sqlx(flatten)]
    approval: ApprovalRow,
    requester_name: Option<String>,
    approver_name: Option<String>,
    invoice_no: Option<String>,
}

/// An approval with the names a supervisor's queue shows.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalListItem {
    #[serde(flatten)]
    pub approval: Approval,
    pub requester_name: Option<String>,
    pub approver_name: Option<String>,
    pub invoice_no: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApprovalRepository {
    pool: SqlitePool,
}

impl ApprovalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ApprovalRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Approval>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Approval>> {
        let row = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals a WHERE a.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Approval::try_from).transpose()
    }

    /// Id of the sale's PENDING refund approval, if any.
    pub async fn get_pending_refund(&self, sale_id: &str) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        Self::pending_refund_for_sale(&mut conn, sale_id).await
    }

    pub async fn pending_refund_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT id FROM approvals WHERE sale_id = ?1 AND action = 'REFUND' AND status = 'PENDING'",
        )
        .bind(sale_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Inserts a new approval.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` on `approvals.sale_id` when the sale
    /// already has a PENDING refund.
    pub async fn insert(conn: &mut SqliteConnection, approval: &Approval) -> DbResult<()> {
        let payload = encode_payload(&approval.payload, approval.rejection.as_ref())
            .map_err(|e| DbError::InvalidData(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO approvals (
                id, action, sale_id, requested_by, approved_by, status, payload, created_at, decided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&approval.id)
        .bind(approval.action)
        .bind(&approval.sale_id)
        .bind(&approval.requested_by)
        .bind(&approval.approved_by)
        .bind(approval.status)
        .bind(payload)
        .bind(approval.created_at)
        .bind(approval.decided_at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %approval.id, action = %approval.action, "Inserted approval");
        Ok(())
    }

    /// Moves a PENDING approval to `status`.
    ///
    /// When `rejection` is given, the stored payload is rewritten with it.
    /// Returns false if the approval was not PENDING.
    pub async fn transition(
        conn: &mut SqliteConnection,
        approval: &Approval,
        status: ApprovalStatus,
        approved_by: &str,
        decided_at: DateTime<Utc>,
        rejection: Option<&Rejection>,
    ) -> DbResult<bool> {
        let payload = rejection
            .map(|r| encode_payload(&approval.payload, Some(r)))
            .transpose()
            .map_err(|e| DbError::InvalidData(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE approvals
            SET status = ?2, approved_by = ?3, decided_at = ?4, payload = COALESCE(?5, payload)
            WHERE id = ?1 AND status = 'PENDING'
            "#,
        )
        .bind(&approval.id)
        .bind(status)
        .bind(approved_by)
        .bind(decided_at)
        .bind(payload)
        .execute(&mut *conn)
        .await?;

        let won = result.rows_affected() == 1;
        debug!(id = %approval.id, to = %status, won, "Approval transition");
        Ok(won)
    }

    /// Lists approvals, newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<ApprovalStatus>, limit: i64) -> DbResult<Vec<ApprovalListItem>> {
        let rows = sqlx::query_as::<_, ApprovalListRow>(&format!(
            r#"
            SELECT {APPROVAL_COLUMNS},
                   ru.name AS requester_name,
                   au.name AS approver_name,
                   s.invoice_no AS invoice_no
            FROM approvals a
            LEFT JOIN users ru ON ru.id = a.requested_by
            LEFT JOIN users au ON au.id = a.approved_by
            LEFT JOIN sales s ON s.id = a.sale_id
            WHERE (?1 IS NULL OR a.status = ?1)
            ORDER BY a.created_at DESC, a.rowid DESC
            LIMIT ?2
            "#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ApprovalListItem {
                    approval: Approval::try_from(row.approval)?,
                    requester_name: row.requester_name,
                    approver_name: row.approver_name,
                    invoice_no: row.invoice_no,
                })
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use kasir_core::approval::{ApprovalPayload, VoidPayload};
    use kasir_core::UserRole;

    fn void_request(id: &str, requested_by: &str) -> Approval {
        Approval {
            id: id.to_string(),
            action: ApprovalAction::Void,
            sale_id: None,
            requested_by: requested_by.to_string(),
            approved_by: None,
            status: ApprovalStatus::Pending,
            payload: ApprovalPayload::Void(VoidPayload {
                reason: "Salah input".to_string(),
            }),
            rejection: None,
            created_at: fixtures::at(10),
            decided_at: None,
        }
    }

    #[tokio::test]
    async fn test_transition_only_once() {
        let db = fixtures::database().await;
        fixtures::user(&db, "kasir-1", UserRole::Cashier).await;
        fixtures::user(&db, "spv-1", UserRole::Supervisor).await;

        let approval = void_request("ap-1", "kasir-1");
        let mut tx = db.begin().await.unwrap();
        ApprovalRepository::insert(&mut tx, &approval).await.unwrap();

        let rejection = Rejection {
            reason: "Tidak perlu".to_string(),
            rejected_at: fixtures::at(11),
        };
        let first = ApprovalRepository::transition(
            &mut tx,
            &approval,
            ApprovalStatus::Rejected,
            "spv-1",
            fixtures::at(11),
            Some(&rejection),
        )
        .await
        .unwrap();
        let second = ApprovalRepository::transition(
            &mut tx,
            &approval,
            ApprovalStatus::Approved,
            "spv-1",
            fixtures::at(12),
            None,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(first);
        assert!(!second);

        let stored = db.approvals().get_by_id("ap-1").await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Rejected);
        assert_eq!(stored.approved_by.as_deref(), Some("spv-1"));
        assert_eq!(stored.rejection, Some(rejection));
        assert_eq!(stored.payload, approval.payload);
    }

    #[tokio::test]
    async fn test_list_joins_names() {
        let db = fixtures::database().await;
        fixtures::user(&db, "kasir-1", UserRole::Cashier).await;

        let mut tx = db.begin().await.unwrap();
        ApprovalRepository::insert(&mut tx, &void_request("ap-1", "kasir-1")).await.unwrap();
        tx.commit().await.unwrap();

        let pending = db.approvals().list(Some(ApprovalStatus::Pending), 50).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requester_name.as_deref(), Some("User kasir-1"));
        assert_eq!(pending[0].approver_name, None);

        let all = db.approvals().list(None, 50).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(db.approvals().list(Some(ApprovalStatus::Approved), 50).await.unwrap().is_empty());
    }
}
