//! # Refund Repository
//!
//! Refund headers and items, plus the two aggregates every refund decision
//! is made against:
//!
//! ```text
//! history_for_sale   sale_item_id → (Σ refund_items.qty, Σ refund_items.line_total)
//! refunded_total     Σ refunds.total_amount for the sale
//! ```
//!
//! Refund rows only exist for approved refunds, so both sums are exact.

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::refund::ItemRefundHistory;
use kasir_core::{Money, Refund, RefundItem};

const REFUND_COLUMNS: &str =
    "id, sale_id, approval_id, requested_by, approved_by, total_amount, reason, occurred_at, created_at";

#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

impl RefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Per-item refund history for a sale.
    pub async fn get_history(&self, sale_id: &str) -> DbResult<HashMap<String, ItemRefundHistory>> {
        let mut conn = self.pool.acquire().await?;
        Self::history_for_sale(&mut conn, sale_id).await
    }

    pub async fn history_for_sale(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<HashMap<String, ItemRefundHistory>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT ri.sale_item_id, SUM(ri.qty), SUM(ri.line_total)
            FROM refund_items ri
            INNER JOIN sale_items si ON si.id = ri.sale_item_id
            WHERE si.sale_id = ?1
            GROUP BY ri.sale_item_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sale_item_id, refunded_qty, refunded_amount)| {
                (
                    sale_item_id,
                    ItemRefundHistory {
                        refunded_qty,
                        refunded_amount: Money::new(refunded_amount),
                    },
                )
            })
            .collect())
    }

    /// Σ total_amount over the sale's refunds.
    pub async fn get_refunded_total(&self, sale_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        Self::refunded_total(&mut conn, sale_id).await
    }

    pub async fn refunded_total(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Money> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_amount), 0) FROM refunds WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(Money::new(total))
    }

    pub async fn insert_refund(conn: &mut SqliteConnection, refund: &Refund) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, sale_id, approval_id, requested_by, approved_by,
                total_amount, reason, occurred_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.sale_id)
        .bind(&refund.approval_id)
        .bind(&refund.requested_by)
        .bind(&refund.approved_by)
        .bind(refund.total_amount)
        .bind(&refund.reason)
        .bind(refund.occurred_at)
        .bind(refund.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %refund.id, sale_id = %refund.sale_id, total = refund.total_amount, "Inserted refund");
        Ok(())
    }

    pub async fn insert_item(conn: &mut SqliteConnection, item: &RefundItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refund_items (id, refund_id, sale_item_id, qty, unit_price, line_total, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.refund_id)
        .bind(&item.sale_item_id)
        .bind(item.qty)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Refunds of a sale, oldest first.
    pub async fn list_for_sale(&self, sale_id: &str) -> DbResult<Vec<Refund>> {
        let refunds = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refunds)
    }

    /// The refund executed for an approval, if any.
    pub async fn get_by_approval(&self, approval_id: &str) -> DbResult<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE approval_id = ?1"
        ))
        .bind(approval_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(refund)
    }

    pub async fn get_items(&self, refund_id: &str) -> DbResult<Vec<RefundItem>> {
        let items = sqlx::query_as::<_, RefundItem>(
            r#"
            SELECT id, refund_id, sale_item_id, qty, unit_price, line_total, created_at
            FROM refund_items
            WHERE refund_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(refund_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
