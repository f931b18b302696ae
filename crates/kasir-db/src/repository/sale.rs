//! # Sale Repository
//!
//! Database operations for sales, sale items, and payments.
//!
//! ## Sale Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   sales ──────────┬──────────► sale_items (N, snapshot of product)      │
//! │   (PAID | VOID)   │                                                     │
//! │                   └──────────► payments   (exactly 1, CONFIRMED)        │
//! │                                                                         │
//! │   invoice_sequences: business_date → last_seq                           │
//! │     2025-03-03 → 41   ──next──►  INV-20250303-0042                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A sale row is written once. The only later change is PAID → VOID.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use kasir_core::{Payment, Sale, SaleItem};

const SALE_COLUMNS: &str = r#"
    id, invoice_no, local_txn_uuid, device_id, cashier_id, status,
    subtotal, discount_total, tax_total, grand_total, paid_total, change_total,
    occurred_at, synced_at, created_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price, qty,
    discount_amount, line_total, created_at
"#;

const PAYMENT_COLUMNS: &str =
    "id, sale_id, method, status, amount, cash_received, change_amount, reference, created_at";

/// Repository for sale database operations.
///
/// ## Usage
/// ```rust,ignore
/// let sale = db.sales().get_by_id(&sale_id).await?;
/// let items = db.sales().get_items(&sale_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(sale)
    }

    /// Gets the sale created for a client transaction UUID.
    pub async fn get_by_local_txn_uuid(&self, local_txn_uuid: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_local_txn_uuid(&mut conn, local_txn_uuid).await
    }

    pub async fn find_by_local_txn_uuid(
        conn: &mut SqliteConnection,
        local_txn_uuid: &str,
    ) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE local_txn_uuid = ?1"
        ))
        .bind(local_txn_uuid)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(sale)
    }

    /// Gets all items for a sale, in cart order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, sale_id).await
    }

    pub async fn items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }

    pub async fn get_payment(&self, sale_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id = ?1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Writes (transaction only)
    // =========================================================================

    /// Allocates the next invoice number for a business day.
    ///
    /// ## Format
    /// `INV-YYYYMMDD-NNNN`, sequence restarting at 0001 every day. The
    /// counter row is bumped by an upsert, so the number is taken under the
    /// transaction's write lock and rolls back with it.
    pub async fn next_invoice_no(conn: &mut SqliteConnection, business_date: NaiveDate) -> DbResult<String> {
        let day = business_date.format("%Y-%m-%d").to_string();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (business_date, last_seq) VALUES (?1, 1)
            ON CONFLICT(business_date) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(&day)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("INV-{}-{:04}", business_date.format("%Y%m%d"), seq))
    }

    /// Inserts a sale header.
    pub async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_no, local_txn_uuid, device_id, cashier_id, status,
                subtotal, discount_total, tax_total, grand_total, paid_total, change_total,
                occurred_at, synced_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_no)
        .bind(&sale.local_txn_uuid)
        .bind(&sale.device_id)
        .bind(&sale.cashier_id)
        .bind(sale.status)
        .bind(sale.subtotal)
        .bind(sale.discount_total)
        .bind(sale.tax_total)
        .bind(sale.grand_total)
        .bind(sale.paid_total)
        .bind(sale.change_total)
        .bind(sale.occurred_at)
        .bind(sale.synced_at)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(id = %sale.id, invoice_no = %sale.invoice_no, "Inserted sale");
        Ok(())
    }

    /// Inserts one sale item.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, sku_snapshot, name_snapshot,
                unit_price, qty, discount_amount, line_total, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.unit_price)
        .bind(item.qty)
        .bind(item.discount_amount)
        .bind(item.line_total)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Inserts the sale's payment row.
    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, method, status, amount, cash_received, change_amount, reference, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.amount)
        .bind(payment.cash_received)
        .bind(payment.change_amount)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// PAID → VOID. Returns false if the sale was not PAID.
    pub async fn mark_void(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET status = 'VOID' WHERE id = ?1 AND status = 'PAID'")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        debug!(sale_id = %sale_id, voided = result.rows_affected() == 1, "Void requested");
        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
