//! # Stock Repository
//!
//! The stock ledger: an append-only `stock_movements` log and the
//! `stock_items` on-hand projection, always written together.
//!
//! ## One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(conn, movement{product, delta = −2, SALE_OUT}, allow_negative)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT stock_items (product, 0) ON CONFLICT DO NOTHING                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE stock_items SET on_hand = on_hand + delta                      │
//! │   WHERE product_id = ? AND (delta ≥ 0 OR allow_negative                │
//! │                             OR on_hand + delta ≥ 0)                     │
//! │   RETURNING on_hand                                                     │
//! │       │                                                                 │
//! │       ├── no row  → StockApplied::Insufficient (nothing written)        │
//! │       ▼                                                                 │
//! │  INSERT stock_movements (...)  → StockApplied::Applied                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The availability check and the decrement are one statement, so two
//! transactions can never both pass the check on the last unit.
//! Triggers on `stock_movements` reject UPDATE and DELETE.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use kasir_core::{MovementType, RefType, StockItem, StockMovement};

const MOVEMENT_COLUMNS: &str =
    "id, product_id, qty_delta, movement_type, ref_type, ref_id, actor_id, note, created_at";

/// A movement to append.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub qty_delta: i64,
    pub movement_type: MovementType,
    pub ref_type: RefType,
    pub ref_id: Option<String>,
    pub actor_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`StockRepository::record`].
#[derive(Debug, Clone)]
pub enum StockApplied {
    Applied { movement: StockMovement, on_hand: i64 },
    /// The debit would take on_hand below zero. Nothing was written.
    Insufficient { on_hand: i64 },
}

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Appends a movement and applies it to on-hand.
    ///
    /// Must run inside the caller's transaction alongside whatever the
    /// movement references.
    pub async fn record(
        conn: &mut SqliteConnection,
        movement: &NewMovement,
        allow_negative: bool,
    ) -> DbResult<StockApplied> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (product_id, on_hand, updated_at) VALUES (?1, 0, ?2)
            ON CONFLICT(product_id) DO NOTHING
            "#,
        )
        .bind(&movement.product_id)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        let on_hand: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_items
            SET on_hand = on_hand + ?2, updated_at = ?3
            WHERE product_id = ?1 AND (?2 >= 0 OR ?4 = 1 OR on_hand + ?2 >= 0)
            RETURNING on_hand
            "#,
        )
        .bind(&movement.product_id)
        .bind(movement.qty_delta)
        .bind(movement.created_at)
        .bind(allow_negative)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(on_hand) = on_hand else {
            let current = Self::on_hand_in(conn, &movement.product_id).await?;
            debug!(
                product_id = %movement.product_id,
                delta = movement.qty_delta,
                on_hand = current,
                "Stock debit refused"
            );
            return Ok(StockApplied::Insufficient { on_hand: current });
        };

        let row = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: movement.product_id.clone(),
            qty_delta: movement.qty_delta,
            movement_type: movement.movement_type,
            ref_type: movement.ref_type,
            ref_id: movement.ref_id.clone(),
            actor_id: movement.actor_id.clone(),
            note: movement.note.clone(),
            created_at: movement.created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, product_id, qty_delta, movement_type, ref_type, ref_id, actor_id, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&row.id)
        .bind(&row.product_id)
        .bind(row.qty_delta)
        .bind(row.movement_type)
        .bind(row.ref_type)
        .bind(&row.ref_id)
        .bind(&row.actor_id)
        .bind(&row.note)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            product_id = %row.product_id,
            delta = row.qty_delta,
            movement_type = %row.movement_type,
            on_hand,
            "Stock movement recorded"
        );

        Ok(StockApplied::Applied {
            movement: row,
            on_hand,
        })
    }

    /// Current on-hand; 0 for a product never stocked.
    pub async fn on_hand(&self, product_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::on_hand_in(&mut conn, product_id).await
    }

    pub async fn on_hand_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
        let on_hand: Option<i64> =
            sqlx::query_scalar("SELECT on_hand FROM stock_items WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(on_hand.unwrap_or(0))
    }

    pub async fn get_item(&self, product_id: &str) -> DbResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>(
            "SELECT product_id, on_hand, updated_at FROM stock_items WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Movements for a product in the order they were written.
    pub async fn movements(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = ?1 ORDER BY rowid"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Movements written on behalf of one sale or refund.
    pub async fn movements_for_ref(&self, ref_type: RefType, ref_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE ref_type = ?1 AND ref_id = ?2 ORDER BY rowid"
        ))
        .bind(ref_type)
        .bind(ref_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Σ qty_delta for a product; equals on_hand when the ledger is sound.
    pub async fn movement_sum(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(qty_delta), 0) FROM stock_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
