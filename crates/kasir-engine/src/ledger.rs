//! # Stock Ledger
//!
//! Every change to on-hand goes through [`StockLedger::record_movement`],
//! inside the transaction of the thing that caused it:
//!
//! ```text
//! checkout          SALE_OUT        −qty   ref SALE    (may fail: stock)
//! refund execution  RETURN_IN       +qty   ref REFUND
//! void execution    ADJUSTMENT      +qty   ref SALE
//! manual adjust     ADJUSTMENT /    ±qty   ref ADJUSTMENT
//!                   SYNC_CORRECTION
//! ```
//!
//! Σ qty_delta over a product's movements always equals its on_hand.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::info;

use kasir_core::types::audit_action;
use kasir_core::validation::{validate_note, validate_stock_delta};
use kasir_core::{CoreError, MovementType, RefType, StockMovement, ValidationError};
use kasir_db::{AuditEntry, AuditRepository, DbError, NewMovement, ProductRepository, StockApplied, StockRepository};

use crate::error::EngineResult;
use crate::Engine;

/// Manual correction request.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub product_id: String,
    pub qty_delta: i64,
    /// ADJUSTMENT unless given.
    #[serde(default)]
    pub movement_type: Option<MovementType>,
    #[serde(default)]
    pub note: Option<String>,
}

/// On-hand plus the movements that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct StockSnapshot {
    pub product_id: String,
    pub on_hand: i64,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Clone)]
pub struct StockLedger {
    engine: Engine,
}

impl StockLedger {
    pub fn new(engine: Engine) -> Self {
        StockLedger { engine }
    }

    /// Appends `movement` on the caller's transaction.
    ///
    /// A refused debit becomes [`CoreError::InsufficientStock`].
    pub async fn record_movement(
        conn: &mut SqliteConnection,
        movement: &NewMovement,
        allow_negative: bool,
    ) -> EngineResult<StockMovement> {
        match StockRepository::record(conn, movement, allow_negative).await? {
            StockApplied::Applied { movement, .. } => Ok(movement),
            StockApplied::Insufficient { on_hand } => {
                let sku = ProductRepository::find(conn, &movement.product_id)
                    .await?
                    .map(|p| p.sku)
                    .unwrap_or_else(|| movement.product_id.clone());

                Err(CoreError::InsufficientStock {
                    product_id: movement.product_id.clone(),
                    sku,
                    available: on_hand,
                    requested: -movement.qty_delta,
                }
                .into())
            }
        }
    }

    /// Records a manual correction and audits it.
    pub async fn adjust(&self, adjustment: StockAdjustment, actor_id: &str) -> EngineResult<StockMovement> {
        let movement_type = adjustment.movement_type.unwrap_or(MovementType::Adjustment);
        if !movement_type.is_manual() {
            return Err(ValidationError::NotAllowed {
                field: "movement_type".to_string(),
                allowed: vec![
                    MovementType::Adjustment.to_string(),
                    MovementType::SyncCorrection.to_string(),
                ],
            }
            .into());
        }
        validate_stock_delta("qty_delta", adjustment.qty_delta)?;
        let note = validate_note("note", adjustment.note.as_deref())?;

        let db = self.engine.db();
        match db.users().get_by_id(actor_id).await? {
            Some(user) if user.is_active => {}
            _ => return Err(CoreError::UserNotFound(actor_id.to_string()).into()),
        }
        if db.products().get_by_id(&adjustment.product_id).await?.is_none() {
            return Err(DbError::not_found("Product", adjustment.product_id).into());
        }

        let now = self.engine.now();
        let mut tx = db.begin().await?;

        let recorded = Self::record_movement(
            &mut tx,
            &NewMovement {
                product_id: adjustment.product_id.clone(),
                qty_delta: adjustment.qty_delta,
                movement_type,
                ref_type: RefType::Adjustment,
                ref_id: None,
                actor_id: Some(actor_id.to_string()),
                note,
                created_at: now,
            },
            self.engine.config().allow_negative_stock,
        )
        .await;
        let movement = match recorded {
            Ok(movement) => movement,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        AuditRepository::insert(
            &mut tx,
            &AuditEntry {
                actor_id: Some(actor_id),
                action: audit_action::STOCK_ADJUSTED,
                entity_type: "product",
                entity_id: &movement.product_id,
                details: json!({
                    "movement_id": movement.id,
                    "movement_type": movement.movement_type,
                    "qty_delta": movement.qty_delta,
                    "note": movement.note,
                }),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %movement.product_id,
            delta = movement.qty_delta,
            movement_type = %movement.movement_type,
            "Stock adjusted"
        );
        Ok(movement)
    }

    pub async fn on_hand(&self, product_id: &str) -> EngineResult<i64> {
        Ok(self.engine.db().stock().on_hand(product_id).await?)
    }

    pub async fn snapshot(&self, product_id: &str) -> EngineResult<StockSnapshot> {
        let db = self.engine.db();
        if db.products().get_by_id(product_id).await?.is_none() {
            return Err(DbError::not_found("Product", product_id).into());
        }

        Ok(StockSnapshot {
            product_id: product_id.to_string(),
            on_hand: db.stock().on_hand(product_id).await?,
            movements: db.stock().movements(product_id).await?,
        })
    }
}
