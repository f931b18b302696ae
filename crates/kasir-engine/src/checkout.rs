//! # Checkout Engine
//!
//! Cart → persisted sale graph, all or nothing.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  prepare (no transaction)                                               │
//! │    validate ids, resolve cashier, load products                         │
//! │    kasir_core::checkout::plan_checkout → lines, totals, payment         │
//! │                                                                         │
//! │  persist (one transaction)                                              │
//! │    invoice_no   ← invoice_sequences upsert                              │
//! │    sales        ← header, status PAID                                   │
//! │    sale_items   ← one per line, product snapshot                        │
//! │    stock        ← SALE_OUT −qty per line   ✗ insufficient → rollback    │
//! │    payments     ← one row, CONFIRMED                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sync gate reuses both halves, wrapping `persist` in its own
//! transaction next to the idempotency key.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use kasir_core::checkout::{plan_checkout, CartLine, CheckoutPlan, PaymentInstruction, SaleTotals};
use kasir_core::validation::{validate_client_id, validate_not_future};
use kasir_core::{
    CoreError, Money, MovementType, Payment, PaymentMethod, PaymentStatus, RefType, Sale, SaleItem,
    SaleStatus, ValidationError,
};
use kasir_db::{NewMovement, SaleRepository};

use crate::config::{EngineConfig, MAX_CLOCK_SKEW_MINUTES};
use crate::error::{EngineError, EngineResult};
use crate::ledger::StockLedger;
use crate::Engine;

// =============================================================================
// Request / Response
// =============================================================================

/// Checkout body, shared by `POST /checkout` and sync transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cash_received: Option<i64>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Client transaction id; generated when absent.
    #[serde(default)]
    pub local_txn_uuid: Option<String>,
    /// When the sale happened on the terminal; defaults to now.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    pub items: Vec<CartLine>,
}

impl CheckoutRequest {
    fn payment(&self) -> PaymentInstruction {
        PaymentInstruction {
            method: self.payment_method,
            cash_received: self.cash_received,
            reference: self.reference.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptLine {
    pub sale_item_id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub qty: i64,
    pub discount_amount: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptPayment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub cash_received: Option<Money>,
    pub change_amount: Money,
    pub reference: Option<String>,
}

/// What the terminal prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutReceipt {
    pub sale_id: String,
    pub invoice_no: String,
    pub local_txn_uuid: String,
    pub status: SaleStatus,
    pub occurred_at: DateTime<Utc>,
    pub payment: ReceiptPayment,
    pub items: Vec<ReceiptLine>,
    pub totals: SaleTotals,
}

/// A validated, priced checkout that has not touched storage yet.
#[derive(Debug, Clone)]
pub struct PreparedCheckout {
    pub sale_id: String,
    pub local_txn_uuid: String,
    pub device_id: Option<String>,
    pub cashier_id: String,
    pub occurred_at: DateTime<Utc>,
    pub plan: CheckoutPlan,
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    engine: Engine,
}

impl CheckoutEngine {
    pub fn new(engine: Engine) -> Self {
        CheckoutEngine { engine }
    }

    /// Direct checkout from a terminal that is online.
    ///
    /// ## Errors
    /// - validation / pricing failures from [`plan_checkout`]
    /// - [`CoreError::InsufficientStock`] (unless negative stock is allowed)
    /// - `local_txn_uuid` already used by another sale
    pub async fn checkout(&self, request: CheckoutRequest, cashier_id: &str) -> EngineResult<CheckoutReceipt> {
        let result = self.run(request, cashier_id).await;
        if let Err(e) = &result {
            if e.is_rejection() {
                warn!(cashier_id = %cashier_id, error = %e, "Checkout rejected");
            }
        }
        result
    }

    async fn run(&self, request: CheckoutRequest, cashier_id: &str) -> EngineResult<CheckoutReceipt> {
        let prepared = self.prepare(&request, cashier_id, None).await?;

        let mut tx = self.engine.db().begin().await?;
        let receipt = match Self::persist(&mut tx, &prepared, self.engine.config(), self.engine.now()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tx.rollback().await?;
                return Err(match e {
                    EngineError::Db(db) if db.is_unique_violation_on("sales.local_txn_uuid") => {
                        ValidationError::Duplicate {
                            field: "local_txn_uuid".to_string(),
                            value: prepared.local_txn_uuid,
                        }
                        .into()
                    }
                    other => other,
                });
            }
        };
        tx.commit().await?;

        info!(
            sale_id = %receipt.sale_id,
            invoice_no = %receipt.invoice_no,
            grand_total = %receipt.totals.grand_total,
            "Sale completed"
        );
        Ok(receipt)
    }

    /// Validates and prices a checkout using pool reads only.
    pub async fn prepare(
        &self,
        request: &CheckoutRequest,
        cashier_id: &str,
        device_id: Option<&str>,
    ) -> EngineResult<PreparedCheckout> {
        let local_txn_uuid = match request.local_txn_uuid.as_deref() {
            Some(uuid) => {
                validate_client_id("local_txn_uuid", uuid)?;
                uuid.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        let now = self.engine.now();
        if let Some(at) = request.occurred_at {
            validate_not_future("occurred_at", at, now, Duration::minutes(MAX_CLOCK_SKEW_MINUTES))?;
        }

        let db = self.engine.db();
        match db.users().get_by_id(cashier_id).await? {
            Some(user) if user.is_active => {}
            _ => return Err(CoreError::UserNotFound(cashier_id.to_string()).into()),
        }

        let mut ids: Vec<String> = request.items.iter().map(|l| l.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        let products = db.products().get_many(&ids).await?;

        let plan = plan_checkout(
            &request.items,
            &products,
            &request.payment(),
            self.engine.config().tax_rate,
        )?;

        Ok(PreparedCheckout {
            sale_id: Uuid::new_v4().to_string(),
            local_txn_uuid,
            device_id: device_id.map(str::to_string),
            cashier_id: cashier_id.to_string(),
            occurred_at: request.occurred_at.unwrap_or(now),
            plan,
        })
    }

    /// Writes the sale graph on the caller's transaction.
    pub async fn persist(
        conn: &mut SqliteConnection,
        prepared: &PreparedCheckout,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> EngineResult<CheckoutReceipt> {
        let plan = &prepared.plan;
        let totals = plan.totals;

        // Numbered by assignment day so late offline replays never reuse a
        // closed day's sequence.
        let invoice_no = SaleRepository::next_invoice_no(conn, config.business_date(now)).await?;

        let sale = Sale {
            id: prepared.sale_id.clone(),
            invoice_no,
            local_txn_uuid: prepared.local_txn_uuid.clone(),
            device_id: prepared.device_id.clone(),
            cashier_id: prepared.cashier_id.clone(),
            status: SaleStatus::Paid,
            subtotal: totals.subtotal.amount(),
            discount_total: totals.discount_total.amount(),
            tax_total: totals.tax_total.amount(),
            grand_total: totals.grand_total.amount(),
            paid_total: totals.paid_total.amount(),
            change_total: totals.change_total.amount(),
            occurred_at: Some(prepared.occurred_at),
            synced_at: prepared.device_id.as_ref().map(|_| now),
            created_at: now,
        };
        SaleRepository::insert_sale(conn, &sale).await?;

        let mut lines = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price: line.unit_price.amount(),
                qty: line.qty,
                discount_amount: line.discount_amount.amount(),
                line_total: line.line_total.amount(),
                created_at: now,
            };
            SaleRepository::insert_item(conn, &item).await?;

            StockLedger::record_movement(
                conn,
                &NewMovement {
                    product_id: line.product_id.clone(),
                    qty_delta: -line.qty,
                    movement_type: MovementType::SaleOut,
                    ref_type: RefType::Sale,
                    ref_id: Some(sale.id.clone()),
                    actor_id: Some(sale.cashier_id.clone()),
                    note: None,
                    created_at: now,
                },
                config.allow_negative_stock,
            )
            .await?;

            lines.push(ReceiptLine {
                sale_item_id: item.id,
                product_id: item.product_id,
                sku: item.sku_snapshot,
                name: item.name_snapshot,
                unit_price: line.unit_price,
                qty: line.qty,
                discount_amount: line.discount_amount,
                line_total: line.line_total,
            });
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            method: plan.payment.method,
            status: PaymentStatus::Confirmed,
            amount: plan.payment.amount.amount(),
            cash_received: plan.payment.cash_received.map(|m| m.amount()),
            change_amount: plan.payment.change_amount.amount(),
            reference: plan.payment.reference.clone(),
            created_at: now,
        };
        SaleRepository::insert_payment(conn, &payment).await?;

        Ok(CheckoutReceipt {
            sale_id: sale.id,
            invoice_no: sale.invoice_no,
            local_txn_uuid: sale.local_txn_uuid,
            status: sale.status,
            occurred_at: prepared.occurred_at,
            payment: ReceiptPayment {
                method: payment.method,
                status: payment.status,
                amount: plan.payment.amount,
                cash_received: plan.payment.cash_received,
                change_amount: plan.payment.change_amount,
                reference: payment.reference,
            },
            items: lines,
            totals,
        })
    }
}

