//! # Domain Types
//!
//! Core records and status enums shared by every Kasir crate.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │──►│    SaleItem     │   │    Payment      │       │
//! │  │  invoice_no     │   │  *_snapshot     │   │  one per sale   │       │
//! │  │  local_txn_uuid │   │  line_total     │   │  CASH | EWALLET │       │
//! │  └────────┬────────┘   └────────┬────────┘   └─────────────────┘       │
//! │           │                     │                                       │
//! │  ┌────────▼────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │     Refund      │──►│   RefundItem    │   │  StockMovement  │       │
//! │  │  approval_id    │   │  Σqty ≤ item    │   │  append-only    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SyncBatch     │   │ SyncIdempotency │   │    AuditLog     │       │
//! │  │  batch_uuid     │   │ device:txn_uuid │   │  append-only    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are stored as plain `i64` Rupiah columns and exposed as [`Money`]
//! through accessor methods. Status enums serialize as SCREAMING_SNAKE_CASE
//! text, both on the wire and in SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%. PPN 11% = 1100 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Text codec shared by the status enums: `as_str`, `Display`, `FromStr`.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire and storage representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    )),
                }
            }
        }
    };
}

/// Lifecycle of a sale.
///
/// Checkout only ever writes PAID. The one later transition is PAID → VOID
/// through an approved VOID request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Draft,
    PendingPayment,
    Paid,
    Void,
    SyncFailed,
}

text_enum!(SaleStatus {
    Draft => "DRAFT",
    PendingPayment => "PENDING_PAYMENT",
    Paid => "PAID",
    Void => "VOID",
    SyncFailed => "SYNC_FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash; change is returned.
    Cash,
    /// QRIS / e-wallet; settles the exact grand total.
    Ewallet,
}

text_enum!(PaymentMethod {
    Cash => "CASH",
    Ewallet => "EWALLET",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Recorded,
    Confirmed,
}

text_enum!(PaymentStatus {
    Recorded => "RECORDED",
    Confirmed => "CONFIRMED",
});

/// Why on-hand stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Debit written by checkout, one per sale line.
    SaleOut,
    /// Credit written by an approved refund, one per refund line.
    ReturnIn,
    /// Manual correction or void restock.
    Adjustment,
    /// Correction after reconciling a device's offline stock view.
    SyncCorrection,
}

text_enum!(MovementType {
    SaleOut => "SALE_OUT",
    ReturnIn => "RETURN_IN",
    Adjustment => "ADJUSTMENT",
    SyncCorrection => "SYNC_CORRECTION",
});

impl MovementType {
    /// Types accepted by the manual adjustment entry point.
    pub const fn is_manual(&self) -> bool {
        matches!(self, MovementType::Adjustment | MovementType::SyncCorrection)
    }
}

/// Record that caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefType {
    Sale,
    Refund,
    Adjustment,
}

text_enum!(RefType {
    Sale => "SALE",
    Refund => "REFUND",
    Adjustment => "ADJUSTMENT",
});

/// Sensitive actions that need a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    DiscountOverride,
    PriceOverride,
    Void,
    Refund,
}

text_enum!(ApprovalAction {
    DiscountOverride => "DISCOUNT_OVERRIDE",
    PriceOverride => "PRICE_OVERRIDE",
    Void => "VOID",
    Refund => "REFUND",
});

/// Approval lifecycle: PENDING → APPROVED | REJECTED, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(ApprovalStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

impl ApprovalStatus {
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncBatchStatus {
    Received,
    Processed,
    Failed,
}

text_enum!(SyncBatchStatus {
    Received => "RECEIVED",
    Processed => "PROCESSED",
    Failed => "FAILED",
});

/// Per-transaction result inside a sync batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOutcome {
    Processed,
    Duplicate,
    Failed,
}

text_enum!(SyncOutcome {
    Processed => "PROCESSED",
    Duplicate => "DUPLICATE",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Cashier,
    Supervisor,
    Admin,
}

text_enum!(UserRole {
    Cashier => "CASHIER",
    Supervisor => "SUPERVISOR",
    Admin => "ADMIN",
});

impl UserRole {
    /// Roles allowed to decide approvals.
    pub const fn can_approve(&self) -> bool {
        matches!(self, UserRole::Supervisor | UserRole::Admin)
    }
}

// =============================================================================
// Collaborator Records (read-only here)
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub name: String,
    /// Selling price in Rupiah.
    pub price: i64,
    /// Inactive products cannot be sold.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::new(self.price)
    }
}

/// A staff member.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Active supervisors and admins may decide approvals.
    pub fn can_approve(&self) -> bool {
        self.is_active && self.role.can_approve()
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Current on-hand projection for one product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockItem {
    pub product_id: String,
    pub on_hand: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One append-only entry in the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    /// Signed: negative for debits (SALE_OUT), positive for credits.
    pub qty_delta: i64,
    pub movement_type: MovementType,
    pub ref_type: RefType,
    pub ref_id: Option<String>,
    pub actor_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale.
///
/// `grand_total = subtotal − discount_total + tax_total` always holds; the
/// database enforces it with a CHECK constraint as well.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-legible, server-assigned: `INV-20250101-0001`.
    pub invoice_no: String,
    /// Client-generated id, unique across all time.
    pub local_txn_uuid: String,
    pub device_id: Option<String>,
    pub cashier_id: String,
    pub status: SaleStatus,
    pub subtotal: i64,
    pub discount_total: i64,
    pub tax_total: i64,
    pub grand_total: i64,
    pub paid_total: i64,
    pub change_total: i64,
    /// When the sale happened at the till (may predate sync).
    #[ts(as = "Option<String>")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::new(self.subtotal)
    }

    #[inline]
    pub fn discount_total(&self) -> Money {
        Money::new(self.discount_total)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::new(self.grand_total)
    }

    /// The amount refunds are bounded by: `subtotal − discount_total`.
    ///
    /// Tax is excluded.
    #[inline]
    pub fn refundable_basis(&self) -> Money {
        self.subtotal() - self.discount_total()
    }
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price at time of sale (frozen).
    pub unit_price: i64,
    pub qty: i64,
    pub discount_amount: i64,
    /// `unit_price × qty − discount_amount`.
    pub line_total: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::new(self.unit_price)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::new(self.line_total)
    }
}

/// The single payment recorded for a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: i64,
    /// For cash: amount the customer handed over.
    pub cash_received: Option<i64>,
    pub change_amount: i64,
    /// E-wallet transaction reference.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::new(self.amount)
    }
}

// =============================================================================
// Refund
// =============================================================================

/// An executed refund. Only written when a REFUND approval is approved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub sale_id: String,
    pub approval_id: String,
    pub requested_by: String,
    pub approved_by: String,
    pub total_amount: i64,
    pub reason: String,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Refund {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::new(self.total_amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundItem {
    pub id: String,
    pub refund_id: String,
    pub sale_item_id: String,
    pub qty: i64,
    /// `line_total / max(item.qty, 1)`, floored.
    pub unit_price: i64,
    pub line_total: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sync
// =============================================================================

/// One upload of offline transactions from a device.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncBatch {
    pub id: String,
    pub device_id: String,
    /// Client-generated, globally unique.
    pub batch_uuid: String,
    pub status: SyncBatchStatus,
    pub error_message: Option<String>,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Write-once marker that `device_id:local_txn_uuid` was already applied.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncIdempotencyKey {
    pub key: String,
    pub ref_type: RefType,
    pub ref_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

/// Append-only record of a state change, consumed outside this system.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditLog {
    pub id: String,
    pub actor_id: Option<String>,
    /// e.g. `REFUND_EXECUTED`, `SALE_VOIDED`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON document.
    pub details: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Audit action names written by this system.
pub mod audit_action {
    pub const REFUND_EXECUTED: &str = "REFUND_EXECUTED";
    pub const SALE_VOIDED: &str = "SALE_VOIDED";
    pub const APPROVAL_REJECTED: &str = "APPROVAL_REJECTED";
    pub const APPROVAL_APPROVED: &str = "APPROVAL_APPROVED";
    pub const STOCK_ADJUSTED: &str = "STOCK_ADJUSTED";
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_default_is_ppn() {
        assert_eq!(TaxRate::default().bps(), 1100);
        assert!((TaxRate::from_bps(1100).percentage() - 11.0).abs() < 0.001);
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in SaleStatus::ALL {
            assert_eq!(status.as_str().parse::<SaleStatus>().unwrap(), *status);
        }
        assert_eq!(MovementType::SaleOut.to_string(), "SALE_OUT");
        assert!("paid".parse::<SaleStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_text() {
        let json = serde_json::to_string(&ApprovalAction::DiscountOverride).unwrap();
        assert_eq!(json, "\"DISCOUNT_OVERRIDE\"");
        let method: PaymentMethod = serde_json::from_str("\"EWALLET\"").unwrap();
        assert_eq!(method, PaymentMethod::Ewallet);
    }

    #[test]
    fn test_approver_roles() {
        assert!(!UserRole::Cashier.can_approve());
        assert!(UserRole::Supervisor.can_approve());
        assert!(UserRole::Admin.can_approve());
    }

    #[test]
    fn test_manual_movement_types() {
        assert!(MovementType::Adjustment.is_manual());
        assert!(MovementType::SyncCorrection.is_manual());
        assert!(!MovementType::SaleOut.is_manual());
        assert!(!MovementType::ReturnIn.is_manual());
    }

    #[test]
    fn test_approval_terminality() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }
}
