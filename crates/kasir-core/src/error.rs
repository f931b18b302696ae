//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                         │
//! │  ├── CoreError        - Business-rule violations                       │
//! │  └── ValidationError  - Input validation failures (per field)          │
//! │                                                                         │
//! │  kasir-db errors                                                       │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  kasir-engine errors                                                   │
//! │  └── EngineError      - Core | Db                                      │
//! │                                                                         │
//! │  kasir-api errors                                                      │
//! │  └── ApiError         - HTTP 422 {message, errors?}                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Business messages are user-facing (Bahasa Indonesia, shown at the till)
//! 3. Every variant that concerns one input field can name that field, so
//!    the API can return `errors: {"items.1.qty": [...]}`

use std::collections::BTreeMap;

use thiserror::Error;

use crate::money::Money;

/// Field path → messages, e.g. `{"items.0.qty": ["qty must be positive"]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations.
///
/// None of these leave partial state behind: they are raised either by the
/// pure computation step or inside a transaction that is then rolled back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Keranjang belanja kosong.")]
    EmptyCart,

    /// Line `line` (zero-based) references a product that does not exist.
    #[error("Produk pada item #{} tidak ditemukan.", .line + 1)]
    ProductNotFound { line: usize, product_id: String },

    #[error("Produk pada item #{} sudah tidak aktif.", .line + 1)]
    ProductInactive { line: usize, product_id: String },

    /// Insufficient stock to complete a debit.
    ///
    /// ## When This Occurs
    /// - Checkout sells more than on hand and negative stock is not allowed
    /// - A manual adjustment would take on-hand below zero
    #[error("Stok {sku} tidak mencukupi: tersedia {available}, diminta {requested}.")]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    /// CASH tender below the grand total.
    #[error("Uang tunai ({cash_received}) kurang dari total belanja ({grand_total}).")]
    Underpayment {
        grand_total: Money,
        cash_received: Money,
    },

    #[error("Transaksi tidak ditemukan.")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Transaksi berstatus {current_status}, operasi tidak diizinkan.")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    #[error("Tanggal transaksi tidak tersedia.")]
    MissingOccurredAt { sale_id: String },

    /// The refund window closed (end of day, occurred_at + window days).
    #[error("Masa garansi refund sudah berakhir.")]
    RefundWindowExpired { sale_id: String },

    #[error("Masih ada pengajuan refund yang menunggu persetujuan untuk transaksi ini.")]
    RefundAlreadyPending { sale_id: String },

    #[error("Item #{} bukan bagian dari transaksi ini.", .line + 1)]
    SaleItemNotInSale { line: usize, sale_item_id: String },

    /// Requested quantity exceeds what is left after earlier refunds.
    #[error("Jumlah refund item #{} melebihi batas (maksimal {max_refundable}).", .line + 1)]
    RefundQtyExceeded {
        line: usize,
        sale_item_id: String,
        requested: i64,
        max_refundable: i64,
    },

    #[error("Total refund {requested} melebihi sisa nilai yang dapat di-refund ({remaining}).")]
    RefundAmountExceeded { requested: Money, remaining: Money },

    #[error("Pengajuan persetujuan tidak ditemukan.")]
    ApprovalNotFound(String),

    /// Approval already reached a terminal state.
    #[error("Pengajuan sudah diproses ({status}).")]
    ApprovalAlreadyDecided { approval_id: String, status: String },

    #[error("Pengguna tidak berwenang menyetujui pengajuan.")]
    ApproverNotAuthorized { user_id: String },

    #[error("Pengguna tidak ditemukan atau tidak aktif.")]
    UserNotFound(String),

    /// Stored approval payload could not be decoded for its action.
    #[error("Invalid approval payload: {0}")]
    InvalidPayload(String),
}

impl CoreError {
    /// Field-level detail for the API's `errors` object, when the error is
    /// about one identifiable input field.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        let field = match self {
            CoreError::Validation(e) => e.field().to_string(),
            CoreError::EmptyCart => "items".to_string(),
            CoreError::ProductNotFound { line, .. } | CoreError::ProductInactive { line, .. } => {
                format!("items.{line}.product_id")
            }
            CoreError::Underpayment { .. } => "cash_received".to_string(),
            CoreError::SaleItemNotInSale { line, .. } => format!("items.{line}.sale_item_id"),
            CoreError::RefundQtyExceeded { line, .. } => format!("items.{line}.qty"),
            _ => return None,
        };

        let mut errors = FieldErrors::new();
        errors.insert(field, vec![self.to_string()]);
        Some(errors)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any persistence. `field` is a dotted path into the request
/// body (`items.2.qty`), so the terminal can highlight the offending input.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Timestamp later than the server clock allows.
    #[error("{field} must not be in the future")]
    InFuture { field: String },

    /// Same value given twice where it must be unique.
    #[error("{field} '{value}' is listed more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// The dotted field path this error is about.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::InFuture { field }
            | ValidationError::Duplicate { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
