//! # Validation Module
//!
//! Field-level input validation for Kasir POS requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extraction (serde)                                      │
//! │  ├── Shape and type checks                                             │
//! │  └── 422 with the serde message                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Ranges, required fields, duplicates                               │
//! │  └── Errors carry a dotted field path: items.1.qty                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (totals equation, qty > 0)                      │
//! │  ├── UNIQUE constraints (local_txn_uuid, invoice_no, batch_uuid)       │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validator takes the field path so that the same rule can report
//! `qty` for a single value and `items.3.qty` for a cart line.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted free-text reason (refund, rejection, override).
pub const MAX_REASON_LEN: usize = 500;

/// Longest accepted client-generated identifier.
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// Builds the dotted path for a field of a list entry: `items.2.qty`.
pub fn item_field(list: &str, index: usize, field: &str) -> String {
    format!("{list}.{index}.{field}")
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a client-generated identifier (local_txn_uuid, batch_uuid,
/// device_id).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 64 characters
/// - No whitespace or `:` (the idempotency key separator)
///
/// ## Example
/// ```rust
/// use kasir_core::validation::validate_client_id;
///
/// assert!(validate_client_id("batch_uuid", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_client_id("device_id", "TILL-01").is_ok());
/// assert!(validate_client_id("device_id", "").is_err());
/// assert!(validate_client_id("device_id", "till:01").is_err());
/// ```
pub fn validate_client_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_CLIENT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CLIENT_ID_LEN,
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace or ':'".to_string(),
        });
    }

    Ok(())
}

/// Validates a free-text reason.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 500 characters
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

/// Validates an optional note; blank notes collapse to `None`.
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<Option<String>> {
    match note.map(str::trim) {
        None | Some("") => Ok(None),
        Some(note) if note.chars().count() > MAX_REASON_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_REASON_LEN,
        }),
        Some(note) => Ok(Some(note.to_string())),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout line #2: qty 0                                                │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity("items.1.qty", 0) ← THIS FUNCTION                   │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → errors: {"items.1.qty": ["... must be positive"]}│
/// │       ├── qty > 999? → errors: {"items.1.qty": ["... between 1 and 999"]}│
/// │       └── OK → price the line                                          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount (discount, cash received).
///
/// ## Example
/// ```rust
/// use kasir_core::validation::validate_amount;
///
/// assert!(validate_amount("cash_received", 50_000).is_ok());
/// assert!(validate_amount("cash_received", 0).is_ok());
/// assert!(validate_amount("cash_received", -1).is_err());
/// ```
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a manual stock delta: non-zero, within ±MAX_ITEM_QUANTITY × 100.
pub fn validate_stock_delta(field: &str, delta: i64) -> ValidationResult<()> {
    let bound = MAX_ITEM_QUANTITY * 100;
    if delta == 0 || delta.abs() > bound {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -bound,
            max: bound,
        });
    }

    Ok(())
}

/// Rejects a client timestamp more than `skew` ahead of `now`.
pub fn validate_not_future(
    field: &str,
    at: DateTime<Utc>,
    now: DateTime<Utc>,
    skew: Duration,
) -> ValidationResult<()> {
    if at > now + skew {
        return Err(ValidationError::InFuture {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates a list length: at least one entry, at most `max`.
pub fn validate_list_size(field: &str, len: usize, max: usize) -> ValidationResult<()> {
    if len == 0 {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if len > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

/// Validates cart line count against MAX_CART_ITEMS.
pub fn validate_cart_size(len: usize) -> ValidationResult<()> {
    validate_list_size("items", len, MAX_CART_ITEMS)
}

/// Rejects the first id that appears twice, naming its position.
///
/// ## Example
/// ```rust
/// use kasir_core::validation::validate_unique_ids;
///
/// assert!(validate_unique_ids("items", "sale_item_id", ["a", "b"]).is_ok());
/// let err = validate_unique_ids("items", "sale_item_id", ["a", "b", "a"]).unwrap_err();
/// assert_eq!(err.field(), "items.2.sale_item_id");
/// ```
pub fn validate_unique_ids<'a, I>(list: &str, field: &str, ids: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for (index, id) in ids.into_iter().enumerate() {
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: item_field(list, index, field),
                value: id.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
