//! # kasir-core: Pure Business Logic for Kasir POS
//!
//! The transaction-integrity rules of the point-of-sale backend, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir POS Architecture                           │
//! │                                                                         │
//! │   Cashier terminal ──► POST /checkout, POST /sync/batches               │
//! │   Supervisor       ──► POST /approvals/{id}/approve                     │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kasir-engine (transaction scripts)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure computation first             │   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │ checkout │ │  refund  │ │ approval │ │   sync   │          │   │
//! │  │   │  totals  │ │  window  │ │  states  │ │ outcomes │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │ then one atomic write              │   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    kasir-db (SQLite repositories)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer Rupiah amounts and tax math
//! - [`types`] - Domain records (Sale, StockMovement, Refund, ...)
//! - [`checkout`] - Cart pricing and sale totals
//! - [`refund`] - Refund window and remaining-quantity accounting
//! - [`approval`] - Approval state machine and typed payloads
//! - [`sync`] - Idempotency keys and batch outcome aggregation
//! - [`settings`] - Lenient parsing of runtime settings
//! - [`validation`] - Field-level input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::money::Money;
//! use kasir_core::types::TaxRate;
//!
//! // PPN 11% on Rp 40.000
//! let tax = Money::new(40_000).calculate_tax(TaxRate::from_bps(1100));
//! assert_eq!(tax.amount(), 4_400);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod approval;
pub mod checkout;
pub mod error;
pub mod money;
pub mod refund;
pub mod settings;
pub mod sync;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use approval::{Approval, ApprovalPayload};
pub use error::{CoreError, CoreResult, FieldErrors, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches fat-finger entries (1000 instead of 10) at the terminal.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default PPN (VAT) rate in basis points: 11%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1100;
