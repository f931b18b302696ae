//! # kasir-db: Database Layer for Kasir POS
//!
//! SQLite storage for the transaction core, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir POS Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /checkout)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kasir-engine (CheckoutEngine, SyncGate, ApprovalWorkflow, ...)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ StockRepo     │    │ 001_initial_ │  │   │
//! │  │   │ begin() → tx  │    │ ApprovalRepo  │    │   schema.sql │  │   │
//! │  │   │               │    │ SyncRepo ...  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (kasir.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (sale, stock, approval, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{Database, DbConfig, SaleRepository};
//!
//! let db = Database::new(DbConfig::new("kasir.db")).await?;
//!
//! // Plain reads go through the pool
//! let sale = db.sales().get_by_id("sale-id").await?;
//!
//! // Writes compose associated functions on one transaction
//! let mut tx = db.begin().await?;
//! let invoice_no = SaleRepository::next_invoice_no(&mut tx, today).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::approval::{ApprovalListItem, ApprovalRepository};
pub use repository::audit::{AuditEntry, AuditRepository};
pub use repository::product::ProductRepository;
pub use repository::refund::RefundRepository;
pub use repository::sale::SaleRepository;
pub use repository::settings::SettingsRepository;
pub use repository::stock::{NewMovement, StockApplied, StockRepository};
pub use repository::sync::SyncRepository;
pub use repository::user::UserRepository;
