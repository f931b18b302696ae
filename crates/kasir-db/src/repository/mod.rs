//! # Repository Module
//!
//! Database repository implementations for Kasir POS.
//!
//! ## Two Calling Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads from a handler                                                   │
//! │       db.sales().get_by_id(id)          &self, acquires from the pool   │
//! │                                                                         │
//! │  Writes inside a transaction script                                     │
//! │       let mut tx = db.begin().await?;                                   │
//! │       SaleRepository::insert_sale(&mut tx, &sale)                       │
//! │       StockRepository::record(&mut tx, &movement, false)                │
//! │       tx.commit()                      associated fns on a connection   │
//! │                                                                         │
//! │  Every `&self` method delegates to the associated fn, so the SQL lives  │
//! │  in exactly one place.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product lookup for checkout
//! - [`user::UserRepository`] - Cashier / approver resolution
//! - [`settings::SettingsRepository`] - `app_settings` key/value
//! - [`stock::StockRepository`] - Stock ledger (movements + on-hand)
//! - [`sale::SaleRepository`] - Sales, items, payments, invoice numbers
//! - [`refund::RefundRepository`] - Refund headers, items, history
//! - [`approval::ApprovalRepository`] - Approval rows and transitions
//! - [`sync::SyncRepository`] - Sync batches and idempotency keys
//! - [`audit::AuditRepository`] - Audit log

pub mod approval;
pub mod audit;
pub mod product;
pub mod refund;
pub mod sale;
pub mod settings;
pub mod stock;
pub mod sync;
pub mod user;
