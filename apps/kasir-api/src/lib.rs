//! # Kasir API
//!
//! JSON over HTTP for the tills and the back office.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Kasir API                                  │
//! │                                                                         │
//! │  Checkout                       Sync                                    │
//! │  • POST /checkout               • POST /sync/batches                    │
//! │                                 • GET  /sync/batches/{batch_uuid}       │
//! │                                                                         │
//! │  Refunds                        Approvals                               │
//! │  • POST /refunds                • POST /approvals                       │
//! │  • GET  /sales/{id}/            • GET  /approvals?status=&limit=        │
//! │         refund-eligibility      • GET  /approvals/{id}                  │
//! │                                 • POST /approvals/{id}/approve          │
//! │  Stock                          • POST /approvals/{id}/reject           │
//! │  • POST /stock/adjustments                                              │
//! │  • GET  /stock/{product_id}     Health: GET /health                     │
//! │                                                                         │
//! │  X-User-Id names the acting user on every write.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `KASIR_HTTP_PORT` - HTTP port (default: 8080)
//! - `KASIR_DATABASE_PATH` - SQLite file (default: ./kasir.db)
//! - `KASIR_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `KASIR_TAX_RATE_BPS` - Tax rate in basis points (default: 1100)
//! - `KASIR_ALLOW_NEGATIVE_STOCK` - Let sales go below zero (default: false)
//! - `KASIR_UTC_OFFSET_MINUTES` - Store timezone (default: 420)
//! - `KASIR_SYNC_BATCH_LIMIT` - Transactions per batch (default: 500)

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use axum::Router;
use tower_http::trace::TraceLayer;

use kasir_engine::Engine;

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Engine,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        AppState { engine }
    }
}

/// Full router with request tracing.
pub fn router(state: AppState) -> Router {
    routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
