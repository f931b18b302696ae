//! # kasir-engine: Transaction Scripts for Kasir POS
//!
//! Each operation follows the same shape: read what it needs, run the pure
//! computation from kasir-core, then perform one atomic write through
//! kasir-db. Nothing is half-written; a failure anywhere drops the
//! transaction.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SyncGate ──────────────┐                                               │
//! │  (idempotency keys)     ▼                                               │
//! │                  CheckoutEngine ─────────────► StockLedger              │
//! │                  (sale graph)                  (movements, on-hand)     │
//! │                                                      ▲                  │
//! │  RefundRequestService ──► ApprovalWorkflow ──────────┘                  │
//! │  (eligibility, PENDING)   (approve / reject, refund + void execution)   │
//! │                                                                         │
//! │  all share one Engine: Database + EngineConfig + Clock                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let engine = Engine::new(db, EngineConfig::default());
//! let receipt = engine.checkout().checkout(request, "kasir-01").await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kasir_db::Database;

pub mod approvals;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod refunds;
pub mod sync_gate;

pub use approvals::{ApprovalDecision, ApprovalRequestInput, ApprovalWorkflow};
pub use checkout::{CheckoutEngine, CheckoutReceipt, CheckoutRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use ledger::{StockAdjustment, StockLedger, StockSnapshot};
pub use refunds::{RefundRequest, RefundRequestService, RefundRequested};
pub use sync_gate::{SyncBatchRequest, SyncBatchResponse, SyncGate, SyncTransaction};

/// Shared handle: storage, static config, and the clock.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Engine { db, config, clock }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn checkout(&self) -> CheckoutEngine {
        CheckoutEngine::new(self.clone())
    }

    pub fn sync_gate(&self) -> SyncGate {
        SyncGate::new(self.clone())
    }

    pub fn refunds(&self) -> RefundRequestService {
        RefundRequestService::new(self.clone())
    }

    pub fn approvals(&self) -> ApprovalWorkflow {
        ApprovalWorkflow::new(self.clone())
    }

    pub fn stock(&self) -> StockLedger {
        StockLedger::new(self.clone())
    }
}
