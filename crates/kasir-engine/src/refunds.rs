//! # Refund Request Service
//!
//! Turns a cashier's refund request into a PENDING approval. Nothing is
//! paid out and no stock moves until a supervisor approves it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale exists, PAID, has occurred_at                                     │
//! │  now ≤ deadline (RefundPolicy: window_days, business offset)            │
//! │  no PENDING refund approval for the sale                                │
//! │  per line: belongs to sale, 0 < qty ≤ item.qty − refunded               │
//! │  Σ line amounts ≤ subtotal − discount_total − Σ refunds                 │
//! │                         │                                               │
//! │                         ▼                                               │
//! │  INSERT approvals (REFUND, PENDING, payload = priced snapshot)          │
//! │    partial unique index (sale_id) WHERE REFUND AND PENDING              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use kasir_core::approval::RefundPayload;
use kasir_core::refund::{
    check_sale_refundable, ensure_window_open, ensure_within_remaining, plan_refund_lines,
    remaining_refundable, RefundEligibility, RefundLine, RefundPolicy, RefundRequestLine,
};
use kasir_core::settings::{refund_window_days, REFUND_WINDOW_DAYS_KEY};
use kasir_core::validation::validate_reason;
use kasir_core::{
    Approval, ApprovalAction, ApprovalPayload, ApprovalStatus, CoreError, Money, Sale,
};
use kasir_db::{ApprovalRepository, DbError};

use crate::error::{EngineError, EngineResult};
use crate::Engine;

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub sale_id: String,
    pub reason: String,
    pub items: Vec<RefundRequestLine>,
}

/// The PENDING approval that was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundRequested {
    pub approval_id: String,
    pub sale_id: String,
    pub total_amount: Money,
    /// Remaining refundable amount before this request.
    pub remaining_refundable: Money,
    pub status: ApprovalStatus,
    pub deadline: DateTime<Utc>,
    pub lines: Vec<RefundLine>,
}

#[derive(Debug, Clone)]
pub struct RefundRequestService {
    engine: Engine,
}

impl RefundRequestService {
    pub fn new(engine: Engine) -> Self {
        RefundRequestService { engine }
    }

    /// Current policy: `refund.window_days` from settings plus the store's
    /// offset.
    pub async fn policy(&self) -> EngineResult<RefundPolicy> {
        let raw = self.engine.db().settings().get(REFUND_WINDOW_DAYS_KEY).await?;
        Ok(RefundPolicy::new(
            refund_window_days(raw.as_deref()),
            self.engine.config().utc_offset_minutes,
        ))
    }

    pub async fn request(&self, request: RefundRequest, requester_id: &str) -> EngineResult<RefundRequested> {
        let policy = self.policy().await?;
        self.request_with_policy(request, requester_id, policy).await
    }

    /// Validates `request` under `policy` and records it for approval.
    pub async fn request_with_policy(
        &self,
        request: RefundRequest,
        requester_id: &str,
        policy: RefundPolicy,
    ) -> EngineResult<RefundRequested> {
        let sale_id = request.sale_id.clone();
        let result = self.create(request, requester_id, policy).await;
        if let Err(EngineError::Core(e)) = &result {
            warn!(sale_id = %sale_id, requester_id = %requester_id, error = %e, "Refund request rejected");
        }
        result
    }

    async fn create(
        &self,
        request: RefundRequest,
        requester_id: &str,
        policy: RefundPolicy,
    ) -> EngineResult<RefundRequested> {
        let reason = validate_reason("reason", &request.reason)?;
        let db = self.engine.db();
        let now = self.engine.now();

        let sale = self.load_sale(&request.sale_id).await?;
        let occurred_at = check_sale_refundable(&sale)?;
        let deadline = policy.deadline(occurred_at);
        ensure_window_open(&sale.id, deadline, now)?;

        match db.users().get_by_id(requester_id).await? {
            Some(user) if user.is_active => {}
            _ => return Err(CoreError::UserNotFound(requester_id.to_string()).into()),
        }

        if db.approvals().get_pending_refund(&sale.id).await?.is_some() {
            return Err(CoreError::RefundAlreadyPending { sale_id: sale.id }.into());
        }

        let items = db.sales().get_items(&sale.id).await?;
        let history = db.refunds().get_history(&sale.id).await?;
        let already_refunded = db.refunds().get_refunded_total(&sale.id).await?;

        let lines = plan_refund_lines(&items, &history, &request.items)?;
        let total_amount: Money = lines.iter().map(|l| l.line_total).sum();
        let remaining = remaining_refundable(&sale, already_refunded);
        ensure_within_remaining(total_amount, remaining)?;

        let approval = Approval {
            id: Uuid::new_v4().to_string(),
            action: ApprovalAction::Refund,
            sale_id: Some(sale.id.clone()),
            requested_by: requester_id.to_string(),
            approved_by: None,
            status: ApprovalStatus::Pending,
            payload: ApprovalPayload::Refund(RefundPayload {
                lines: lines.clone(),
                total_amount,
                window_days: policy.window_days,
                deadline,
                reason,
                remaining_refundable: remaining,
            }),
            rejection: None,
            created_at: now,
            decided_at: None,
        };

        let mut tx = db.begin().await?;
        ApprovalRepository::insert(&mut tx, &approval)
            .await
            .map_err(|e| -> EngineError {
                if e.is_unique_violation_on("approvals.sale_id") {
                    CoreError::RefundAlreadyPending {
                        sale_id: sale.id.clone(),
                    }
                    .into()
                } else {
                    e.into()
                }
            })?;
        tx.commit().await?;

        info!(
            approval_id = %approval.id,
            sale_id = %sale.id,
            total_amount = %total_amount,
            "Refund requested"
        );

        Ok(RefundRequested {
            approval_id: approval.id,
            sale_id: sale.id,
            total_amount,
            remaining_refundable: remaining,
            status: approval.status,
            deadline,
            lines,
        })
    }

    /// Read-only preview of what could still be refunded.
    pub async fn eligibility(&self, sale_id: &str) -> EngineResult<RefundEligibility> {
        let db = self.engine.db();
        let sale = db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;

        let policy = self.policy().await?;
        let items = db.sales().get_items(&sale.id).await?;
        let history = db.refunds().get_history(&sale.id).await?;
        let already_refunded = db.refunds().get_refunded_total(&sale.id).await?;
        let pending = db.approvals().get_pending_refund(&sale.id).await?;

        Ok(kasir_core::refund::eligibility(
            &sale,
            &items,
            &history,
            already_refunded,
            &policy,
            pending,
            self.engine.now(),
        )?)
    }

    async fn load_sale(&self, sale_id: &str) -> EngineResult<Sale> {
        self.engine
            .db()
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }
}
