//! # Approval Workflow
//!
//! Supervisor decisions on sensitive actions, and the side effects an
//! approval triggers.
//!
//! ## States
//! ```text
//!                 approve ──► APPROVED   (terminal)
//!   PENDING ──┤
//!                 reject  ──► REJECTED   (terminal)
//! ```
//!
//! ## Approve
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE approvals SET status='APPROVED' … WHERE status='PENDING'      │
//! │      0 rows → ROLLBACK, "already decided"                               │
//! │    REFUND   → re-validate snapshot, refunds + refund_items,             │
//! │               RETURN_IN +qty per line, audit REFUND_EXECUTED            │
//! │    VOID     → sale PAID → VOID, ADJUSTMENT +unrefunded units,           │
//! │               audit SALE_VOIDED                                         │
//! │    OVERRIDE → audit APPROVAL_APPROVED                                   │
//! │  COMMIT        (any failure: ROLLBACK, approval stays PENDING)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use kasir_core::approval::{Decision, RefundPayload, Rejection, VoidPayload};
use kasir_core::refund::{max_refundable_qty, revalidate_refund};
use kasir_core::types::audit_action;
use kasir_core::validation::validate_reason;
use kasir_core::{
    Approval, ApprovalAction, ApprovalPayload, ApprovalStatus, CoreError, MovementType, RefType,
    Refund, RefundItem, SaleStatus, ValidationError,
};
use kasir_db::{
    ApprovalListItem, ApprovalRepository, AuditEntry, AuditRepository, NewMovement, RefundRepository,
    SaleRepository,
};

use crate::error::{EngineError, EngineResult};
use crate::ledger::StockLedger;
use crate::Engine;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

// =============================================================================
// Request / Response
// =============================================================================

/// Generic approval request for actions other than REFUND.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalRequestInput {
    pub action: ApprovalAction,
    #[serde(default)]
    pub sale_id: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalDecision {
    pub approval: Approval,
    /// The refund written when a REFUND approval was approved.
    pub refund: Option<Refund>,
    pub message: String,
}

// =============================================================================
// Workflow
// =============================================================================

#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    engine: Engine,
}

impl ApprovalWorkflow {
    pub fn new(engine: Engine) -> Self {
        ApprovalWorkflow { engine }
    }

    /// Opens a DISCOUNT_OVERRIDE, PRICE_OVERRIDE, or VOID request.
    ///
    /// Refunds go through the refund service instead.
    pub async fn request(&self, input: ApprovalRequestInput, requester_id: &str) -> EngineResult<Approval> {
        if input.action == ApprovalAction::Refund {
            return Err(ValidationError::NotAllowed {
                field: "action".to_string(),
                allowed: [
                    ApprovalAction::DiscountOverride,
                    ApprovalAction::PriceOverride,
                    ApprovalAction::Void,
                ]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            }
            .into());
        }

        let mut payload = ApprovalPayload::from_value(input.action, input.payload)?;
        payload.validate()?;

        let db = self.engine.db();
        match db.users().get_by_id(requester_id).await? {
            Some(user) if user.is_active => {}
            _ => return Err(CoreError::UserNotFound(requester_id.to_string()).into()),
        }

        let sale_id = match input.sale_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        };

        if let Some(id) = &sale_id {
            let sale = db
                .sales()
                .get_by_id(id)
                .await?
                .ok_or_else(|| CoreError::SaleNotFound(id.clone()))?;

            if input.action == ApprovalAction::Void && sale.status != SaleStatus::Paid {
                return Err(CoreError::InvalidSaleStatus {
                    sale_id: sale.id,
                    current_status: sale.status.to_string(),
                }
                .into());
            }
        } else if input.action == ApprovalAction::Void {
            return Err(ValidationError::Required {
                field: "sale_id".to_string(),
            }
            .into());
        }

        let approval = Approval {
            id: Uuid::new_v4().to_string(),
            action: input.action,
            sale_id,
            requested_by: requester_id.to_string(),
            approved_by: None,
            status: ApprovalStatus::Pending,
            payload,
            rejection: None,
            created_at: self.engine.now(),
            decided_at: None,
        };

        let mut tx = db.begin().await?;
        ApprovalRepository::insert(&mut tx, &approval).await?;
        tx.commit().await?;

        info!(approval_id = %approval.id, action = %approval.action, "Approval requested");
        Ok(approval)
    }

    pub async fn get(&self, approval_id: &str) -> EngineResult<Approval> {
        self.engine
            .db()
            .approvals()
            .get_by_id(approval_id)
            .await?
            .ok_or_else(|| CoreError::ApprovalNotFound(approval_id.to_string()).into())
    }

    pub async fn list(&self, status: Option<ApprovalStatus>, limit: Option<i64>) -> EngineResult<Vec<ApprovalListItem>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);
        Ok(self.engine.db().approvals().list(status, limit).await?)
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    /// Approves and executes. On any failure the approval stays PENDING.
    pub async fn approve(&self, approval_id: &str, approver_id: &str) -> EngineResult<ApprovalDecision> {
        let result = self.run_approve(approval_id, approver_id).await;
        if let Err(EngineError::Core(e)) = &result {
            warn!(approval_id = %approval_id, approver_id = %approver_id, error = %e, "Approval refused");
        }
        result
    }

    async fn run_approve(&self, approval_id: &str, approver_id: &str) -> EngineResult<ApprovalDecision> {
        self.authorize(approver_id).await?;
        let approval = self.get(approval_id).await?;
        approval.decide(Decision::Approve)?;

        let now = self.engine.now();
        let mut tx = self.engine.db().begin().await?;

        if !ApprovalRepository::transition(&mut tx, &approval, ApprovalStatus::Approved, approver_id, now, None).await? {
            tx.rollback().await?;
            return Err(self.already_decided(approval_id).await);
        }

        let executed = match &approval.payload {
            ApprovalPayload::Refund(payload) => {
                Self::execute_refund(&mut tx, &approval, payload, approver_id, now)
                    .await
                    .map(Some)
            }
            ApprovalPayload::Void(payload) => Self::execute_void(&mut tx, &approval, payload, approver_id, now)
                .await
                .map(|_| None),
            ApprovalPayload::DiscountOverride(_) | ApprovalPayload::PriceOverride(_) => {
                AuditRepository::insert(
                    &mut tx,
                    &AuditEntry {
                        actor_id: Some(approver_id),
                        action: audit_action::APPROVAL_APPROVED,
                        entity_type: "approval",
                        entity_id: &approval.id,
                        details: json!({
                            "action": approval.action,
                            "sale_id": approval.sale_id,
                            "requested_by": approval.requested_by,
                        }),
                    },
                    now,
                )
                .await
                .map(|_| None)
                .map_err(EngineError::from)
            }
        };

        let refund = match executed {
            Ok(refund) => refund,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };
        tx.commit().await?;

        let message = match approval.action {
            ApprovalAction::Refund => "Refund disetujui.",
            ApprovalAction::Void => "Void disetujui.",
            ApprovalAction::DiscountOverride | ApprovalAction::PriceOverride => "Permintaan disetujui.",
        };
        info!(
            approval_id = %approval.id,
            action = %approval.action,
            approver_id = %approver_id,
            "Approval approved"
        );

        Ok(ApprovalDecision {
            approval: self.get(approval_id).await?,
            refund,
            message: message.to_string(),
        })
    }

    /// Rejects with a reason recorded in the payload envelope.
    pub async fn reject(&self, approval_id: &str, approver_id: &str, reason: &str) -> EngineResult<ApprovalDecision> {
        let result = self.run_reject(approval_id, approver_id, reason).await;
        if let Err(EngineError::Core(e)) = &result {
            warn!(approval_id = %approval_id, approver_id = %approver_id, error = %e, "Rejection refused");
        }
        result
    }

    async fn run_reject(&self, approval_id: &str, approver_id: &str, reason: &str) -> EngineResult<ApprovalDecision> {
        self.authorize(approver_id).await?;
        let reason = validate_reason("reason", reason)?;
        let approval = self.get(approval_id).await?;
        approval.decide(Decision::Reject)?;

        let now = self.engine.now();
        let rejection = Rejection {
            reason,
            rejected_at: now,
        };

        let mut tx = self.engine.db().begin().await?;
        if !ApprovalRepository::transition(
            &mut tx,
            &approval,
            ApprovalStatus::Rejected,
            approver_id,
            now,
            Some(&rejection),
        )
        .await?
        {
            tx.rollback().await?;
            return Err(self.already_decided(approval_id).await);
        }

        AuditRepository::insert(
            &mut tx,
            &AuditEntry {
                actor_id: Some(approver_id),
                action: audit_action::APPROVAL_REJECTED,
                entity_type: "approval",
                entity_id: &approval.id,
                details: json!({
                    "action": approval.action,
                    "sale_id": approval.sale_id,
                    "reason": rejection.reason,
                }),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(approval_id = %approval.id, approver_id = %approver_id, "Approval rejected");

        Ok(ApprovalDecision {
            approval: self.get(approval_id).await?,
            refund: None,
            message: "Permintaan ditolak.".to_string(),
        })
    }

    /// Approver must be an active SUPERVISOR or ADMIN.
    async fn authorize(&self, approver_id: &str) -> EngineResult<()> {
        match self.engine.db().users().get_by_id(approver_id).await? {
            Some(user) if user.can_approve() => Ok(()),
            _ => Err(CoreError::ApproverNotAuthorized {
                user_id: approver_id.to_string(),
            }
            .into()),
        }
    }

    /// Error for a transition lost to a concurrent decision.
    async fn already_decided(&self, approval_id: &str) -> EngineError {
        match self.engine.db().approvals().get_by_id(approval_id).await {
            Ok(Some(current)) => CoreError::ApprovalAlreadyDecided {
                approval_id: approval_id.to_string(),
                status: current.status.to_string(),
            }
            .into(),
            Ok(None) => CoreError::ApprovalNotFound(approval_id.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Pays out a REFUND approval on the caller's transaction.
    async fn execute_refund(
        conn: &mut SqliteConnection,
        approval: &Approval,
        payload: &RefundPayload,
        approver_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Refund> {
        let sale_id = Self::sale_id_of(approval)?;
        let sale = SaleRepository::find(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = SaleRepository::items(conn, sale_id).await?;
        let history = RefundRepository::history_for_sale(conn, sale_id).await?;
        let already_refunded = RefundRepository::refunded_total(conn, sale_id).await?;

        revalidate_refund(payload, &sale, &items, &history, already_refunded, now)?;

        let refund = Refund {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            approval_id: approval.id.clone(),
            requested_by: approval.requested_by.clone(),
            approved_by: approver_id.to_string(),
            total_amount: payload.total_amount.amount(),
            reason: payload.reason.clone(),
            occurred_at: now,
            created_at: now,
        };
        RefundRepository::insert_refund(conn, &refund).await?;

        for line in &payload.lines {
            RefundRepository::insert_item(
                conn,
                &RefundItem {
                    id: Uuid::new_v4().to_string(),
                    refund_id: refund.id.clone(),
                    sale_item_id: line.sale_item_id.clone(),
                    qty: line.qty,
                    unit_price: line.unit_price.amount(),
                    line_total: line.line_total.amount(),
                    created_at: now,
                },
            )
            .await?;

            StockLedger::record_movement(
                conn,
                &NewMovement {
                    product_id: line.product_id.clone(),
                    qty_delta: line.qty,
                    movement_type: MovementType::ReturnIn,
                    ref_type: RefType::Refund,
                    ref_id: Some(refund.id.clone()),
                    actor_id: Some(approver_id.to_string()),
                    note: None,
                    created_at: now,
                },
                true,
            )
            .await?;
        }

        AuditRepository::insert(
            conn,
            &AuditEntry {
                actor_id: Some(approver_id),
                action: audit_action::REFUND_EXECUTED,
                entity_type: "refund",
                entity_id: &refund.id,
                details: json!({
                    "refund_id": refund.id,
                    "sale_id": refund.sale_id,
                    "approval_id": refund.approval_id,
                    "total_amount": refund.total_amount,
                    "requested_by": refund.requested_by,
                }),
            },
            now,
        )
        .await?;

        info!(
            refund_id = %refund.id,
            sale_id = %refund.sale_id,
            total_amount = refund.total_amount,
            "Refund executed"
        );
        Ok(refund)
    }

    /// Voids the sale of a VOID approval and restocks what was not
    /// refunded already.
    async fn execute_void(
        conn: &mut SqliteConnection,
        approval: &Approval,
        payload: &VoidPayload,
        approver_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let sale_id = Self::sale_id_of(approval)?;

        if !SaleRepository::mark_void(conn, sale_id).await? {
            return Err(match SaleRepository::find(conn, sale_id).await? {
                Some(sale) => CoreError::InvalidSaleStatus {
                    sale_id: sale.id,
                    current_status: sale.status.to_string(),
                },
                None => CoreError::SaleNotFound(sale_id.to_string()),
            }
            .into());
        }

        let items = SaleRepository::items(conn, sale_id).await?;
        let history = RefundRepository::history_for_sale(conn, sale_id).await?;

        let mut restocked = Vec::new();
        for item in &items {
            let qty = max_refundable_qty(item, &history.get(&item.id).copied().unwrap_or_default());
            if qty == 0 {
                continue;
            }

            StockLedger::record_movement(
                conn,
                &NewMovement {
                    product_id: item.product_id.clone(),
                    qty_delta: qty,
                    movement_type: MovementType::Adjustment,
                    ref_type: RefType::Sale,
                    ref_id: Some(sale_id.to_string()),
                    actor_id: Some(approver_id.to_string()),
                    note: Some(payload.reason.clone()),
                    created_at: now,
                },
                true,
            )
            .await?;
            restocked.push(json!({ "product_id": item.product_id, "qty": qty }));
        }

        AuditRepository::insert(
            conn,
            &AuditEntry {
                actor_id: Some(approver_id),
                action: audit_action::SALE_VOIDED,
                entity_type: "sale",
                entity_id: sale_id,
                details: json!({
                    "approval_id": approval.id,
                    "requested_by": approval.requested_by,
                    "reason": payload.reason,
                    "restocked": restocked,
                }),
            },
            now,
        )
        .await?;

        info!(sale_id = %sale_id, approval_id = %approval.id, "Sale voided");
        Ok(())
    }

    fn sale_id_of(approval: &Approval) -> EngineResult<&str> {
        approval.sale_id.as_deref().ok_or_else(|| {
            CoreError::InvalidPayload(format!("{} approval {} has no sale_id", approval.action, approval.id)).into()
        })
    }
}
