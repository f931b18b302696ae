//! Approval workflow: decisions, refund execution, void execution.

mod common;

use chrono::Duration;
use serde_json::json;

use common::*;
use kasir_core::refund::RefundRequestLine;
use kasir_core::types::audit_action;
use kasir_core::{
    ApprovalAction, ApprovalStatus, CoreError, Money, MovementType, RefType, SaleStatus, UserRole,
};
use kasir_engine::{ApprovalRequestInput, CheckoutReceipt, EngineError, RefundRequest, RefundRequested};

async fn request_refund(env: &TestEnv, receipt: &CheckoutReceipt, index: usize, qty: i64) -> RefundRequested {
    env.engine
        .refunds()
        .request(
            RefundRequest {
                sale_id: receipt.sale_id.clone(),
                reason: "Salah ukuran".to_string(),
                items: vec![RefundRequestLine {
                    sale_item_id: receipt.items[index].sale_item_id.clone(),
                    qty,
                }],
            },
            CASHIER,
        )
        .await
        .unwrap()
}

fn void_input(sale_id: &str) -> ApprovalRequestInput {
    ApprovalRequestInput {
        action: ApprovalAction::Void,
        sale_id: Some(sale_id.to_string()),
        payload: json!({ "reason": "Pelanggan batal" }),
    }
}

// =============================================================================
// Refund Execution
// =============================================================================

#[tokio::test]
async fn test_approved_refund_returns_stock() {
    let env = setup().await;
    let receipt = env
        .engine
        .checkout()
        .checkout(ewallet(vec![line(KOPI, 2)]), CASHIER)
        .await
        .unwrap();
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 2);

    let requested = request_refund(&env, &receipt, 0, 1).await;
    let decision = env
        .engine
        .approvals()
        .approve(&requested.approval_id, SUPERVISOR)
        .await
        .unwrap();

    assert_eq!(decision.message, "Refund disetujui.");
    assert_eq!(decision.approval.status, ApprovalStatus::Approved);
    assert_eq!(decision.approval.approved_by.as_deref(), Some(SUPERVISOR));
    assert_eq!(decision.approval.decided_at, Some(sale_time()));

    let refund = decision.refund.unwrap();
    assert_eq!(refund.total_amount(), Money::new(18_000));
    assert_eq!(refund.requested_by, CASHIER);
    assert_eq!(refund.approved_by, SUPERVISOR);
    assert_eq!(refund.approval_id, requested.approval_id);

    let stored = env
        .db()
        .refunds()
        .get_by_approval(&requested.approval_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, refund.id);

    let items = env.db().refunds().get_items(&refund.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].qty, 1);
    assert_eq!(items[0].sale_item_id, receipt.items[0].sale_item_id);

    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
    let movements = env
        .db()
        .stock()
        .movements_for_ref(RefType::Refund, &refund.id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::ReturnIn);
    assert_eq!(movements[0].qty_delta, 1);

    let audit = env.db().audit().list_for_entity("refund", &refund.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, audit_action::REFUND_EXECUTED);
    assert_eq!(audit[0].actor_id.as_deref(), Some(SUPERVISOR));
    assert!(audit[0].details.contains(CASHIER));

    // Sale stays PAID after a partial refund
    let sale = env.db().sales().get_by_id(&receipt.sale_id).await.unwrap().unwrap();
    assert_eq!(sale.status, SaleStatus::Paid);
}

#[tokio::test]
async fn test_refunds_never_exceed_sold_quantity() {
    let env = setup().await;
    let receipt = env
        .engine
        .checkout()
        .checkout(ewallet(vec![line(KOPI, 2)]), CASHIER)
        .await
        .unwrap();

    for _ in 0..2 {
        let requested = request_refund(&env, &receipt, 0, 1).await;
        env.engine
            .approvals()
            .approve(&requested.approval_id, SUPERVISOR)
            .await
            .unwrap();
    }

    let err = env
        .engine
        .refunds()
        .request(
            RefundRequest {
                sale_id: receipt.sale_id.clone(),
                reason: "Lagi".to_string(),
                items: vec![RefundRequestLine {
                    sale_item_id: receipt.items[0].sale_item_id.clone(),
                    qty: 1,
                }],
            },
            CASHIER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::RefundQtyExceeded { max_refundable: 0, .. })));

    let history = env.db().refunds().get_history(&receipt.sale_id).await.unwrap();
    assert_eq!(history[&receipt.items[0].sale_item_id].refunded_qty, 2);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK);
}

#[tokio::test]
async fn test_approval_revalidates_window() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let requested = request_refund(&env, &receipt, 0, 1).await;

    env.clock.advance(Duration::days(3));
    let err = env
        .engine
        .approvals()
        .approve(&requested.approval_id, SUPERVISOR)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Core(CoreError::RefundWindowExpired { .. })));

    // Rolled back: still pending, nothing written
    let approval = env.engine.approvals().get(&requested.approval_id).await.unwrap();
    assert_eq!(approval.status, ApprovalStatus::Pending);
    assert!(approval.approved_by.is_none());
    assert!(env.db().refunds().list_for_sale(&receipt.sale_id).await.unwrap().is_empty());
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
}

#[tokio::test]
async fn test_cashier_cannot_approve() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let requested = request_refund(&env, &receipt, 0, 1).await;

    let err = env
        .engine
        .approvals()
        .approve(&requested.approval_id, CASHIER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::ApproverNotAuthorized { .. })));

    let err = env
        .engine
        .approvals()
        .reject(&requested.approval_id, "nobody", "Tidak valid")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::ApproverNotAuthorized { .. })));

    // Admins may decide
    user(env.db(), "admin-01", UserRole::Admin).await;
    env.engine
        .approvals()
        .approve(&requested.approval_id, "admin-01")
        .await
        .unwrap();
}

// =============================================================================
// Terminality
// =============================================================================

#[tokio::test]
async fn test_decided_approval_is_terminal() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let requested = request_refund(&env, &receipt, 0, 1).await;
    let approvals = env.engine.approvals();

    approvals.approve(&requested.approval_id, SUPERVISOR).await.unwrap();

    let err = approvals
        .approve(&requested.approval_id, SUPERVISOR)
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        EngineError::Core(CoreError::ApprovalAlreadyDecided { status, .. }) if status == "APPROVED"
    ));

    let err = approvals
        .reject(&requested.approval_id, SUPERVISOR, "Terlambat")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::ApprovalAlreadyDecided { .. })));

    // Executed exactly once
    assert_eq!(env.db().refunds().list_for_sale(&receipt.sale_id).await.unwrap().len(), 1);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK);
}

#[tokio::test]
async fn test_reject_records_reason_and_frees_sale() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let requested = request_refund(&env, &receipt, 0, 1).await;

    let decision = env
        .engine
        .approvals()
        .reject(&requested.approval_id, SUPERVISOR, "  Barang tidak rusak  ")
        .await
        .unwrap();

    assert_eq!(decision.message, "Permintaan ditolak.");
    assert!(decision.refund.is_none());
    assert_eq!(decision.approval.status, ApprovalStatus::Rejected);
    assert_eq!(decision.approval.approved_by.as_deref(), Some(SUPERVISOR));
    let rejection = decision.approval.rejection.unwrap();
    assert_eq!(rejection.reason, "Barang tidak rusak");
    assert_eq!(rejection.rejected_at, sale_time());

    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 1);
    let audit = env
        .db()
        .audit()
        .list_for_entity("approval", &requested.approval_id)
        .await
        .unwrap();
    assert_eq!(audit[0].action, audit_action::APPROVAL_REJECTED);

    // No longer pending, so a new request is accepted
    request_refund(&env, &receipt, 0, 1).await;
}

#[tokio::test]
async fn test_unknown_approval() {
    let env = setup().await;

    let err = env.engine.approvals().approve("missing", SUPERVISOR).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::ApprovalNotFound(_))));
}

// =============================================================================
// Generic Requests and Void
// =============================================================================

#[tokio::test]
async fn test_void_restocks_unrefunded_units() {
    let env = setup().await;
    let receipt = env
        .engine
        .checkout()
        .checkout(ewallet(vec![line(KOPI, 3), line(ROTI, 1)]), CASHIER)
        .await
        .unwrap();

    let refund = request_refund(&env, &receipt, 0, 1).await;
    env.engine.approvals().approve(&refund.approval_id, SUPERVISOR).await.unwrap();
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK - 2);

    let approval = env
        .engine
        .approvals()
        .request(void_input(&receipt.sale_id), CASHIER)
        .await
        .unwrap();
    assert_eq!(approval.status, ApprovalStatus::Pending);

    let decision = env.engine.approvals().approve(&approval.id, SUPERVISOR).await.unwrap();
    assert_eq!(decision.message, "Void disetujui.");

    let sale = env.db().sales().get_by_id(&receipt.sale_id).await.unwrap().unwrap();
    assert_eq!(sale.status, SaleStatus::Void);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK);
    assert_eq!(env.on_hand(ROTI).await, OPENING_STOCK);

    let adjustments: Vec<_> = env
        .db()
        .stock()
        .movements_for_ref(RefType::Sale, &receipt.sale_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.movement_type == MovementType::Adjustment)
        .collect();
    assert_eq!(adjustments.len(), 2);

    let audit = env.db().audit().list_for_entity("sale", &receipt.sale_id).await.unwrap();
    assert_eq!(audit[0].action, audit_action::SALE_VOIDED);

    // A voided sale can no longer be refunded
    let err = env
        .engine
        .refunds()
        .request(
            RefundRequest {
                sale_id: receipt.sale_id.clone(),
                reason: "Salah ukuran".to_string(),
                items: vec![RefundRequestLine {
                    sale_item_id: receipt.items[1].sale_item_id.clone(),
                    qty: 1,
                }],
            },
            CASHIER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::InvalidSaleStatus { .. })));
}

#[tokio::test]
async fn test_second_void_fails_and_stays_pending() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let approvals = env.engine.approvals();

    let first = approvals.request(void_input(&receipt.sale_id), CASHIER).await.unwrap();
    let second = approvals.request(void_input(&receipt.sale_id), CASHIER).await.unwrap();

    approvals.approve(&first.id, SUPERVISOR).await.unwrap();
    let err = approvals.approve(&second.id, SUPERVISOR).await.unwrap_err();

    assert!(matches!(err, EngineError::Core(CoreError::InvalidSaleStatus { .. })));
    assert_eq!(approvals.get(&second.id).await.unwrap().status, ApprovalStatus::Pending);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK);
}

#[tokio::test]
async fn test_override_approval_only_transitions() {
    let env = setup().await;
    let approvals = env.engine.approvals();

    let approval = approvals
        .request(
            ApprovalRequestInput {
                action: ApprovalAction::PriceOverride,
                sale_id: None,
                payload: json!({
                    "product_id": KOPI,
                    "original_price": 18_000,
                    "override_price": 15_000,
                    "reason": "Harga promo",
                }),
            },
            CASHIER,
        )
        .await
        .unwrap();

    let decision = approvals.approve(&approval.id, SUPERVISOR).await.unwrap();
    assert_eq!(decision.message, "Permintaan disetujui.");
    assert_eq!(decision.approval.status, ApprovalStatus::Approved);

    let audit = env
        .db()
        .audit()
        .list_for_entity("approval", &approval.id)
        .await
        .unwrap();
    assert_eq!(audit[0].action, audit_action::APPROVAL_APPROVED);
    assert_eq!(env.on_hand(KOPI).await, OPENING_STOCK);
}

#[tokio::test]
async fn test_generic_request_validation() {
    let env = setup().await;
    let approvals = env.engine.approvals();

    // Refunds have their own endpoint
    let err = approvals
        .request(
            ApprovalRequestInput {
                action: ApprovalAction::Refund,
                sale_id: None,
                payload: json!({}),
            },
            CASHIER,
        )
        .await
        .unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("action"));

    let err = approvals
        .request(
            ApprovalRequestInput {
                action: ApprovalAction::Void,
                sale_id: None,
                payload: json!({ "reason": "Batal" }),
            },
            CASHIER,
        )
        .await
        .unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("sale_id"));

    let err = approvals
        .request(
            ApprovalRequestInput {
                action: ApprovalAction::DiscountOverride,
                sale_id: None,
                payload: json!({ "discount_amount": 5_000 }),
            },
            CASHIER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::InvalidPayload(_))));

    let err = approvals
        .request(void_input("missing"), CASHIER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::SaleNotFound(_))));
}

#[tokio::test]
async fn test_list_includes_names_and_invoice() {
    let env = setup().await;
    let receipt = sell_kopi_roti(&env).await;
    let refund = request_refund(&env, &receipt, 0, 1).await;
    let void = env
        .engine
        .approvals()
        .request(void_input(&receipt.sale_id), CASHIER)
        .await
        .unwrap();
    env.engine.approvals().approve(&void.id, SUPERVISOR).await.unwrap();

    let all = env.engine.approvals().list(None, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let pending = env
        .engine
        .approvals()
        .list(Some(ApprovalStatus::Pending), None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].approval.id, refund.approval_id);
    assert_eq!(pending[0].requester_name.as_deref(), Some("User kasir-01"));
    assert!(pending[0].approver_name.is_none());
    assert_eq!(pending[0].invoice_no.as_deref(), Some(receipt.invoice_no.as_str()));

    let approved = env
        .engine
        .approvals()
        .list(Some(ApprovalStatus::Approved), None)
        .await
        .unwrap();
    assert_eq!(approved[0].approver_name.as_deref(), Some("User spv-01"));
}
