//! Router tests: status codes and JSON shapes, driven through `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use kasir_api::{router, AppState};
use kasir_core::{Product, User, UserRole};
use kasir_db::{Database, DbConfig};
use kasir_engine::{Engine, EngineConfig, FixedClock, StockAdjustment};

const CASHIER: &str = "kasir-01";
const SUPERVISOR: &str = "spv-01";

async fn app() -> Router {
    let now = Utc.with_ymd_and_hms(2025, 3, 3, 3, 0, 0).unwrap();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let engine = Engine::with_clock(db, EngineConfig::default(), Arc::new(FixedClock::new(now)));

    for (id, role) in [(CASHIER, UserRole::Cashier), (SUPERVISOR, UserRole::Supervisor)] {
        engine
            .db()
            .users()
            .insert(&User {
                id: id.to_string(),
                name: format!("User {id}"),
                role,
                is_active: true,
                created_at: now,
            })
            .await
            .unwrap();
    }

    for (id, price) in [("prod-kopi", 18_000), ("prod-roti", 22_000)] {
        engine
            .db()
            .products()
            .insert(&Product {
                id: id.to_string(),
                sku: id.to_uppercase(),
                name: format!("Produk {id}"),
                price,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        engine
            .stock()
            .adjust(
                StockAdjustment {
                    product_id: id.to_string(),
                    qty_delta: 10,
                    movement_type: None,
                    note: None,
                },
                SUPERVISOR,
            )
            .await
            .unwrap();
    }

    router(AppState::new(engine))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn scenario_a() -> Value {
    json!({
        "payment_method": "CASH",
        "cash_received": 50000,
        "items": [
            {"product_id": "prod-kopi", "qty": 1},
            {"product_id": "prod-roti", "qty": 1}
        ]
    })
}

async fn checkout(app: &Router) -> Value {
    let (status, receipt) = send(app, "POST", "/checkout", Some(CASHIER), Some(scenario_a())).await;
    assert_eq!(status, StatusCode::CREATED);
    receipt
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_checkout_returns_receipt() {
    let app = app().await;
    let receipt = checkout(&app).await;

    assert_eq!(receipt["invoice_no"], "INV-20250303-0001");
    assert_eq!(receipt["status"], "PAID");
    assert_eq!(receipt["payment"]["status"], "CONFIRMED");
    assert_eq!(receipt["totals"]["grand_total"], 44_400);
    assert_eq!(receipt["totals"]["change_total"], 5_600);
    assert_eq!(receipt["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_checkout_validation_errors() {
    let app = app().await;

    let (status, body) = send(&app, "POST", "/checkout", None, Some(scenario_a())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["X-User-Id"].is_array());

    let mut bad_qty = scenario_a();
    bad_qty["items"][0]["qty"] = json!(0);
    let (status, body) = send(&app, "POST", "/checkout", Some(CASHIER), Some(bad_qty)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["items.0.qty"].is_array());

    let mut short = scenario_a();
    short["cash_received"] = json!(40_000);
    let (status, body) = send(&app, "POST", "/checkout", Some(CASHIER), Some(short)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["cash_received"].is_array());

    let (status, body) = send(
        &app,
        "POST",
        "/checkout",
        Some(CASHIER),
        Some(json!({"payment_method": "CHEQUE", "items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_sync_batch_replay() {
    let app = app().await;
    let batch = json!({
        "device_id": "TILL-01",
        "batch_uuid": "batch-1",
        "transactions": [
            {"local_txn_uuid": "t-1", "checkout": scenario_a()}
        ]
    });

    let (status, first) = send(&app, "POST", "/sync/batches", Some(CASHIER), Some(batch.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["status"], "PROCESSED");
    assert_eq!(first["data"]["results"][0]["status"], "PROCESSED");
    assert!(first["data"]["results"][0]["invoice_no"].is_string());

    let (status, second) = send(&app, "POST", "/sync/batches", Some(CASHIER), Some(batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["status"], "PROCESSED");
    assert!(second["data"]["results"].as_array().unwrap().is_empty());

    let (status, stored) = send(&app, "GET", "/sync/batches/batch-1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["data"]["device_id"], "TILL-01");

    let (status, _) = send(&app, "GET", "/sync/batches/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refund_request_and_approval() {
    let app = app().await;
    let receipt = checkout(&app).await;
    let sale_id = receipt["sale_id"].as_str().unwrap();

    let (status, requested) = send(
        &app,
        "POST",
        "/refunds",
        Some(CASHIER),
        Some(json!({
            "sale_id": sale_id,
            "reason": "Barang rusak",
            "items": [{"sale_item_id": receipt["items"][0]["sale_item_id"], "qty": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(requested["data"]["status"], "PENDING");
    assert_eq!(requested["data"]["total_amount"], 18_000);
    let approval_id = requested["data"]["approval_id"].as_str().unwrap().to_string();

    let (status, queue) = send(&app, "GET", "/approvals?status=PENDING", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["data"][0]["id"], approval_id.as_str());
    assert_eq!(queue["data"][0]["invoice_no"], "INV-20250303-0001");
    assert_eq!(queue["data"][0]["requester_name"], "User kasir-01");

    let approve_uri = format!("/approvals/{approval_id}/approve");
    let (status, _) = send(&app, "POST", &approve_uri, Some(CASHIER), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, decision) = send(&app, "POST", &approve_uri, Some(SUPERVISOR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["message"], "Refund disetujui.");
    assert_eq!(decision["data"]["status"], "APPROVED");
    assert_eq!(decision["refund"]["total_amount"], 18_000);

    let (status, body) = send(&app, "POST", &approve_uri, Some(SUPERVISOR), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Pengajuan sudah diproses (APPROVED).");

    let (_, stock) = send(&app, "GET", "/stock/prod-kopi", None, None).await;
    assert_eq!(stock["data"]["on_hand"], 10);
}

#[tokio::test]
async fn test_refund_errors_and_eligibility() {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/refunds",
        Some(CASHIER),
        Some(json!({
            "sale_id": "missing",
            "reason": "Salah input",
            "items": [{"sale_item_id": "x", "qty": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Transaksi tidak ditemukan.");

    let receipt = checkout(&app).await;
    let uri = format!("/sales/{}/refund-eligibility", receipt["sale_id"].as_str().unwrap());
    let (status, preview) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["data"]["remaining_refundable"], 40_000);
    assert_eq!(preview["data"]["window_open"], true);

    let (status, _) = send(&app, "GET", "/sales/missing/refund-eligibility", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_void_request_and_reject() {
    let app = app().await;
    let receipt = checkout(&app).await;

    let (status, created) = send(
        &app,
        "POST",
        "/approvals",
        Some(CASHIER),
        Some(json!({
            "action": "VOID",
            "sale_id": receipt["sale_id"],
            "payload": {"reason": "Salah input"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["action"], "VOID");
    let approval_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, decision) = send(
        &app,
        "POST",
        &format!("/approvals/{approval_id}/reject"),
        Some(SUPERVISOR),
        Some(json!({"reason": "Transaksi benar"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["message"], "Permintaan ditolak.");
    assert_eq!(decision["data"]["status"], "REJECTED");
    assert!(decision.get("refund").is_none());

    let (status, fetched) = send(&app, "GET", &format!("/approvals/{approval_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["status"], "REJECTED");

    let (status, _) = send(&app, "GET", "/approvals/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refund_action_rejected_on_generic_endpoint() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/approvals",
        Some(CASHIER),
        Some(json!({"action": "REFUND", "payload": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["action"].is_array());
}

#[tokio::test]
async fn test_approval_list_rejects_unknown_status() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/approvals?status=BOGUS", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stock_adjustment() {
    let app = app().await;

    let (status, movement) = send(
        &app,
        "POST",
        "/stock/adjustments",
        Some(SUPERVISOR),
        Some(json!({"product_id": "prod-roti", "qty_delta": -3, "note": "Rusak"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(movement["data"]["movement_type"], "ADJUSTMENT");

    let (status, snapshot) = send(&app, "GET", "/stock/prod-roti", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["data"]["on_hand"], 7);
    assert_eq!(snapshot["data"]["movements"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "GET", "/stock/prod-hilang", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
