//! HTTP handlers, one module per area.
//!
//! Every handler is the same three steps: extract, call one engine
//! operation, wrap the result. Successful bodies use a `{data}` envelope
//! except checkout, which returns the receipt itself.

mod approvals;
mod checkout;
mod health;
mod refunds;
mod stock;
mod sync;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;

use crate::AppState;

/// `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Data { data }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/checkout", post(checkout::checkout))
        .route("/sync/batches", post(sync::submit_batch))
        .route("/sync/batches/{batch_uuid}", get(sync::get_batch))
        .route("/refunds", post(refunds::request_refund))
        .route("/sales/{id}/refund-eligibility", get(refunds::eligibility))
        .route("/approvals", post(approvals::request).get(approvals::list))
        .route("/approvals/{id}", get(approvals::get))
        .route("/approvals/{id}/approve", post(approvals::approve))
        .route("/approvals/{id}/reject", post(approvals::reject))
        .route("/stock/adjustments", post(stock::adjust))
        .route("/stock/{product_id}", get(stock::snapshot))
}
