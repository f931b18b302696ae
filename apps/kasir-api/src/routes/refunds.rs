use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use kasir_core::refund::RefundEligibility;
use kasir_engine::{RefundRequest, RefundRequested};

use super::Data;
use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson};
use crate::AppState;

/// Creates a PENDING approval; nothing is refunded yet.
pub async fn request_refund(
    State(state): State<AppState>,
    Actor(requester_id): Actor,
    ApiJson(request): ApiJson<RefundRequest>,
) -> ApiResult<(StatusCode, Json<Data<RefundRequested>>)> {
    let requested = state.engine.refunds().request(request, &requester_id).await?;
    Ok((StatusCode::CREATED, Json(Data::new(requested))))
}

pub async fn eligibility(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> ApiResult<Json<Data<RefundEligibility>>> {
    let eligibility = state.engine.refunds().eligibility(&sale_id).await?;
    Ok(Json(Data::new(eligibility)))
}
