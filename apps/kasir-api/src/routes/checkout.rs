use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use kasir_engine::{CheckoutReceipt, CheckoutRequest};

use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson};
use crate::AppState;

pub async fn checkout(
    State(state): State<AppState>,
    Actor(cashier_id): Actor,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutReceipt>)> {
    let receipt = state.engine.checkout().checkout(request, &cashier_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
