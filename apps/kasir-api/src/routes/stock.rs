use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use kasir_core::StockMovement;
use kasir_engine::{StockAdjustment, StockSnapshot};

use super::Data;
use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson};
use crate::AppState;

pub async fn adjust(
    State(state): State<AppState>,
    Actor(actor_id): Actor,
    ApiJson(adjustment): ApiJson<StockAdjustment>,
) -> ApiResult<(StatusCode, Json<Data<StockMovement>>)> {
    let movement = state.engine.stock().adjust(adjustment, &actor_id).await?;
    Ok((StatusCode::CREATED, Json(Data::new(movement))))
}

pub async fn snapshot(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Data<StockSnapshot>>> {
    let snapshot = state.engine.stock().snapshot(&product_id).await?;
    Ok(Json(Data::new(snapshot)))
}
