use axum::extract::{Path, State};
use axum::Json;

use kasir_core::SyncBatch;
use kasir_engine::{SyncBatchRequest, SyncBatchResponse};

use super::Data;
use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson};
use crate::AppState;

/// Replays of a processed batch answer 200 with empty results.
pub async fn submit_batch(
    State(state): State<AppState>,
    Actor(cashier_id): Actor,
    ApiJson(request): ApiJson<SyncBatchRequest>,
) -> ApiResult<Json<Data<SyncBatchResponse>>> {
    let response = state.engine.sync_gate().submit(request, &cashier_id).await?;
    Ok(Json(Data::new(response)))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_uuid): Path<String>,
) -> ApiResult<Json<Data<SyncBatch>>> {
    let batch = state.engine.sync_gate().batch(&batch_uuid).await?;
    Ok(Json(Data::new(batch)))
}
