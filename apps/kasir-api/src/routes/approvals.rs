use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use kasir_core::{Approval, ApprovalStatus, Refund};
use kasir_db::ApprovalListItem;
use kasir_engine::{ApprovalDecision, ApprovalRequestInput};

use super::Data;
use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ApprovalStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: String,
}

/// `{data: <approval>, refund?, message}`
#[derive(Debug, Serialize)]
pub struct DecisionBody {
    pub data: Approval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<Refund>,
    pub message: String,
}

impl From<ApprovalDecision> for DecisionBody {
    fn from(decision: ApprovalDecision) -> Self {
        DecisionBody {
            data: decision.approval,
            refund: decision.refund,
            message: decision.message,
        }
    }
}

/// Generic request for DISCOUNT_OVERRIDE, PRICE_OVERRIDE and VOID.
pub async fn request(
    State(state): State<AppState>,
    Actor(requester_id): Actor,
    ApiJson(input): ApiJson<ApprovalRequestInput>,
) -> ApiResult<(StatusCode, Json<Data<Approval>>)> {
    let approval = state.engine.approvals().request(input, &requester_id).await?;
    Ok((StatusCode::CREATED, Json(Data::new(approval))))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Data<Vec<ApprovalListItem>>>> {
    let approvals = state.engine.approvals().list(query.status, query.limit).await?;
    Ok(Json(Data::new(approvals)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Data<Approval>>> {
    let approval = state.engine.approvals().get(&id).await?;
    Ok(Json(Data::new(approval)))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(approver_id): Actor,
) -> ApiResult<Json<DecisionBody>> {
    let decision = state.engine.approvals().approve(&id, &approver_id).await?;
    Ok(Json(decision.into()))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(approver_id): Actor,
    ApiJson(body): ApiJson<RejectBody>,
) -> ApiResult<Json<DecisionBody>> {
    let decision = state
        .engine
        .approvals()
        .reject(&id, &approver_id, &body.reason)
        .await?;
    Ok(Json(decision.into()))
}
