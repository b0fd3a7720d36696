//! Case list, edit, delete, refresh and sync handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cases::{CaseListResponse, ListRequest};
use crate::data::CaseEdit;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::extractors::Principal;

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct OrderStatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefundStatusResponse {
    pub refund_status: String,
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub order_ids: Vec<String>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchDeleteResponse {
    #[ts(type = "number")]
    pub deleted_count: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncResponse {
    #[ts(type = "number")]
    pub updated_count: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AutoMatchResponse {
    #[ts(type = "number")]
    pub matched_count: u64,
}

/// `GET /api/cases`
///
/// Filters arrive as plain query parameters next to `page` and `pageSize`.
pub(super) async fn list_cases(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<CaseListResponse>, ApiError> {
    let request = ListRequest::from_query(&params);
    let response = state.cases.list(&request, principal).await?;
    Ok(Json(response))
}

/// `PUT /api/cases/{order_id}`
pub(super) async fn update_case(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(order_id): Path<String>,
    Json(edit): Json<CaseEdit>,
) -> Result<StatusCode, ApiError> {
    state.cases.update(&order_id, &edit, principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/cases/{order_id}`
pub(super) async fn delete_case(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Path(order_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.cases.delete(&order_id, principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/cases/batch-delete`
pub(super) async fn batch_delete(
    State(state): State<AppState>,
    Principal(principal): Principal,
    Json(body): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>, ApiError> {
    let deleted_count = state.cases.batch_delete(&body.order_ids, principal).await?;
    Ok(Json(BatchDeleteResponse { deleted_count }))
}

/// `POST /api/cases/{order_id}/refresh-order-status`
pub(super) async fn refresh_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let status = state.cases.refresh_order_status(&order_id).await?;
    Ok(Json(OrderStatusResponse { status }))
}

/// `POST /api/cases/{order_id}/refresh-refund-status`
pub(super) async fn refresh_refund_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<RefundStatusResponse>, ApiError> {
    let refund_status = state.cases.refresh_refund_status(&order_id).await?;
    Ok(Json(RefundStatusResponse { refund_status }))
}

/// `POST /api/cases/sync`
pub(super) async fn sync_data(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<SyncResponse>, ApiError> {
    let updated_count = state.cases.sync_data(principal).await?;
    Ok(Json(SyncResponse { updated_count }))
}

/// `POST /api/cases/auto-match`
pub(super) async fn auto_match(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<AutoMatchResponse>, ApiError> {
    let matched_count = state.cases.auto_match(principal).await?;
    Ok(Json(AutoMatchResponse { matched_count }))
}
