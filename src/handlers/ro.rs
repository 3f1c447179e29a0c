use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{created_response, parse_ro_id, success_response, AppState};
use crate::auth::Actor;
use crate::errors::ServiceError;
use crate::models::{BoxCounts, RoStatus};
use crate::services::allocation_edits::BatchEditRequest;
use crate::services::discrepancy::RecordCountsRequest;
use crate::services::dnpb::SetDnpbRequest;
use crate::services::order_validator::SubmitOrderRequest;
use crate::services::replenishment_orders::SuggestAllocationRequest;
use crate::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// When present, the change only applies if the order is still in this status
    pub expected_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditLineRequest {
    #[serde(default)]
    pub boxes: BoxCounts,
}

/// Replenishment order routes, mounted under `/api/v1`.
pub fn ro_routes() -> Router<AppState> {
    Router::new()
        .route("/ro", get(list_orders).post(submit_order))
        .route("/ro/dnpb-errors", get(list_dnpb_errors))
        .route("/ro/:id", get(get_order))
        .route("/ro/:id/status", patch(update_status))
        .route("/ro/:id/history", get(get_history))
        .route("/ro/:id/dnpb", get(get_dnpb).put(set_dnpb))
        .route("/ro/:id/allocations", patch(batch_edit_allocations))
        .route("/ro/:id/allocations/:code", patch(edit_line_allocation))
        .route("/ro/:id/receipt", put(record_counts))
        .route("/ro/:id/banding", post(raise_banding))
        .route("/ro/:id/confirm", post(confirm_discrepancy))
        .route("/allocations/suggest", post(suggest_allocation))
}

async fn submit_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<SubmitOrderRequest>,
) -> Result<Response, ServiceError> {
    let order = state
        .engine
        .orders
        .submit_order(&payload, actor.as_str())
        .await?;
    info!(ro_id = %order.ro_id, actor = %actor.as_str(), "replenishment order submitted");
    Ok(created_response(order))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Response, ServiceError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(RoStatus::parse)
        .transpose()?;
    let orders = state.engine.orders.list_orders(status).await?;
    Ok(success_response(orders))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    Ok(success_response(state.engine.orders.get_order(ro_id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let target = RoStatus::parse(&payload.status)?;

    let change = match payload.expected_status.as_deref() {
        Some(expected) => {
            let expected = RoStatus::parse(expected)?;
            state
                .engine
                .status
                .transition_from(ro_id, expected, target, actor.as_str())
                .await?
        }
        None => {
            state
                .engine
                .status
                .transition(ro_id, target, actor.as_str())
                .await?
        }
    };
    Ok(success_response(change))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    Ok(success_response(state.engine.status.history(ro_id).await?))
}

async fn set_dnpb(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<SetDnpbRequest>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let records = state
        .engine
        .dnpb
        .set_dnpb(ro_id, &payload.numbers, actor.as_str())
        .await?;
    Ok(success_response(records))
}

async fn get_dnpb(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    Ok(success_response(state.engine.dnpb.get_dnpb(ro_id).await?))
}

/// 200 when every entry was applied, 207 when some failed.
async fn batch_edit_allocations(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<BatchEditRequest>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let outcome = state
        .engine
        .allocations
        .batch_edit(ro_id, &payload.entries, actor.as_str())
        .await?;

    if outcome.is_partial() {
        let message = format!(
            "{} of {} entries could not be applied",
            outcome.failed.len(),
            outcome.failed.len() + outcome.updated.len()
        );
        let body = ApiResponse::success(outcome).with_message(message);
        return Ok((StatusCode::MULTI_STATUS, Json(body)).into_response());
    }
    Ok(success_response(outcome))
}

async fn edit_line_allocation(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, code)): Path<(String, String)>,
    Json(payload): Json<EditLineRequest>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let line = state
        .engine
        .allocations
        .edit_line(ro_id, &code, &payload.boxes, actor.as_str())
        .await?;
    Ok(success_response(line))
}

async fn record_counts(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(payload): Json<RecordCountsRequest>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let receipt = state
        .engine
        .discrepancies
        .record_physical_counts(ro_id, &payload.counts, actor.as_str())
        .await?;
    Ok(success_response(receipt))
}

async fn raise_banding(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let notice = state
        .engine
        .discrepancies
        .raise_banding(ro_id, actor.as_str())
        .await?;
    Ok(created_response(notice))
}

async fn confirm_discrepancy(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let ro_id = parse_ro_id(&id)?;
    let outcome = state
        .engine
        .discrepancies
        .confirm_discrepancy(ro_id, actor.as_str())
        .await?;
    Ok(success_response(outcome))
}

async fn list_dnpb_errors(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let report = state
        .engine
        .discrepancies
        .list_confirmed_discrepancies()
        .await?;
    Ok(success_response(report))
}

async fn suggest_allocation(
    State(state): State<AppState>,
    Json(payload): Json<SuggestAllocationRequest>,
) -> Result<Response, ServiceError> {
    let suggestion = state.engine.orders.suggest_allocation(&payload).await?;
    Ok(success_response(suggestion))
}
