// src/web/leave_handlers.rs
use crate::{
    error::AppResult,
    models::leave::{ApprovalAction, LeaveSubmission, LeaveView},
    services::{approval_service, leave_service},
    state::AppState,
    web::mw_actor::Actor,
};
use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// POST /leaves
pub async fn handle_submit_leave(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(submission): Json<LeaveSubmission>,
) -> AppResult<impl IntoResponse> {
    let request_id = leave_service::submit_leave(&state.db_pool, &actor, submission).await?;
    Ok((StatusCode::CREATED, Json(json!({ "request_id": request_id }))))
}

/// GET /leaves/{request_id}
pub async fn handle_get_leave(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<LeaveView>> {
    Ok(Json(leave_service::get_leave_view(&state.db_pool, &request_id).await?))
}

/// GET /leaves/pending
pub async fn handle_pending_leaves(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> AppResult<Json<Vec<LeaveView>>> {
    Ok(Json(leave_service::list_pending_for(&state.db_pool, &actor).await?))
}

/// POST /leaves/{request_id}/decision
pub async fn handle_decision(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(request_id): Path<String>,
    Json(action): Json<ApprovalAction>,
) -> AppResult<Json<LeaveView>> {
    let view = approval_service::decide(&state.db_pool, &request_id, &actor, &action).await?;
    Ok(Json(view))
}
