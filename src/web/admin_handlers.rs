// src/web/admin_handlers.rs
use crate::{
    error::AppResult,
    services::person_service,
    state::AppState,
    web::mw_actor::Actor,
};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};

/// DELETE /admin/users/{sin}
pub async fn handle_delete_user(
    State(state): State<AppState>,
    Extension(Actor(admin)): Extension<Actor>,
    Path(sin_number): Path<String>,
) -> AppResult<StatusCode> {
    tracing::info!("{} deletes person {}", admin.sin_number, sin_number);
    person_service::soft_delete_person(&state.db_pool, &sin_number).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/users/{sin}/restore
pub async fn handle_restore_user(
    State(state): State<AppState>,
    Extension(Actor(admin)): Extension<Actor>,
    Path(sin_number): Path<String>,
) -> AppResult<StatusCode> {
    tracing::info!("{} restores person {}", admin.sin_number, sin_number);
    person_service::restore_person(&state.db_pool, &sin_number).await?;
    Ok(StatusCode::NO_CONTENT)
}
