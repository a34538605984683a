// src/web/mw_actor.rs
use crate::{
    error::AppError,
    models::person::Person,
    services::person_service,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header set by the authentication gateway in front of this service.
pub const ACTOR_HEADER: &str = "x-sin-number";

/// The person performing the request.
#[derive(Clone, Debug)]
pub struct Actor(pub Person);

/// Resolves the acting person from the gateway header and stores it in the
/// request extensions. Missing header or unknown person is a 401.
pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sin_number = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let Some(sin_number) = sin_number else {
        tracing::debug!("actor MW: no {} header", ACTOR_HEADER);
        return Err(AppError::Unauthorized);
    };

    match person_service::find_person_by_sin(&state.db_pool, &sin_number).await? {
        Some(person) => {
            tracing::debug!("actor MW: {} identified", person.sin_number);
            request.extensions_mut().insert(Actor(person));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("actor MW: unknown or deleted person {}", sin_number);
            Err(AppError::Unauthorized)
        }
    }
}
