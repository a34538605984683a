// src/web/mw_admin.rs
use crate::{error::AppError, models::person::Role, web::mw_actor::Actor};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};

/// Lets the request through only if the actor holds the admin role.
/// Must run after `require_actor`.
pub async fn require_admin(
    Extension(Actor(actor)): Extension<Actor>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if actor.roles.contains(Role::Admin) {
        tracing::debug!("admin MW: access granted for {}", actor.sin_number);
        Ok(next.run(request).await)
    } else {
        tracing::warn!("admin MW: access denied for {} (no admin role)", actor.sin_number);
        Err(AppError::Forbidden)
    }
}
