// src/error.rs
use crate::models::leave::LeaveRequest;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Why an approval transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The stage slot already holds approved or rejected.
    AlreadyDecided,
    /// An earlier stage of the chain is not approved yet.
    OutOfOrder,
    /// The stage is not part of this request's chain.
    StageNotInChain,
    /// The acting person does not hold the role, or is outside the requester's scope.
    NotAuthorized,
    /// Another transition on the same request committed first.
    ConcurrentUpdate,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::AlreadyDecided => "already_decided",
            ConflictKind::OutOfOrder => "out_of_order",
            ConflictKind::StageNotInChain => "stage_not_in_chain",
            ConflictKind::NotAuthorized => "not_authorized",
            ConflictKind::ConcurrentUpdate => "concurrent_update",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict ({}): {message}", kind.as_str())]
    Conflict {
        kind: ConflictKind,
        message: String,
        current: Option<Box<LeaveRequest>>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unexpected internal error")]
    InternalServerError,

    #[error("not authenticated")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(kind: ConflictKind, message: impl Into<String>, current: &LeaveRequest) -> Self {
        AppError::Conflict {
            kind,
            message: message.into(),
            current: Some(Box::new(current.clone())),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "validation", "field": field, "message": message }),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": format!("{what} not found") }),
            ),
            AppError::Conflict {
                kind,
                message,
                current,
            } => (
                StatusCode::CONFLICT,
                json!({ "error": kind.as_str(), "message": message, "current": current }),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthorized", "message": "acting person could not be identified" }),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": "forbidden", "message": "operation not allowed for this role" }),
            ),
            AppError::Config(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "configuration", "message": message }),
            ),
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal", "message": "data store failure" }),
            ),
            AppError::EnvVarError(_) | AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal", "message": "unexpected error" }),
            ),
        };

        // 4xx responses are expected client errors
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T = ()> = Result<T, AppError>;
