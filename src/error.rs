use crate::domain::{MatchId, MatchStatus, Side};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Caller-facing failures of the registry and control plane. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("match {0} is already active")]
    DuplicateMatch(MatchId),
    #[error("{side} roster has {eligible} eligible players, {required} required")]
    InsufficientRoster {
        side: Side,
        eligible: usize,
        required: usize,
    },
    #[error("match {0} is not active")]
    MatchNotFound(MatchId),
    #[error("cannot {command} match {match_id} while {status}")]
    InvalidState {
        match_id: MatchId,
        status: MatchStatus,
        command: &'static str,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        let msg = err.to_string();
        match err {
            MatchError::DuplicateMatch(_) | MatchError::InvalidState { .. } => {
                AppError::Conflict(msg)
            }
            MatchError::InsufficientRoster { .. } | MatchError::InvalidParameter(_) => {
                AppError::BadRequest(msg)
            }
            MatchError::MatchNotFound(_) => AppError::NotFound(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
