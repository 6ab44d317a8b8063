use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::jwt::TokenError, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed, badly signed, wrong type, wrong issuer/audience, blacklisted
    /// or unknown to the store.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    /// A spent renewal credential was presented again; its family has been
    /// revoked and the subject's generation bumped.
    #[error("Refresh token reuse detected")]
    ReuseDetected,

    /// The credential predates the subject's current generation.
    #[error("Stale token generation")]
    StaleGeneration,

    /// The store could not complete a rotation; no credentials were issued.
    #[error("Rotation unavailable: {0}")]
    RotationUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Db(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::Expired,
            TokenError::Signing(msg) => AppError::Internal(format!("jwt encode: {msg}")),
            _ => AppError::InvalidToken,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => AppError::Conflict(what),
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Db(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid token"),
            AppError::Expired => (StatusCode::UNAUTHORIZED, "token expired"),
            AppError::ReuseDetected | AppError::StaleGeneration => (
                StatusCode::UNAUTHORIZED,
                "session revoked, re-authenticate",
            ),
            AppError::RotationUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "token service unavailable")
            }
            AppError::Validation(s) => (StatusCode::BAD_REQUEST, s.as_str()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Conflict(s) => (StatusCode::CONFLICT, s.as_str()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
