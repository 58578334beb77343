//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sceau_kms::KmsError;

/// Errors returned by API handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown key, or no ACTIVE key.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed identity, base64, or status.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The envelope could not be opened.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Refused status change, create while a key is ACTIVE, or a lost rotation race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A store call ran past its deadline.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Anything else. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code.
    pub code: String,
}

impl From<KmsError> for ApiError {
    fn from(e: KmsError) -> Self {
        match e {
            KmsError::KeyNotFound(id) => ApiError::NotFound(format!("key {id} not found")),
            KmsError::NoActiveKey => ApiError::NotFound("no active key".into()),
            KmsError::DecryptionFailed { .. } => ApiError::DecryptionFailed,
            e @ (KmsError::InvalidStatusTransition { .. }
            | KmsError::ActiveKeyExists { .. }
            | KmsError::RotationConflict(_)) => ApiError::Conflict(e.to_string()),
            KmsError::DeadlineExceeded(op) => ApiError::Unavailable(format!("{op} timed out")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::DecryptionFailed => (
                StatusCode::BAD_REQUEST,
                "DECRYPTION_FAILED",
                "decryption failed".to_string(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg.clone())
            },
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "the server encountered a problem".to_string(),
                )
            },
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;
