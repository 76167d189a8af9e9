//! Live service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Internal failures return a generic message to clients; the detail is
//! logged server-side.

use crate::transport::TransportError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Live service error type.
///
/// Maps to HTTP status codes:
/// - Validation: 400 Bad Request
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - RoomNotFound: 404 Not Found
/// - AlreadyStreaming, NotStreaming: 409 Conflict
/// - Negotiation, Internal: 500 Internal Server Error
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Room not found")]
    RoomNotFound,

    #[error("User is already streaming")]
    AlreadyStreaming,

    #[error("User is not streaming")]
    NotStreaming,

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl LiveError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            LiveError::Validation(_) => 400,
            LiveError::InvalidToken(_) => 401,
            LiveError::Forbidden(_) => 403,
            LiveError::RoomNotFound => 404,
            LiveError::AlreadyStreaming | LiveError::NotStreaming => 409,
            LiveError::Negotiation(_) | LiveError::Internal(_) => 500,
            LiveError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for LiveError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            LiveError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                reason.clone(),
            ),
            LiveError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            LiveError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            LiveError::RoomNotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Room not found".to_string(),
            ),
            LiveError::AlreadyStreaming => (
                StatusCode::CONFLICT,
                "ALREADY_STREAMING",
                "User is already streaming".to_string(),
            ),
            LiveError::NotStreaming => (
                StatusCode::CONFLICT,
                "NOT_STREAMING",
                "User is not streaming".to_string(),
            ),
            LiveError::Negotiation(err) => {
                tracing::error!(target: "live.upload", error = %err, "Stream negotiation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "NEGOTIATION_FAILED",
                    "Failed to negotiate the stream".to_string(),
                )
            }
            LiveError::Internal(err) => {
                tracing::error!(target: "live.errors", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            LiveError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "live.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"streamfox-live\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

impl From<TransportError> for LiveError {
    fn from(err: TransportError) -> Self {
        LiveError::Negotiation(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies surface as validation errors.
impl From<JsonRejection> for LiveError {
    fn from(rejection: JsonRejection) -> Self {
        LiveError::Validation(rejection.body_text())
    }
}
