use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use plantfolio_core::error::AppError;

/// API error type that maps to HTTP responses.
///
/// Messages are meant for API callers; internal error text stays in the
/// server log and the `sync_logs` table.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// JSON error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable description
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::PlantNotFound(id) => ApiError::NotFound(format!("Plant not found: {}", id)),
            AppError::SyncInProgress => {
                ApiError::Conflict("A sync is already running".to_string())
            }
            AppError::InvalidUrl(_) => ApiError::BadRequest("Invalid URL".to_string()),
            AppError::DatabaseError(_) => {
                error!(error = %err, "Database error while serving request");
                ApiError::ServiceUnavailable("Database unavailable".to_string())
            }
            AppError::SourceUnavailable(_) | AppError::Timeout(_) => {
                error!(error = %err, "Upstream error while serving request");
                ApiError::ServiceUnavailable("External service unavailable".to_string())
            }
            _ => {
                error!(error = %err, "Unexpected error while serving request");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}
