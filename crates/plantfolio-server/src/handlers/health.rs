//! Health check endpoint.

use axum::{Json, extract::State, http::StatusCode};
use tracing::warn;

use crate::dto::{HealthResponse, ServiceStatus};
use crate::state::{AppState, GalleryBackend};

/// Health check endpoint.
///
/// Returns the server version and probes the database. Responds with 503
/// when the database is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health_check<B: GalleryBackend>(
    State(state): State<AppState<B>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match state.backend.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            ServiceStatus {
                healthy: true,
                message: None,
            },
        ),
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ServiceStatus {
                    healthy: false,
                    message: Some("Database unreachable".to_string()),
                },
            )
        }
    };

    let label = if status == StatusCode::OK {
        "healthy"
    } else {
        "degraded"
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }),
    )
}
