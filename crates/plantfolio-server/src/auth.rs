//! Bearer-secret middleware for the sync trigger and log endpoints.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ErrorResponse;
use crate::state::{AppState, GalleryBackend};

/// Constant-time byte comparison so the secret cannot be guessed by timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Returns true if `header` is `Bearer <expected>`.
fn bearer_matches(header: Option<&str>, expected: &str) -> bool {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
}

/// Middleware that validates `Authorization: Bearer <secret>` against `CRON_SECRET`.
///
/// Runs before any handler work, so a rejected request never reaches the
/// database or the Planta API.
///
/// - No secret configured: 403 Forbidden.
/// - Missing or wrong secret: 401 Unauthorized.
pub async fn require_cron_secret<B: GalleryBackend>(
    State(state): State<AppState<B>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.cron_secret.as_deref() else {
        let body = ErrorResponse {
            error: "forbidden".to_string(),
            message: "Protected endpoints are disabled (no CRON_SECRET configured)".to_string(),
        };
        return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
    };

    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !bearer_matches(header, expected) {
        warn!(path = %request.uri().path(), "Rejected request with missing or invalid bearer secret");
        let body = ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Unauthorized".to_string(),
        };
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(request).await
}
