//! Sync trigger and run log endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use tracing::{error, info};

use plantfolio_db::MAX_LOG_LIMIT;

use crate::dto::{
    DEFAULT_LOG_LIMIT, SyncLogDto, SyncLogsQuery, SyncLogsResponse, SyncTriggerQuery,
    SyncTriggerResponse,
};
use crate::error::ApiError;
use crate::state::{AppState, GalleryBackend};

/// Run one plant sync.
///
/// Called by the scheduler, or manually with `manual=true`. The run executes
/// on its own task, so it finishes and writes its log even if the caller
/// disconnects. The response is a summary; detailed errors are available
/// from `GET /api/v1/sync-logs`.
#[utoipa::path(
    get,
    path = "/api/sync-plants",
    params(SyncTriggerQuery),
    responses(
        (status = 200, description = "Run finished", body = SyncTriggerResponse),
        (status = 401, description = "Missing or invalid bearer secret"),
        (status = 409, description = "A sync is already running"),
    ),
    security(("bearer" = [])),
    tag = "sync"
)]
pub async fn trigger_sync<B: GalleryBackend>(
    State(state): State<AppState<B>>,
    Query(params): Query<SyncTriggerQuery>,
) -> Result<Json<SyncTriggerResponse>, ApiError> {
    info!(manual = params.manual, "Plant sync triggered");

    let backend = state.backend.clone();
    let cancel = state.shutdown_token.child_token();
    let handle = tokio::spawn(async move { backend.run_sync(cancel).await });

    let result = handle
        .await
        .map_err(|e| {
            error!(error = %e, "Sync task panicked or was aborted");
            ApiError::Internal("Sync task failed".to_string())
        })??;

    info!(
        manual = params.manual,
        status = %result.log.status,
        plants_checked = result.log.plants_checked,
        photos_added = result.log.photos_added,
        errors = result.log.errors.len(),
        "Plant sync finished"
    );

    Ok(Json(SyncTriggerResponse::from_result(
        &result,
        params.manual,
        Utc::now(),
    )))
}

/// List recent sync runs with their detailed errors.
#[utoipa::path(
    get,
    path = "/api/v1/sync-logs",
    params(SyncLogsQuery),
    responses(
        (status = 200, description = "Recent runs, newest first", body = SyncLogsResponse),
        (status = 400, description = "Invalid limit"),
        (status = 401, description = "Missing or invalid bearer secret"),
    ),
    security(("bearer" = [])),
    tag = "sync"
)]
pub async fn list_sync_logs<B: GalleryBackend>(
    State(state): State<AppState<B>>,
    Query(params): Query<SyncLogsQuery>,
) -> Result<Json<SyncLogsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    if limit < 1 {
        return Err(ApiError::BadRequest(
            "limit must be a positive integer".to_string(),
        ));
    }

    let logs = state
        .backend
        .recent_sync_logs(limit.min(MAX_LOG_LIMIT))
        .await?;
    let logs: Vec<SyncLogDto> = logs.into_iter().map(SyncLogDto::from).collect();

    Ok(Json(SyncLogsResponse {
        count: logs.len(),
        logs,
    }))
}
