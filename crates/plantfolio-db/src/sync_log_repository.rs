//! Append-only repository for sync run logs.

use chrono::{DateTime, Utc};
use plantfolio_core::error::AppError;
use plantfolio_core::models::{SyncError, SyncLog, SyncLogStatus};
use plantfolio_core::traits::SyncLogStore;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Upper bound on rows returned by [`SyncLogRepository::list_recent`].
pub const MAX_LOG_LIMIT: i64 = 200;

/// Repository for `sync_logs`. Rows are inserted once and never updated.
#[derive(Clone)]
pub struct SyncLogRepository {
    pool: Pool<Postgres>,
}

impl SyncLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the log of a finished run.
    pub async fn insert(&self, log: &SyncLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (
                id,
                synced_at,
                status,
                plants_checked,
                photos_added,
                errors,
                duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.synced_at)
        .bind(log.status.as_str())
        .bind(log.plants_checked)
        .bind(log.photos_added)
        .bind(Json(&log.errors))
        .bind(log.duration_ms)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    /// Returns up to `limit` runs, newest first. `limit` is clamped to
    /// `1..=MAX_LOG_LIMIT`.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<SyncLog>, AppError> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            r#"
            SELECT id, synced_at, status, plants_checked, photos_added, errors, duration_ms
            FROM sync_logs
            ORDER BY synced_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, MAX_LOG_LIMIT))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        rows.into_iter().map(SyncLog::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SyncLogRow {
    id: Uuid,
    synced_at: DateTime<Utc>,
    status: String,
    plants_checked: i32,
    photos_added: i32,
    errors: Json<Vec<SyncError>>,
    duration_ms: i64,
}

impl TryFrom<SyncLogRow> for SyncLog {
    type Error = AppError;

    fn try_from(row: SyncLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            synced_at: row.synced_at,
            status: row.status.parse::<SyncLogStatus>()?,
            plants_checked: row.plants_checked,
            photos_added: row.photos_added,
            errors: row.errors.0,
            duration_ms: row.duration_ms,
        })
    }
}

impl SyncLogStore for SyncLogRepository {
    async fn record_sync_log(&self, log: &SyncLog) -> Result<(), AppError> {
        SyncLogRepository::insert(self, log).await
    }
}
