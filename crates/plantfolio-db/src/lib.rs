//! Plantfolio DB - PostgreSQL repository layer
//!
//! This crate provides the repository pattern for the plant gallery
//! and implements the sync core's persistence traits.
//!
//! # Overview
//!
//! The main components are:
//! - [`PlantRepository`] - plants and photos ([`plantfolio_core::traits::PlantStore`])
//! - [`TokenRepository`] - the singleton Planta token row ([`plantfolio_core::traits::TokenStore`])
//! - [`SyncLogRepository`] - append-only run logs ([`plantfolio_core::traits::SyncLogStore`])
//! - [`run_migrations`] - applies the embedded schema migrations

mod plant_repository;
mod sync_log_repository;
mod token_repository;

pub use plant_repository::PlantRepository;
pub use sync_log_repository::{MAX_LOG_LIMIT, SyncLogRepository};
pub use token_repository::{TOKEN_ROW_ID, TokenRepository};

use plantfolio_core::error::AppError;
use plantfolio_core::DbConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Opens a connection pool to `database_url`.
pub async fn connect(database_url: &str, config: &DbConfig) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .map_err(AppError::DatabaseError)
}

/// Applies the migrations embedded from `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))
}
