//! Plantfolio Core - Domain types, business logic, and the sync service.
//!
//! This crate provides the core functionality for Plantfolio, including:
//!
//! - **Domain models**: [`Plant`], [`Photo`], [`Token`], [`SyncLog`], etc.
//! - **Business logic**: photo change detection, display names, run status
//! - **Services**: [`SyncService`] mirroring the Planta collection into the
//!   gallery database and object storage
//! - **Traits**: [`PlantSource`], [`PhotoStorage`], [`TokenStore`],
//!   [`PlantStore`], [`SyncLogStore`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! This crate is reused by the CLI and the HTTP server. Business logic is
//! decoupled from I/O through traits:
//!
//! - [`PlantSource`] - the Planta API and its image host (`plantfolio-client`)
//! - [`PhotoStorage`] - S3-compatible object storage (`plantfolio-client`)
//! - [`TokenStore`], [`PlantStore`], [`SyncLogStore`] - PostgreSQL (`plantfolio-db`)
//!
//! # Example
//!
//! ```ignore
//! use plantfolio_core::{SyncConfig, SyncService, TracingReporter};
//!
//! let service = SyncService::with_config(tokens, plants, logs, planta, s3, SyncConfig::from_env());
//! let result = service.run_with_progress(&TracingReporter).await?;
//! println!("{}: {} photos added", result.log.status, result.log.photos_added);
//! ```

pub mod archive;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod retry;
pub mod service;
pub mod sync;
pub mod token;
pub mod traits;

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
};

// Configuration
pub use config::{
    DbConfig, HttpConfig, PlantaConfig, SyncConfig, SyncSettings, default_config_path,
    load_sync_settings,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    AccessToken, DownloadedPhoto, ExternalPlantRecord, FALLBACK_PLANT_NAME, NewPhoto, NewPlant,
    Photo, PhotoInsert, PhotoSource, Plant, PlantPage, PlantWithPhotos, StoredPhotoRef, SyncError, SyncLog,
    SyncLogStatus, Token, TokenPair, display_name, most_recent_photo,
};

// Sync types and business logic
pub use sync::{
    PlantFailure, PlantOutcome, PlantResult, SyncPhase, SyncResult, SyncStats, SyncStatus,
    derive_run_status, has_new_photo, photo_is_newer,
};

// Retry
pub use retry::{RetryAction, RetryConfig, retry_with_backoff};

// Progress reporting
pub use progress::{ProgressReporter, SilentReporter, SyncEvent, TracingReporter};

// Traits for dependency injection
pub use traits::{PhotoStorage, PlantSource, PlantStore, SyncLogStore, TokenStore};

// Services (generic over trait implementations)
pub use archive::{PhotoArchiver, photo_storage_key};
pub use service::SyncService;
pub use token::TokenRefresher;
