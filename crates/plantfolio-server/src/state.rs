use std::future::Future;

use tokio_util::sync::CancellationToken;

use plantfolio_client::{PlantaClient, S3PhotoStorage};
use plantfolio_core::{
    AppError, PlantWithPhotos, SyncConfig, SyncLog, SyncResult, SyncService, SilentReporter,
};
use plantfolio_db::{PlantRepository, SyncLogRepository, TokenRepository};

/// The production sync service: PostgreSQL stores, the Planta API, S3 photos.
pub type LiveSyncService = SyncService<
    TokenRepository,
    PlantRepository,
    SyncLogRepository,
    PlantaClient,
    S3PhotoStorage,
>;

/// Everything the HTTP handlers need from the rest of the system.
///
/// Handlers are generic over this trait so the router can be exercised
/// without a database or network access.
pub trait GalleryBackend: Send + Sync + Clone + 'static {
    /// Lists every plant with its photos, ordered for the gallery.
    fn list_plants(&self) -> impl Future<Output = Result<Vec<PlantWithPhotos>, AppError>> + Send;

    /// Loads one plant with its photos, newest first.
    fn get_plant(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<PlantWithPhotos>, AppError>> + Send;

    /// Returns the most recent run logs, newest first.
    fn recent_sync_logs(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<SyncLog>, AppError>> + Send;

    /// Probes the database.
    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Runs one sync until it finishes or `cancel` fires.
    fn run_sync(
        &self,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<SyncResult, AppError>> + Send;
}

/// [`GalleryBackend`] over the PostgreSQL repositories and the live sync service.
#[derive(Clone)]
pub struct LiveBackend {
    plants: PlantRepository,
    logs: SyncLogRepository,
    sync: LiveSyncService,
}

impl LiveBackend {
    /// Wires the repositories and clients into a backend.
    pub fn new(
        pool: sqlx::PgPool,
        planta: PlantaClient,
        storage: S3PhotoStorage,
        sync_config: SyncConfig,
    ) -> Self {
        let plants = PlantRepository::new(pool.clone());
        let logs = SyncLogRepository::new(pool.clone());
        let tokens = TokenRepository::new(pool);

        let sync = SyncService::with_config(
            tokens,
            plants.clone(),
            logs.clone(),
            planta,
            storage,
            sync_config,
        );

        Self { plants, logs, sync }
    }
}

impl GalleryBackend for LiveBackend {
    async fn list_plants(&self) -> Result<Vec<PlantWithPhotos>, AppError> {
        self.plants.list_plants_with_photos().await
    }

    async fn get_plant(&self, id: &str) -> Result<Option<PlantWithPhotos>, AppError> {
        self.plants.get_plant_with_photos(id).await
    }

    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLog>, AppError> {
        self.logs.list_recent(limit).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.plants.health_check().await
    }

    async fn run_sync(&self, cancel: CancellationToken) -> Result<SyncResult, AppError> {
        self.sync
            .run_with_progress_cancellable(&SilentReporter, cancel)
            .await
    }
}

/// Shared application state for all handlers.
///
/// Axum clones the state for every request; `B` is expected to be cheap to
/// clone (pools and services are `Arc`-backed).
#[derive(Clone)]
pub struct AppState<B: GalleryBackend> {
    /// Data access and sync execution
    pub backend: B,

    /// Bearer secret for the trigger and log endpoints; `None` disables them
    pub cron_secret: Option<String>,

    /// Cancellation token for graceful shutdown
    pub shutdown_token: CancellationToken,
}

impl<B: GalleryBackend> AppState<B> {
    /// Creates a new application state.
    pub fn new(backend: B, cron_secret: Option<String>, shutdown_token: CancellationToken) -> Self {
        Self {
            backend,
            cron_secret,
            shutdown_token,
        }
    }
}
