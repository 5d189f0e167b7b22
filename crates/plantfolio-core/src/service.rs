//! Sync orchestration.
//!
//! [`SyncService`] drives one run end to end:
//!
//! ```text
//! Idle -> Authenticating -> Fetching -> Reconciling(i/N) -> Finalizing -> Idle
//! ```
//!
//! It is generic over the collaborator traits in [`crate::traits`], so the
//! same code runs against PostgreSQL, S3 and the Planta API in production and
//! against in-memory mocks in tests.
//!
//! # Failure handling
//!
//! - Authentication and listing failures are fatal: the run skips straight to
//!   `Finalizing` and records a `failed` log with one run-level error.
//! - Every plant is reconciled into a [`PlantResult`]. A per-plant error is
//!   recorded and the loop moves on; sibling plants are never cancelled.
//! - Repository calls share the `plant-store` circuit breaker. Once it opens,
//!   no new plants are started and the run is recorded as broken.
//! - Photo archives share the `photo-downloads` circuit breaker. Once it opens,
//!   remaining photos are skipped with a per-plant error while metadata is
//!   still upserted.
//!
//! # Cancellation
//!
//! The `*_cancellable` methods accept a [`CancellationToken`]; the optional
//! run deadline cancels a child of it. Cancellation stops new plants from
//! starting, lets in-flight plants finish, and always ends with a run log.
//!
//! # Example
//!
//! ```ignore
//! let service = SyncService::new(token_repo, plant_repo, log_repo, planta, s3);
//! let result = service.run_with_progress(&TracingReporter).await?;
//! println!("{} photos added", result.log.photos_added);
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::PhotoArchiver;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::{
    AccessToken, ExternalPlantRecord, NewPhoto, NewPlant, PhotoInsert, PhotoSource, Plant,
    StoredPhotoRef, SyncError, SyncLog,
};
use crate::progress::{ProgressReporter, SilentReporter, SyncEvent};
use crate::retry::{RetryAction, retry_with_backoff, with_timeout};
use crate::sync::{
    PlantFailure, PlantOutcome, PlantResult, SyncPhase, SyncResult, SyncStats, SyncStatus,
    derive_run_status, has_new_photo,
};
use crate::token::TokenRefresher;
use crate::traits::{PhotoStorage, PlantSource, PlantStore, SyncLogStore, TokenStore};

/// Name of the breaker guarding repository writes.
pub const STORE_CIRCUIT: &str = "plant-store";
/// Name of the breaker guarding photo archives.
pub const DOWNLOAD_CIRCUIT: &str = "photo-downloads";

/// State threaded through the sequential listing fetch.
struct FetchContext {
    token: AccessToken,
    cursor: Option<String>,
    pages: usize,
    seen_cursors: HashSet<String>,
}

/// Plants returned by the listing.
struct FetchedPlants {
    records: Vec<ExternalPlantRecord>,
    /// False when cancellation stopped paging early.
    complete: bool,
}

/// Errors and counters accumulated over a run.
struct RunState {
    synced_at: DateTime<Utc>,
    started: Instant,
    stats: SyncStats,
    errors: Vec<SyncError>,
    status: SyncStatus,
}

impl RunState {
    fn new() -> Self {
        Self {
            synced_at: Utc::now(),
            started: Instant::now(),
            stats: SyncStats::new(),
            errors: Vec::new(),
            status: SyncStatus::Completed,
        }
    }

    fn abort(&mut self, message: impl Into<String>) {
        self.errors.push(SyncError::run_level(message));
        self.status = SyncStatus::Aborted;
    }
}

/// The breakers shared by every plant task of one run.
struct RunBreakers {
    store: CircuitBreaker,
    downloads: CircuitBreaker,
}

/// Sync orchestrator.
///
/// Generic over:
/// - `T`: [`TokenStore`] for the credentials row
/// - `S`: [`PlantStore`] for plants and photos
/// - `L`: [`SyncLogStore`] for run logs
/// - `C`: [`PlantSource`] for the Planta API
/// - `P`: [`PhotoStorage`] for archived photos
#[derive(Clone)]
pub struct SyncService<T, S, L, C, P>
where
    T: TokenStore,
    S: PlantStore,
    L: SyncLogStore,
    C: PlantSource,
    P: PhotoStorage,
{
    tokens: TokenRefresher<T, C>,
    store: S,
    logs: L,
    source: C,
    archiver: PhotoArchiver<C, P>,
    config: SyncConfig,
    run_lock: Arc<Mutex<()>>,
    phase: Arc<std::sync::Mutex<SyncPhase>>,
}

impl<T, S, L, C, P> SyncService<T, S, L, C, P>
where
    T: TokenStore,
    S: PlantStore,
    L: SyncLogStore,
    C: PlantSource,
    P: PhotoStorage,
{
    /// Creates a sync service with default configuration.
    pub fn new(tokens: T, store: S, logs: L, source: C, storage: P) -> Self {
        Self::with_config(tokens, store, logs, source, storage, SyncConfig::default())
    }

    /// Creates a sync service with custom configuration.
    pub fn with_config(
        tokens: T,
        store: S,
        logs: L,
        source: C,
        storage: P,
        config: SyncConfig,
    ) -> Self {
        let refresher = TokenRefresher::new(
            tokens,
            source.clone(),
            config.token_safety_margin,
            config.request_timeout,
            config.retry.clone(),
        );
        let archiver = PhotoArchiver::new(
            source.clone(),
            storage,
            config.download_timeout,
            config.upload_timeout,
        );

        Self {
            tokens: refresher,
            store,
            logs,
            source,
            archiver,
            config,
            run_lock: Arc::new(Mutex::new(())),
            phase: Arc::new(std::sync::Mutex::new(SyncPhase::Idle)),
        }
    }

    /// Returns the phase of the current run, [`SyncPhase::Idle`] between runs.
    pub fn current_phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while a run holds the run lock.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Runs one sync.
    ///
    /// # Errors
    ///
    /// Only [`AppError::SyncInProgress`]. Every other failure is recorded in
    /// the returned run log.
    pub async fn run(&self) -> Result<SyncResult, AppError> {
        self.run_with_progress_cancellable(&SilentReporter, CancellationToken::new())
            .await
    }

    /// Runs one sync, reporting progress.
    pub async fn run_with_progress<R: ProgressReporter>(
        &self,
        reporter: &R,
    ) -> Result<SyncResult, AppError> {
        self.run_with_progress_cancellable(reporter, CancellationToken::new())
            .await
    }

    /// Runs one sync that stops starting new plants once `cancel_token` fires.
    pub async fn run_cancellable(
        &self,
        cancel_token: CancellationToken,
    ) -> Result<SyncResult, AppError> {
        self.run_with_progress_cancellable(&SilentReporter, cancel_token)
            .await
    }

    /// Runs one sync with progress reporting and cancellation.
    pub async fn run_with_progress_cancellable<R: ProgressReporter>(
        &self,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<SyncResult, AppError> {
        let _guard = self
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::SyncInProgress)?;

        // The stored pair may have been re-imported or rotated by another
        // process since the last run.
        self.tokens.invalidate().await;

        let cancel = cancel_token.child_token();
        let deadline = self.config.run_deadline.map(|limit| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        warn!(deadline_secs = limit.as_secs(), "Run deadline reached, no new plants will start");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        info!("Starting plant sync");
        let mut run = RunState::new();
        self.execute(reporter, &cancel, &mut run).await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let result = self.finalize(reporter, run).await;
        self.set_phase(reporter, SyncPhase::Idle);
        Ok(result)
    }

    async fn execute<R: ProgressReporter>(
        &self,
        reporter: &R,
        cancel: &CancellationToken,
        run: &mut RunState,
    ) {
        self.set_phase(reporter, SyncPhase::Authenticating);
        let token = match self.tokens.ensure_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Authentication failed");
                let reason = e.user_message();
                reporter.report(SyncEvent::Aborted { reason: &reason });
                run.abort(reason);
                return;
            }
        };

        self.set_phase(reporter, SyncPhase::Fetching);
        let fetched = match self.fetch_all_plants(reporter, token, cancel).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(error = %e, "Fetching plants failed");
                if e.is_fatal() {
                    self.tokens.invalidate().await;
                }
                let reason = e.user_message();
                reporter.report(SyncEvent::Aborted { reason: &reason });
                run.abort(reason);
                return;
            }
        };
        reporter.report(SyncEvent::PlantsFetched {
            total: fetched.records.len(),
        });

        if !fetched.complete {
            run.errors.push(SyncError::run_level(
                "run cancelled before all plant pages were fetched",
            ));
            run.status = SyncStatus::Cancelled;
        }

        let local = match with_timeout(self.config.db_timeout, self.store.load_plants()).await {
            Ok(local) => local,
            Err(e) => {
                error!(error = %e, "Loading stored plants failed");
                run.abort(format!("failed to load stored plants: {}", e));
                return;
            }
        };

        self.reconcile_all(reporter, cancel, fetched.records, &local, run)
            .await;
    }

    /// Fetches every listing page in order.
    ///
    /// The access token is re-checked before each page. A repeated cursor or
    /// more than `max_pages` pages is reported as
    /// [`AppError::SourceUnavailable`].
    async fn fetch_all_plants<R: ProgressReporter>(
        &self,
        reporter: &R,
        token: AccessToken,
        cancel: &CancellationToken,
    ) -> Result<FetchedPlants, AppError> {
        let mut ctx = FetchContext {
            token,
            cursor: None,
            pages: 0,
            seen_cursors: HashSet::new(),
        };
        let mut records: Vec<ExternalPlantRecord> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(FetchedPlants {
                    records,
                    complete: false,
                });
            }

            if ctx.pages > 0 {
                ctx.token = self.tokens.ensure_valid_token().await?;
            }

            let page = retry_with_backoff(&self.config.retry, RetryAction::for_app_error, || {
                with_timeout(
                    self.config.request_timeout,
                    self.source
                        .fetch_plants_page(&ctx.token, ctx.cursor.as_deref()),
                )
            })
            .await?;
            ctx.pages += 1;

            reporter.report(SyncEvent::PageFetched {
                page: ctx.pages,
                records: page.records.len(),
            });

            for record in page.records {
                if seen_ids.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    warn!(plant_id = %record.id, "Plant listed twice, keeping first occurrence");
                }
            }

            let Some(next) = page.next_cursor else {
                break;
            };
            if !ctx.seen_cursors.insert(next.clone()) {
                return Err(AppError::SourceUnavailable(format!(
                    "pagination cursor '{}' repeated",
                    next
                )));
            }
            if ctx.pages >= self.config.max_pages {
                return Err(AppError::SourceUnavailable(format!(
                    "listing exceeded {} pages",
                    self.config.max_pages
                )));
            }
            ctx.cursor = Some(next);
        }

        Ok(FetchedPlants {
            records,
            complete: true,
        })
    }

    async fn reconcile_all<R: ProgressReporter>(
        &self,
        reporter: &R,
        cancel: &CancellationToken,
        records: Vec<ExternalPlantRecord>,
        local: &HashMap<String, Plant>,
        run: &mut RunState,
    ) {
        let total = records.len();
        let breakers = RunBreakers {
            store: CircuitBreaker::new(STORE_CIRCUIT, self.config.store_circuit_breaker.clone()),
            downloads: CircuitBreaker::new(
                DOWNLOAD_CIRCUIT,
                self.config.download_circuit_breaker.clone(),
            ),
        };
        // Cancelled on external cancellation or when the store breaker opens.
        let stop = cancel.child_token();
        let mut fatal: Option<String> = None;
        let mut done = 0;

        self.set_phase(reporter, SyncPhase::Reconciling { done, total });

        let breakers = &breakers;
        let stop_ref = &stop;
        let synced_at = run.synced_at;
        let mut results = stream::iter(records)
            .map(|record| async move {
                if stop_ref.is_cancelled() {
                    return None;
                }
                let local_plant = local.get(&record.id);
                let plant_id = record.id.clone();
                let result = self
                    .reconcile_plant(record, local_plant, breakers, synced_at)
                    .await;
                Some((plant_id, result))
            })
            .buffer_unordered(self.config.concurrency);

        while let Some(item) = results.next().await {
            let Some((plant_id, result)) = item else {
                run.stats.record_skipped();
                continue;
            };

            run.stats.record(&result);
            done += 1;

            match &result {
                Ok(outcome) => reporter.report(SyncEvent::PlantSynced {
                    plant_id: &plant_id,
                    photo_added: *outcome == PlantOutcome::PhotoAdded,
                    done,
                    total,
                }),
                Err(failure) => {
                    reporter.report(SyncEvent::PlantFailed {
                        plant_id: &plant_id,
                        error: &failure.error.message,
                        done,
                        total,
                    });
                    if failure.escalate && fatal.is_none() {
                        let reason = format!(
                            "plant store failing, run stopped: {}",
                            failure.error.message
                        );
                        error!(%reason, "Escalating repository failures to fatal");
                        reporter.report(SyncEvent::Aborted { reason: &reason });
                        fatal = Some(reason);
                        stop.cancel();
                    }
                }
            }
            if let Err(failure) = result {
                run.errors.push(failure.error);
            }

            self.update_phase(SyncPhase::Reconciling { done, total });
        }

        for breaker in [&breakers.store, &breakers.downloads] {
            let stats = breaker.stats();
            if stats.state != CircuitState::Closed {
                warn!(
                    circuit = %stats.name,
                    state = %stats.state,
                    failures = stats.failure_count,
                    last_error = stats.last_error.as_deref().unwrap_or_default(),
                    "Circuit breaker not closed at end of reconcile"
                );
            }
        }

        let skipped = run.stats.skipped;
        match fatal {
            Some(reason) => {
                let message = if skipped > 0 {
                    format!("{} ({} of {} plants not started)", reason, skipped, total)
                } else {
                    reason
                };
                run.abort(message);
            }
            None if skipped > 0 => {
                warn!(skipped, total, "Run cancelled before all plants were started");
                run.errors.push(SyncError::run_level(format!(
                    "run cancelled: {} of {} plants not started",
                    skipped, total
                )));
                run.status = SyncStatus::Cancelled;
            }
            None => {}
        }
    }

    /// Reconciles one plant: detect change, maybe archive, upsert, insert photo.
    async fn reconcile_plant(
        &self,
        record: ExternalPlantRecord,
        local: Option<&Plant>,
        breakers: &RunBreakers,
        synced_at: DateTime<Utc>,
    ) -> PlantResult {
        let plant_id = record.id.as_str();

        let mut archived: Option<(StoredPhotoRef, DateTime<Utc>)> = None;
        let mut photo_error: Option<String> = None;

        let remote_url = record.photo_url.as_deref().filter(|url| !url.is_empty());
        if let Some(url) = remote_url {
            if has_new_photo(local, &record) {
                let taken_at = record.photo_updated_at.unwrap_or(synced_at);
                match breakers
                    .downloads
                    .call(|| self.archiver.archive(url, plant_id, taken_at))
                    .await
                {
                    Ok(stored) => archived = Some((stored, taken_at)),
                    Err(CircuitBreakerError::Open { retry_after, .. }) => {
                        photo_error = Some(format!(
                            "Photo download failed: skipped, photo host failing (retry after {}s)",
                            retry_after.as_secs()
                        ));
                    }
                    Err(CircuitBreakerError::Inner(e)) => {
                        warn!(plant_id, error = %e, "Photo archive failed");
                        photo_error = Some(e.to_string());
                    }
                }
            }
        }

        let new_plant = NewPlant::from_record(&record);
        self.store_call(&breakers.store, plant_id, || {
            self.store.upsert_plant(&new_plant)
        })
        .await?;

        let mut photo_added = false;
        if let Some((stored, taken_at)) = archived {
            let photo = NewPhoto {
                plant_id: plant_id.to_string(),
                url: stored.url,
                date: taken_at,
                source: PhotoSource::External,
            };
            let inserted = self
                .store_call(&breakers.store, plant_id, || self.store.insert_photo(&photo))
                .await?;

            match inserted {
                PhotoInsert::OwnedByOtherPlant => {
                    // Keep the old timestamp so the photo is archived again next run.
                    photo_error = Some(format!(
                        "photo URL {} is already stored for another plant",
                        photo.url
                    ));
                }
                PhotoInsert::Inserted | PhotoInsert::AlreadyStored => {
                    photo_added = inserted == PhotoInsert::Inserted;
                    let with_image = new_plant.with_image_updated_at(taken_at);
                    self.store_call(&breakers.store, plant_id, || {
                        self.store.upsert_plant(&with_image)
                    })
                    .await?;
                }
            }
        }

        match photo_error {
            Some(message) => Err(PlantFailure::new(plant_id, message)),
            None if photo_added => Ok(PlantOutcome::PhotoAdded),
            None => Ok(PlantOutcome::Unchanged),
        }
    }

    /// Runs a repository call under the db timeout and the store breaker.
    ///
    /// The failure escalates when the breaker is or becomes open.
    async fn store_call<V, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        plant_id: &str,
        operation: F,
    ) -> Result<V, PlantFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, AppError>>,
    {
        let limit = self.config.db_timeout;
        match breaker.call(|| with_timeout(limit, operation())).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open { name, .. }) => Err(PlantFailure::escalated(
                plant_id,
                format!("skipped, circuit breaker '{}' is open", name),
            )),
            Err(CircuitBreakerError::Inner(e)) => {
                warn!(plant_id, error = %e, "Repository call failed");
                if breaker.state() == CircuitState::Open {
                    Err(PlantFailure::escalated(plant_id, e.to_string()))
                } else {
                    Err(PlantFailure::new(plant_id, e.to_string()))
                }
            }
        }
    }

    /// Derives the run status, writes the log and reports completion.
    ///
    /// A failed log write is logged with the full serialized log and never
    /// turns into an error.
    async fn finalize<R: ProgressReporter>(&self, reporter: &R, run: RunState) -> SyncResult {
        self.set_phase(reporter, SyncPhase::Finalizing);

        let RunState {
            synced_at,
            started,
            stats,
            errors,
            status,
        } = run;

        let log = SyncLog {
            id: Uuid::new_v4(),
            synced_at,
            status: derive_run_status(stats.checked, errors.len()),
            plants_checked: i32::try_from(stats.checked).unwrap_or(i32::MAX),
            photos_added: i32::try_from(stats.photos_added).unwrap_or(i32::MAX),
            errors,
            duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
        };

        let log_persisted =
            match with_timeout(self.config.db_timeout, self.logs.record_sync_log(&log)).await {
                Ok(()) => true,
                Err(e) => {
                    let serialized = serde_json::to_string(&log)
                        .unwrap_or_else(|se| format!("<unserializable sync log: {}>", se));
                    error!(
                        error = %e,
                        sync_log = %serialized,
                        "Failed to persist sync log"
                    );
                    false
                }
            };

        reporter.report(SyncEvent::Completed {
            log: &log,
            stats: &stats,
            status,
            log_persisted,
        });

        SyncResult {
            log,
            stats,
            status,
            log_persisted,
        }
    }

    fn set_phase<R: ProgressReporter>(&self, reporter: &R, phase: SyncPhase) {
        self.update_phase(phase);
        reporter.report(SyncEvent::PhaseChanged(phase));
    }

    fn update_phase(&self, phase: SyncPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}
