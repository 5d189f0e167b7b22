//! Progress reporting for sync runs.
//!
//! [`SyncService`](crate::service::SyncService) emits [`SyncEvent`]s as it
//! moves through its phases. The CLI logs them with [`TracingReporter`]; the
//! HTTP trigger uses [`SilentReporter`] and relies on the run log.

use tracing::{info, warn};

use crate::models::SyncLog;
use crate::sync::{SyncPhase, SyncStats, SyncStatus};

/// Events emitted during a sync run.
#[derive(Debug, Clone)]
pub enum SyncEvent<'a> {
    /// The run entered a new phase.
    PhaseChanged(SyncPhase),
    /// One listing page fetched.
    PageFetched { page: usize, records: usize },
    /// All pages fetched.
    PlantsFetched { total: usize },
    /// A plant was reconciled.
    PlantSynced {
        plant_id: &'a str,
        photo_added: bool,
        done: usize,
        total: usize,
    },
    /// A plant failed.
    PlantFailed {
        plant_id: &'a str,
        error: &'a str,
        done: usize,
        total: usize,
    },
    /// The run stopped early.
    Aborted { reason: &'a str },
    /// The run finished and its log was written (or not).
    Completed {
        log: &'a SyncLog,
        stats: &'a SyncStats,
        status: SyncStatus,
        log_persisted: bool,
    },
}

/// Trait for reporting sync progress.
pub trait ProgressReporter: Send + Sync {
    /// Called when a sync event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Tracing-based reporter for CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::PhaseChanged(phase) => {
                tracing::debug!(%phase, "Sync phase changed");
            }
            SyncEvent::PageFetched { page, records } => {
                tracing::debug!(page, records, "Fetched plant page");
            }
            SyncEvent::PlantsFetched { total } => {
                info!(total, "Fetched plants from Planta");
            }
            SyncEvent::PlantSynced {
                plant_id,
                photo_added,
                done,
                total,
            } => {
                if photo_added {
                    info!(plant_id, done, total, "Archived new photo");
                } else {
                    tracing::debug!(plant_id, done, total, "Plant unchanged");
                }
            }
            SyncEvent::PlantFailed {
                plant_id,
                error,
                done,
                total,
            } => {
                warn!(plant_id, %error, done, total, "Plant sync failed");
            }
            SyncEvent::Aborted { reason } => {
                warn!(%reason, "Sync aborted");
            }
            SyncEvent::Completed {
                log,
                stats,
                status,
                log_persisted,
            } => {
                info!(
                    run_status = %log.status,
                    completion = %status,
                    plants_checked = log.plants_checked,
                    photos_added = log.photos_added,
                    errors = log.errors.len(),
                    skipped = stats.skipped,
                    duration_ms = log.duration_ms,
                    log_persisted,
                    "Sync finished"
                );
            }
        }
    }
}
