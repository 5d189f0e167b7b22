//! Pure business logic for plant reconciliation.
//!
//! This module provides photo change detection, per-plant outcomes, run
//! statistics and run status derivation, decoupled from I/O and from the
//! orchestration in [`crate::service`].

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{ExternalPlantRecord, Plant, SyncError, SyncLog, SyncLogStatus};

/// Returns true when the source's photo timestamp is strictly newer than the
/// locally archived one.
///
/// An absent local timestamp always yields true. An absent remote timestamp
/// with a present local one yields false.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use plantfolio_core::sync::photo_is_newer;
///
/// let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
///
/// assert!(photo_is_newer(None, Some(older)));
/// assert!(photo_is_newer(Some(older), Some(newer)));
/// assert!(!photo_is_newer(Some(newer), Some(newer)));
/// assert!(!photo_is_newer(Some(newer), Some(older)));
/// ```
pub fn photo_is_newer(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    match (local, remote) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(local), Some(remote)) => remote > local,
    }
}

/// Decides whether the photo reported for `remote` must be archived.
///
/// `local` is `None` for a plant that has never been stored.
pub fn has_new_photo(local: Option<&Plant>, remote: &ExternalPlantRecord) -> bool {
    photo_is_newer(
        local.and_then(|plant| plant.external_image_updated_at),
        remote.photo_updated_at,
    )
}

/// Successful reconciliation of a single plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantOutcome {
    /// Metadata upserted, photo unchanged.
    Unchanged,
    /// Metadata upserted and a new photo archived and inserted.
    PhotoAdded,
}

/// Failed reconciliation of a single plant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantFailure {
    /// The log entry for this failure.
    pub error: SyncError,
    /// Set when the failure means the store is unusable for every later plant.
    pub escalate: bool,
}

impl PlantFailure {
    pub fn new(plant_id: &str, message: impl Into<String>) -> Self {
        Self {
            error: SyncError::for_plant(plant_id, message),
            escalate: false,
        }
    }

    pub fn escalated(plant_id: &str, message: impl Into<String>) -> Self {
        Self {
            error: SyncError::for_plant(plant_id, message),
            escalate: true,
        }
    }
}

/// Result of reconciling one plant.
pub type PlantResult = Result<PlantOutcome, PlantFailure>;

/// Counters for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Plants reconciled without error.
    pub checked: usize,
    /// Photos archived and inserted.
    pub photos_added: usize,
    /// Plants that recorded an error.
    pub failed: usize,
    /// Plants never started because the run was cancelled or aborted.
    pub skipped: usize,
}

impl SyncStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of one plant.
    pub fn record(&mut self, result: &PlantResult) {
        match result {
            Ok(PlantOutcome::Unchanged) => self.checked += 1,
            Ok(PlantOutcome::PhotoAdded) => {
                self.checked += 1;
                self.photos_added += 1;
            }
            Err(_) => self.failed += 1,
        }
    }

    /// Records a plant that was never started.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }
}

/// Derives the run status from the number of successful plants and the
/// number of recorded errors.
///
/// - no errors: `success`
/// - errors and no successful plant: `failed`
/// - errors and at least one successful plant: `partial`
pub fn derive_run_status(successes: usize, errors: usize) -> SyncLogStatus {
    if errors == 0 {
        SyncLogStatus::Success
    } else if successes == 0 {
        SyncLogStatus::Failed
    } else {
        SyncLogStatus::Partial
    }
}

/// Phases of a run.
///
/// ```text
/// Idle -> Authenticating -> Fetching -> Reconciling(i/N) -> Finalizing -> Idle
///               |               |
///               +---------------+--> Finalizing (failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Authenticating,
    Fetching,
    Reconciling {
        done: usize,
        total: usize,
    },
    Finalizing,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Authenticating => write!(f, "authenticating"),
            SyncPhase::Fetching => write!(f, "fetching"),
            SyncPhase::Reconciling { done, total } => write!(f, "reconciling ({}/{})", done, total),
            SyncPhase::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Every fetched plant was attempted.
    Completed,
    /// External cancellation stopped the run before every plant was started.
    Cancelled,
    /// A fatal error stopped the run early.
    Aborted,
}

impl SyncStatus {
    /// Returns the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Cancelled => "cancelled",
            SyncStatus::Aborted => "aborted",
        }
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncStatus::Cancelled)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller learns about a finished run.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// The run log, persisted or not.
    pub log: SyncLog,
    pub stats: SyncStats,
    pub status: SyncStatus,
    /// False when writing the log row failed.
    pub log_persisted: bool,
}

impl SyncResult {
    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }
}
