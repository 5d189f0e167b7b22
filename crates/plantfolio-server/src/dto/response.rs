//! Response DTOs for API endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use plantfolio_core::{Photo, PlantWithPhotos, SyncError, SyncLog, SyncResult};

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
}

/// Status of an individual service component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Plants
// =============================================================================

/// One archived photo.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDto {
    pub id: Uuid,
    /// Public URL of the image
    pub url: String,
    /// When the photo was taken
    pub date: DateTime<Utc>,
    /// "external" or "manual_upload"
    pub source: String,
}

impl From<&Photo> for PhotoDto {
    fn from(p: &Photo) -> Self {
        Self {
            id: p.id,
            url: p.url.clone(),
            date: p.date,
            source: p.source.as_str().to_string(),
        }
    }
}

/// Gallery card for one plant.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlantSummaryDto {
    pub id: String,
    /// Custom name, else common name, else scientific name
    pub display_name: String,
    pub common_name: Option<String>,
    pub location: Option<String>,
    /// Most recent photo, if any
    pub latest_photo: Option<PhotoDto>,
    pub photo_count: usize,
}

impl From<&PlantWithPhotos> for PlantSummaryDto {
    fn from(p: &PlantWithPhotos) -> Self {
        Self {
            id: p.plant.id.clone(),
            display_name: p.display_name().to_string(),
            common_name: p.plant.common_name.clone(),
            location: p.plant.location.clone(),
            latest_photo: p.latest_photo().map(PhotoDto::from),
            photo_count: p.photos.len(),
        }
    }
}

/// Plant gallery listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlantListResponse {
    /// Number of plants returned
    pub count: usize,
    /// Ordered by common name, unnamed plants last
    pub plants: Vec<PlantSummaryDto>,
}

/// Plant detail page.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlantDetailResponse {
    pub id: String,
    pub display_name: String,
    pub custom_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub location: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Most recent photo, shown as the main image
    pub main_photo: Option<PhotoDto>,
    /// All photos, newest first
    pub photos: Vec<PhotoDto>,
}

impl From<PlantWithPhotos> for PlantDetailResponse {
    fn from(p: PlantWithPhotos) -> Self {
        let display_name = p.display_name().to_string();
        let main_photo = p.latest_photo().map(PhotoDto::from);
        let photos = p.photos.iter().map(PhotoDto::from).collect();
        let plant = p.plant;

        Self {
            id: plant.id,
            display_name,
            custom_name: plant.custom_name,
            common_name: plant.common_name,
            scientific_name: plant.scientific_name,
            location: plant.location,
            last_synced_at: plant.last_synced_at,
            main_photo,
            photos,
        }
    }
}

// =============================================================================
// Sync
// =============================================================================

/// Summary returned by the sync trigger. Carries no error text.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncTriggerResponse {
    pub message: String,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
    /// Whether the run was triggered manually
    pub manual: bool,
    /// "success", "partial" or "failed"
    pub status: String,
    pub plants_checked: i32,
    pub photos_added: i32,
    /// Number of errors recorded in the run log
    pub error_count: usize,
    pub duration_ms: i64,
    pub synced_at: DateTime<Utc>,
    /// False if the run log could not be written
    pub log_persisted: bool,
}

impl SyncTriggerResponse {
    pub fn from_result(result: &SyncResult, manual: bool, timestamp: DateTime<Utc>) -> Self {
        let log = &result.log;
        let message = if result.is_cancelled() {
            "Plant sync cancelled"
        } else {
            "Plant sync finished"
        };

        Self {
            message: message.to_string(),
            timestamp,
            manual,
            status: log.status.as_str().to_string(),
            plants_checked: log.plants_checked,
            photos_added: log.photos_added,
            error_count: log.errors.len(),
            duration_ms: log.duration_ms,
            synced_at: log.synced_at,
            log_persisted: result.log_persisted,
        }
    }
}

/// One error entry of a run.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<SyncError> for SyncErrorDto {
    fn from(e: SyncError) -> Self {
        Self {
            plant_id: e.plant_id,
            message: e.message,
            timestamp: e.timestamp,
        }
    }
}

/// A persisted run log.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogDto {
    pub id: Uuid,
    pub synced_at: DateTime<Utc>,
    pub status: String,
    pub plants_checked: i32,
    pub photos_added: i32,
    pub duration_ms: i64,
    pub errors: Vec<SyncErrorDto>,
}

impl From<SyncLog> for SyncLogDto {
    fn from(log: SyncLog) -> Self {
        Self {
            id: log.id,
            synced_at: log.synced_at,
            status: log.status.as_str().to_string(),
            plants_checked: log.plants_checked,
            photos_added: log.photos_added,
            duration_ms: log.duration_ms,
            errors: log.errors.into_iter().map(SyncErrorDto::from).collect(),
        }
    }
}

/// Recent sync runs, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncLogsResponse {
    pub count: usize,
    pub logs: Vec<SyncLogDto>,
}
