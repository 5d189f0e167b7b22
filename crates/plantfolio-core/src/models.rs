//! Domain models for plants, photos, credentials and run logs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Name shown for a plant that has no usable name field.
pub const FALLBACK_PLANT_NAME: &str = "Unknown Plant";

/// Resolves the name to show for a plant.
///
/// Priority is custom name, then common name, then scientific name. Empty
/// strings count as absent. The result is never empty.
///
/// # Examples
///
/// ```
/// use plantfolio_core::models::display_name;
///
/// assert_eq!(display_name(Some("Monty"), Some("Monstera"), None), "Monty");
/// assert_eq!(display_name(Some(""), None, Some("Ficus lyrata")), "Ficus lyrata");
/// assert_eq!(display_name(None, None, None), "Unknown Plant");
/// ```
pub fn display_name<'a>(
    custom_name: Option<&'a str>,
    common_name: Option<&'a str>,
    scientific_name: Option<&'a str>,
) -> &'a str {
    [custom_name, common_name, scientific_name]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .unwrap_or(FALLBACK_PLANT_NAME)
}

/// A plant as stored locally.
///
/// The `id` is the plant source's identifier and is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plant {
    pub id: String,
    pub custom_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub location: Option<String>,
    /// Timestamp of the remote photo that was last archived for this plant.
    pub external_image_updated_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Plant {
    /// Returns the gallery display name for this plant.
    pub fn display_name(&self) -> &str {
        display_name(
            self.custom_name.as_deref(),
            self.common_name.as_deref(),
            self.scientific_name.as_deref(),
        )
    }
}

/// Where a photo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoSource {
    /// Archived from the plant source by the sync job.
    External,
    /// Uploaded by hand.
    ManualUpload,
}

impl PhotoSource {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoSource::External => "external",
            PhotoSource::ManualUpload => "manual_upload",
        }
    }
}

impl fmt::Display for PhotoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(PhotoSource::External),
            "manual_upload" => Ok(PhotoSource::ManualUpload),
            _ => Err(AppError::Generic(format!("Unknown photo source: '{}'", s))),
        }
    }
}

/// An archived photo. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    pub plant_id: String,
    /// Public URL in object storage.
    pub url: String,
    /// When the photo was taken or reported by the source.
    pub date: DateTime<Utc>,
    pub source: PhotoSource,
    pub created_at: DateTime<Utc>,
}

/// Returns the photo with the latest `date`, or `None` for an empty slice.
pub fn most_recent_photo(photos: &[Photo]) -> Option<&Photo> {
    photos.iter().max_by_key(|photo| photo.date)
}

/// Sorts photos newest first, the order used by the detail view.
pub fn sort_photos_newest_first(photos: &mut [Photo]) {
    photos.sort_by(|a, b| b.date.cmp(&a.date));
}

/// A plant together with its photo history.
#[derive(Debug, Clone, Serialize)]
pub struct PlantWithPhotos {
    #[serde(flatten)]
    pub plant: Plant,
    pub photos: Vec<Photo>,
}

impl PlantWithPhotos {
    /// Returns the gallery display name for this plant.
    pub fn display_name(&self) -> &str {
        self.plant.display_name()
    }

    /// Returns the main photo shown for this plant.
    pub fn latest_photo(&self) -> Option<&Photo> {
        most_recent_photo(&self.photos)
    }
}

/// Credentials for the plant source, stored as a single row.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Token {
    pub id: i16,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// Returns true if the token must be refreshed before use.
    ///
    /// A token is treated as expired `safety_margin` before its real expiry so
    /// that it cannot lapse mid-request.
    pub fn needs_refresh(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        now >= self.expires_at - safety_margin
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A freshly issued access/refresh pair, as returned by the token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A bearer token that is valid for at least the configured safety margin.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// A plant as reported by the plant source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPlantRecord {
    pub id: String,
    pub custom_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub location: Option<String>,
    pub photo_url: Option<String>,
    pub photo_updated_at: Option<DateTime<Utc>>,
}

impl ExternalPlantRecord {
    /// Returns the display name this record would have once stored.
    pub fn display_name(&self) -> &str {
        display_name(
            self.custom_name.as_deref(),
            self.common_name.as_deref(),
            self.scientific_name.as_deref(),
        )
    }
}

/// One page of the plant listing.
#[derive(Debug, Clone, Default)]
pub struct PlantPage {
    pub records: Vec<ExternalPlantRecord>,
    /// Cursor for the next page; `None` when this was the last page.
    pub next_cursor: Option<String>,
}

/// Input for inserting or updating a plant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlant {
    pub id: String,
    pub custom_name: Option<String>,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    pub location: Option<String>,
    /// Only set after the matching photo was archived; `None` keeps the
    /// stored value.
    pub external_image_updated_at: Option<DateTime<Utc>>,
}

impl NewPlant {
    /// Builds the metadata part of an upsert from a source record.
    pub fn from_record(record: &ExternalPlantRecord) -> Self {
        Self {
            id: record.id.clone(),
            custom_name: record.custom_name.clone(),
            common_name: record.common_name.clone(),
            scientific_name: record.scientific_name.clone(),
            location: record.location.clone(),
            external_image_updated_at: None,
        }
    }

    /// Marks the photo taken at `taken_at` as archived for this plant.
    pub fn with_image_updated_at(mut self, taken_at: DateTime<Utc>) -> Self {
        self.external_image_updated_at = Some(taken_at);
        self
    }
}

/// Input for inserting a photo row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub plant_id: String,
    pub url: String,
    pub date: DateTime<Utc>,
    pub source: PhotoSource,
}

/// What happened to a photo row on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoInsert {
    Inserted,
    /// The URL was already stored for the same plant.
    AlreadyStored,
    /// The URL belongs to a photo of a different plant.
    OwnedByOtherPlant,
}

/// Raw photo bytes fetched from the plant source's image host.
#[derive(Debug, Clone)]
pub struct DownloadedPhoto {
    pub bytes: bytes::Bytes,
    /// MIME type reported by the host, e.g. `image/jpeg`.
    pub content_type: String,
}

/// Location of a photo written to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhotoRef {
    /// Object key inside the bucket.
    pub key: String,
    /// Public URL the gallery loads the photo from.
    pub url: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    /// No errors.
    Success,
    /// At least one plant succeeded and at least one error was recorded.
    Partial,
    /// No plant succeeded.
    Failed,
}

impl SyncLogStatus {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Success => "success",
            SyncLogStatus::Partial => "partial",
            SyncLogStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncLogStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncLogStatus::Success),
            "partial" => Ok(SyncLogStatus::Partial),
            "failed" => Ok(SyncLogStatus::Failed),
            _ => Err(AppError::Generic(format!("Unknown sync status: '{}'", s))),
        }
    }
}

/// One error entry of a run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    /// The plant the error belongs to; `None` for run-level errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SyncError {
    /// Creates an error entry for a single plant.
    pub fn for_plant(plant_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plant_id: Some(plant_id.into()),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an error entry that is not tied to a plant.
    pub fn run_level(message: impl Into<String>) -> Self {
        Self {
            plant_id: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The persisted record of one run. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub synced_at: DateTime<Utc>,
    pub status: SyncLogStatus,
    pub plants_checked: i32,
    pub photos_added: i32,
    pub errors: Vec<SyncError>,
    pub duration_ms: i64,
}
