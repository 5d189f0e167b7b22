//! Copies remote plant photos into object storage.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AppError;
use crate::models::StoredPhotoRef;
use crate::traits::{PhotoStorage, PlantSource};

/// Builds the storage key for a photo of `plant_id` taken at `taken_at`.
///
/// The same plant and timestamp always map to the same key, so a retried
/// archive overwrites its own object instead of creating a duplicate.
/// Distinct plant ids never share a key prefix.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use plantfolio_core::archive::photo_storage_key;
///
/// let taken = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
/// assert_eq!(
///     photo_storage_key("abc-12", taken, "image/png"),
///     "plants/abc-12/20240309T140500.000Z.png"
/// );
/// assert_eq!(
///     photo_storage_key("abc/12", taken, "image/png"),
///     "plants/abc_12~ad2a932216c39b49/20240309T140500.000Z.png"
/// );
/// ```
pub fn photo_storage_key(plant_id: &str, taken_at: DateTime<Utc>, content_type: &str) -> String {
    format!(
        "plants/{}/{}.{}",
        plant_key_segment(plant_id),
        taken_at.format("%Y%m%dT%H%M%S%.3fZ"),
        extension_for(content_type)
    )
}

/// Key-safe form of a plant id.
///
/// Ids made only of `[A-Za-z0-9_-]` are used as-is. Any other id has its
/// unsafe characters replaced with `_` and gets `~` plus the first 16 hex
/// digits of its SHA-256. `~` never survives sanitizing, so the two forms
/// cannot collide.
fn plant_key_segment(plant_id: &str) -> String {
    let cleaned: String = plant_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !cleaned.is_empty() && cleaned == plant_id {
        return cleaned;
    }

    let digest = format!("{:x}", Sha256::digest(plant_id.as_bytes()));
    format!("{}~{}", cleaned, &digest[..16])
}

/// File extension for an image MIME type; `jpg` when unknown.
pub fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/avif" => "avif",
        _ => "jpg",
    }
}

/// Downloads a photo from the plant source and writes it to object storage.
#[derive(Clone)]
pub struct PhotoArchiver<C: PlantSource, P: PhotoStorage> {
    source: C,
    storage: P,
    download_timeout: Duration,
    upload_timeout: Duration,
}

impl<C: PlantSource, P: PhotoStorage> PhotoArchiver<C, P> {
    pub fn new(source: C, storage: P, download_timeout: Duration, upload_timeout: Duration) -> Self {
        Self {
            source,
            storage,
            download_timeout,
            upload_timeout,
        }
    }

    /// Archives `remote_url` for `plant_id` and returns where it was stored.
    ///
    /// # Errors
    ///
    /// - [`AppError::DownloadError`] if the download failed or exceeded the
    ///   download timeout.
    /// - [`AppError::StorageWriteError`] if the upload failed or exceeded the
    ///   upload timeout.
    pub async fn archive(
        &self,
        remote_url: &str,
        plant_id: &str,
        taken_at: DateTime<Utc>,
    ) -> Result<StoredPhotoRef, AppError> {
        let photo = tokio::time::timeout(self.download_timeout, self.source.download_photo(remote_url))
            .await
            .map_err(|_| {
                AppError::DownloadError(format!(
                    "timed out after {}s",
                    self.download_timeout.as_secs()
                ))
            })?
            .map_err(|e| match e {
                AppError::DownloadError(_) => e,
                other => AppError::DownloadError(other.to_string()),
            })?;

        if photo.bytes.is_empty() {
            return Err(AppError::DownloadError("empty response body".to_string()));
        }

        let key = photo_storage_key(plant_id, taken_at, &photo.content_type);
        let size = photo.bytes.len();

        tokio::time::timeout(
            self.upload_timeout,
            self.storage.put_photo(&key, photo.bytes, &photo.content_type),
        )
        .await
        .map_err(|_| {
            AppError::StorageWriteError(format!(
                "timed out after {}s",
                self.upload_timeout.as_secs()
            ))
        })?
        .map_err(|e| match e {
            AppError::StorageWriteError(_) => e,
            other => AppError::StorageWriteError(other.to_string()),
        })?;

        debug!(plant_id, %key, size, "Photo archived");

        Ok(StoredPhotoRef {
            url: self.storage.public_url(&key),
            key,
        })
    }
}
