//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the collaborator traits for testing
//! `SyncService` in isolation.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use plantfolio_core::traits::{PhotoStorage, PlantSource, PlantStore, SyncLogStore, TokenStore};
use plantfolio_core::{
    AccessToken, AppError, CircuitBreakerConfig, DownloadedPhoto, ExternalPlantRecord, NewPhoto,
    NewPlant, Photo, PhotoInsert, Plant, PlantPage, RetryConfig, SyncConfig, SyncLog, SyncService,
    Token, TokenPair,
};
use uuid::Uuid;

pub type TestService =
    SyncService<MockTokenStore, MockPlantStore, MockSyncLogStore, MockPlantSource, MockPhotoStorage>;

/// Fixed timestamps on day `day` of June 2024.
pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap()
}

/// A source record with a photo URL derived from its id.
pub fn record(id: &str, photo_updated_at: Option<DateTime<Utc>>) -> ExternalPlantRecord {
    ExternalPlantRecord {
        id: id.to_string(),
        custom_name: None,
        common_name: Some(format!("Common {}", id)),
        scientific_name: Some(format!("Plantae {}", id)),
        location: Some("Living room".to_string()),
        photo_url: Some(photo_url(id)),
        photo_updated_at,
    }
}

pub fn photo_url(id: &str) -> String {
    format!("https://cdn.planta.example/{}.jpg", id)
}

/// A stored plant whose last archived photo is from `image_updated_at`.
pub fn stored_plant(id: &str, image_updated_at: Option<DateTime<Utc>>) -> Plant {
    Plant {
        id: id.to_string(),
        custom_name: None,
        common_name: Some(format!("Common {}", id)),
        scientific_name: Some(format!("Plantae {}", id)),
        location: Some("Living room".to_string()),
        external_image_updated_at: image_updated_at,
        last_synced_at: Some(ts(1)),
    }
}

/// Config with no backoff delays so retries do not slow the tests.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_concurrency(4)
        .with_retry(RetryConfig {
            max_retries: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        })
}

pub struct Harness {
    pub tokens: MockTokenStore,
    pub store: MockPlantStore,
    pub logs: MockSyncLogStore,
    pub source: MockPlantSource,
    pub storage: MockPhotoStorage,
}

impl Harness {
    /// A valid token, an empty store and a source serving `pages`.
    pub fn new(pages: Vec<Vec<ExternalPlantRecord>>) -> Self {
        Self {
            tokens: MockTokenStore::valid(),
            store: MockPlantStore::new(),
            logs: MockSyncLogStore::new(),
            source: MockPlantSource::new(pages),
            storage: MockPhotoStorage::new(),
        }
    }

    pub fn service(&self, config: SyncConfig) -> TestService {
        SyncService::with_config(
            self.tokens.clone(),
            self.store.clone(),
            self.logs.clone(),
            self.source.clone(),
            self.storage.clone(),
            config,
        )
    }
}

// =============================================================================
// MockTokenStore
// =============================================================================

#[derive(Clone, Default)]
pub struct MockTokenStore {
    pub token: Arc<Mutex<Option<Token>>>,
    pub loads: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
}

impl MockTokenStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn valid() -> Self {
        Self::expiring_in(chrono::Duration::hours(1))
    }

    pub fn expired() -> Self {
        Self::expiring_in(-chrono::Duration::minutes(10))
    }

    pub fn expiring_in(delta: chrono::Duration) -> Self {
        let store = Self::default();
        *store.token.lock().unwrap() = Some(Token {
            id: 1,
            access_token: "stored-access".to_string(),
            refresh_token: "stored-refresh".to_string(),
            expires_at: Utc::now() + delta,
            updated_at: Utc::now(),
        });
        store
    }

    pub fn current(&self) -> Option<Token> {
        self.token.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst) + self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for MockTokenStore {
    async fn load_token(&self) -> Result<Option<Token>, AppError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.current())
    }

    async fn save_token(&self, pair: &TokenPair) -> Result<Token, AppError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let token = Token {
            id: 1,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            expires_at: pair.expires_at,
            updated_at: Utc::now(),
        };
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(token)
    }
}

// =============================================================================
// MockPlantSource
// =============================================================================

/// Serves fixed pages with cursors `page-1`, `page-2`, ...
#[derive(Clone)]
pub struct MockPlantSource {
    pages: Arc<Vec<Vec<ExternalPlantRecord>>>,
    pub failing_urls: Arc<Mutex<HashSet<String>>>,
    pub reject_refresh: Arc<AtomicBool>,
    pub reject_listing: Arc<AtomicBool>,
    pub repeat_cursor: Arc<AtomicBool>,
    /// Listing calls that fail with `SourceUnavailable` before succeeding.
    pub transient_listing_failures: Arc<AtomicUsize>,
    pub download_delay: Arc<Mutex<Duration>>,
    pub refreshes: Arc<AtomicUsize>,
    pub page_fetches: Arc<AtomicUsize>,
    pub downloads: Arc<AtomicUsize>,
    pub tokens_seen: Arc<Mutex<Vec<String>>>,
}

impl MockPlantSource {
    pub fn new(pages: Vec<Vec<ExternalPlantRecord>>) -> Self {
        Self {
            pages: Arc::new(pages),
            failing_urls: Arc::new(Mutex::new(HashSet::new())),
            reject_refresh: Arc::new(AtomicBool::new(false)),
            reject_listing: Arc::new(AtomicBool::new(false)),
            repeat_cursor: Arc::new(AtomicBool::new(false)),
            transient_listing_failures: Arc::new(AtomicUsize::new(0)),
            download_delay: Arc::new(Mutex::new(Duration::ZERO)),
            refreshes: Arc::new(AtomicUsize::new(0)),
            page_fetches: Arc::new(AtomicUsize::new(0)),
            downloads: Arc::new(AtomicUsize::new(0)),
            tokens_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_download(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn set_download_delay(&self, delay: Duration) {
        *self.download_delay.lock().unwrap() = delay;
    }

    pub fn total_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
            + self.page_fetches.load(Ordering::SeqCst)
            + self.downloads.load(Ordering::SeqCst)
    }
}

impl PlantSource for MockPlantSource {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(AppError::AuthError("refresh token revoked".to_string()));
        }
        Ok(TokenPair {
            access_token: format!("refreshed-from-{}", refresh_token),
            refresh_token: "rotated-refresh".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }

    async fn fetch_plants_page(
        &self,
        token: &AccessToken,
        cursor: Option<&str>,
    ) -> Result<PlantPage, AppError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen
            .lock()
            .unwrap()
            .push(token.as_str().to_string());

        if self.reject_listing.load(Ordering::SeqCst) {
            return Err(AppError::SourceAuthError { status: 401 });
        }
        let remaining = self.transient_listing_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_listing_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::SourceUnavailable("HTTP 503".to_string()));
        }

        let index = match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| AppError::SourceUnavailable(format!("bad cursor {}", c)))?,
        };
        let records = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if self.repeat_cursor.load(Ordering::SeqCst) {
            Some("page-1".to_string())
        } else if index + 1 < self.pages.len() {
            Some(format!("page-{}", index + 1))
        } else {
            None
        };

        Ok(PlantPage {
            records,
            next_cursor,
        })
    }

    async fn download_photo(&self, url: &str) -> Result<DownloadedPhoto, AppError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.download_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(AppError::DownloadError(format!("HTTP 404 for {}", url)));
        }
        Ok(DownloadedPhoto {
            bytes: Bytes::from(format!("bytes of {}", url)),
            content_type: "image/jpeg".to_string(),
        })
    }
}

// =============================================================================
// MockPhotoStorage
// =============================================================================

#[derive(Clone, Default)]
pub struct MockPhotoStorage {
    pub objects: Arc<Mutex<HashMap<String, Bytes>>>,
    pub fail: Arc<AtomicBool>,
}

impl MockPhotoStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

impl PhotoStorage for MockPhotoStorage {
    async fn put_photo(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::StorageWriteError("bucket unavailable".to_string()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://photos.plantfolio.example/{}", key)
    }
}

// =============================================================================
// MockPlantStore
// =============================================================================

/// In-memory plant store with the upsert semantics of the SQL repository.
#[derive(Clone, Default)]
pub struct MockPlantStore {
    pub plants: Arc<Mutex<HashMap<String, Plant>>>,
    pub photos: Arc<Mutex<Vec<Photo>>>,
    pub fail_writes: Arc<AtomicBool>,
    pub failing_ids: Arc<Mutex<HashSet<String>>>,
    pub writes: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
}

impl MockPlantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plants(plants: Vec<Plant>) -> Self {
        let store = Self::default();
        {
            let mut map = store.plants.lock().unwrap();
            for plant in plants {
                map.insert(plant.id.clone(), plant);
            }
        }
        store
    }

    pub fn get(&self, id: &str) -> Option<Plant> {
        self.plants.lock().unwrap().get(id).cloned()
    }

    pub fn plant_count(&self) -> usize {
        self.plants.lock().unwrap().len()
    }

    pub fn photos_for(&self, id: &str) -> Vec<Photo> {
        self.photos
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.plant_id == id)
            .cloned()
            .collect()
    }

    pub fn photo_count(&self) -> usize {
        self.photos.lock().unwrap().len()
    }

    pub fn total_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst) + self.loads.load(Ordering::SeqCst)
    }

    fn check_write(&self, id: &str) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) || self.failing_ids.lock().unwrap().contains(id)
        {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl PlantStore for MockPlantStore {
    async fn load_plants(&self) -> Result<HashMap<String, Plant>, AppError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.plants.lock().unwrap().clone())
    }

    async fn upsert_plant(&self, new: &NewPlant) -> Result<Plant, AppError> {
        self.check_write(&new.id)?;
        let mut plants = self.plants.lock().unwrap();
        let existing = plants.get(&new.id).cloned();

        let custom_name = match existing.as_ref().and_then(|p| p.custom_name.clone()) {
            Some(name) if !name.is_empty() => Some(name),
            _ => new.custom_name.clone(),
        };
        let plant = Plant {
            id: new.id.clone(),
            custom_name,
            common_name: new.common_name.clone(),
            scientific_name: new.scientific_name.clone(),
            location: new.location.clone(),
            external_image_updated_at: new
                .external_image_updated_at
                .or(existing.and_then(|p| p.external_image_updated_at)),
            last_synced_at: Some(Utc::now()),
        };
        plants.insert(plant.id.clone(), plant.clone());
        Ok(plant)
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<PhotoInsert, AppError> {
        self.check_write(&photo.plant_id)?;
        if !self.plants.lock().unwrap().contains_key(&photo.plant_id) {
            return Err(AppError::Generic(format!(
                "photo for unknown plant {}",
                photo.plant_id
            )));
        }
        let mut photos = self.photos.lock().unwrap();
        if let Some(existing) = photos.iter().find(|p| p.url == photo.url) {
            return Ok(if existing.plant_id == photo.plant_id {
                PhotoInsert::AlreadyStored
            } else {
                PhotoInsert::OwnedByOtherPlant
            });
        }
        photos.push(Photo {
            id: Uuid::new_v4(),
            plant_id: photo.plant_id.clone(),
            url: photo.url.clone(),
            date: photo.date,
            source: photo.source,
            created_at: Utc::now(),
        });
        Ok(PhotoInsert::Inserted)
    }
}

// =============================================================================
// MockSyncLogStore
// =============================================================================

#[derive(Clone, Default)]
pub struct MockSyncLogStore {
    pub logs: Arc<Mutex<Vec<SyncLog>>>,
    pub fail: Arc<AtomicBool>,
}

impl MockSyncLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn recorded(&self) -> Vec<SyncLog> {
        self.logs.lock().unwrap().clone()
    }
}

impl SyncLogStore for MockSyncLogStore {
    async fn record_sync_log(&self, log: &SyncLog) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolClosed));
        }
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

/// Breaker config that opens after `threshold` failures and stays open.
pub fn strict_breaker(threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig::default()
        .with_failure_threshold(threshold)
        .with_recovery_timeout(Duration::from_secs(3600))
}
