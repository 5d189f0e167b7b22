//! Trait definitions for external dependencies.
//!
//! The sync core talks to four collaborators: the plant source (Planta API
//! and its image host), object storage, and the relational store split into
//! token, plant and run-log concerns. Each is a trait here so that
//! [`crate::service::SyncService`] can be driven by in-memory mocks in tests.
//!
//! # Example
//!
//! ```
//! use plantfolio_core::traits::{PlantSource, PlantStore};
//! use plantfolio_core::{AccessToken, AppError};
//!
//! // Count plants reported by the source that are not stored yet.
//! async fn unseen_plants<C, S>(source: &C, store: &S, token: &AccessToken) -> Result<usize, AppError>
//! where
//!     C: PlantSource,
//!     S: PlantStore,
//! {
//!     let known = store.load_plants().await?;
//!     let page = source.fetch_plants_page(token, None).await?;
//!     Ok(page.records.iter().filter(|r| !known.contains_key(&r.id)).count())
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;

use bytes::Bytes;

use crate::models::{
    AccessToken, DownloadedPhoto, NewPhoto, NewPlant, PhotoInsert, Plant, PlantPage, SyncLog,
    Token, TokenPair,
};
use crate::AppError;

/// Client for the external plant source.
pub trait PlantSource: Send + Sync + Clone {
    /// Exchanges a refresh token for a new token pair.
    ///
    /// A rejected refresh token is reported as [`AppError::AuthError`].
    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenPair, AppError>> + Send;

    /// Fetches one page of the plant listing.
    ///
    /// `cursor` is `None` for the first page. HTTP 401/403 is reported as
    /// [`AppError::SourceAuthError`], 429 and 5xx as
    /// [`AppError::SourceUnavailable`].
    fn fetch_plants_page(
        &self,
        token: &AccessToken,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<PlantPage, AppError>> + Send;

    /// Downloads photo bytes from a remote URL.
    fn download_photo(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<DownloadedPhoto, AppError>> + Send;
}

/// Object storage for archived photos.
pub trait PhotoStorage: Send + Sync + Clone {
    /// Writes bytes under `key`, overwriting any existing object.
    fn put_photo(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns the public URL the gallery loads `key` from.
    fn public_url(&self, key: &str) -> String;
}

/// Persistence for the single credentials row.
pub trait TokenStore: Send + Sync + Clone {
    /// Loads the stored token, `None` if it was never imported.
    fn load_token(&self) -> impl Future<Output = Result<Option<Token>, AppError>> + Send;

    /// Replaces the stored token pair.
    fn save_token(&self, pair: &TokenPair) -> impl Future<Output = Result<Token, AppError>> + Send;
}

/// Persistence for plants and their photos.
pub trait PlantStore: Send + Sync + Clone {
    /// Loads every stored plant keyed by id.
    fn load_plants(&self) -> impl Future<Output = Result<HashMap<String, Plant>, AppError>> + Send;

    /// Inserts a plant or updates its metadata.
    ///
    /// An existing non-empty `custom_name` is kept. A `None`
    /// `external_image_updated_at` keeps the stored timestamp.
    fn upsert_plant(&self, plant: &NewPlant)
    -> impl Future<Output = Result<Plant, AppError>> + Send;

    /// Inserts a photo row unless one with the same URL exists.
    fn insert_photo(
        &self,
        photo: &NewPhoto,
    ) -> impl Future<Output = Result<PhotoInsert, AppError>> + Send;
}

/// Append-only persistence for run logs.
pub trait SyncLogStore: Send + Sync + Clone {
    fn record_sync_log(&self, log: &SyncLog) -> impl Future<Output = Result<(), AppError>> + Send;
}
