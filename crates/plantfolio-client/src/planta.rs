//! Planta API client: token exchange, paginated plant listing and photo download.
//!
//! Planta API reference: <https://public.planta-api.com>
//!
//! The client performs exactly one attempt per call. Retries, backoff and
//! token freshness are handled by the sync core.
//!
//! # Examples
//!
//! ```no_run
//! use plantfolio_client::PlantaClient;
//! use plantfolio_core::traits::PlantSource;
//! use plantfolio_core::{AccessToken, HttpConfig, PlantaConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PlantaClient::new(PlantaConfig::default(), &HttpConfig::default())?;
//! let page = client
//!     .fetch_plants_page(&AccessToken::new("access-token"), None)
//!     .await?;
//! println!("{} plants on the first page", page.records.len());
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use plantfolio_core::error::AppError;
use plantfolio_core::models::{
    AccessToken, DownloadedPhoto, ExternalPlantRecord, PlantPage, TokenPair,
};
use plantfolio_core::traits::PlantSource;
use plantfolio_core::{HttpConfig, PlantaConfig};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Content type assumed when the image host sends none.
const DEFAULT_PHOTO_CONTENT_TYPE: &str = "image/jpeg";

/// Response envelope of the plant listing.
///
/// ```json
/// {
///     "data": [ { "id": "...", "names": { ... }, "site": { ... }, "image": { ... } } ],
///     "pagination": { "nextPage": "cursor" }
/// }
/// ```
#[derive(Deserialize, Debug)]
struct PlantsResponse {
    #[serde(default)]
    data: Vec<PlantaPlant>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    next_page: Option<String>,
}

/// Data Transfer Object for one plant in the Planta listing.
///
/// Only the fields Plantfolio stores are modeled; everything else the API
/// returns is ignored.
///
/// # Examples
///
/// ```
/// use plantfolio_client::planta::PlantaPlant;
///
/// let json = r#"{
///     "id": "p-42",
///     "names": { "localizedName": "Monstera", "scientific": "Monstera deliciosa" },
///     "site": { "name": "Bedroom" },
///     "image": { "url": "https://cdn.planta.example/p-42.jpg", "lastUpdated": "2024-05-01T10:00:00Z" }
/// }"#;
///
/// let plant: PlantaPlant = serde_json::from_str(json).unwrap();
/// let record = plant.into_record();
/// assert_eq!(record.id, "p-42");
/// assert_eq!(record.common_name.as_deref(), Some("Monstera"));
/// assert_eq!(record.location.as_deref(), Some("Bedroom"));
/// assert!(record.photo_updated_at.is_some());
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct PlantaPlant {
    pub id: String,
    #[serde(default)]
    pub names: PlantaNames,
    #[serde(default)]
    pub site: Option<PlantaSite>,
    #[serde(default)]
    pub image: Option<PlantaImage>,
}

/// Naming fields of a Planta plant.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlantaNames {
    /// The name the user gave the plant in the Planta app.
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub localized_name: Option<String>,
    #[serde(default)]
    pub scientific: Option<String>,
}

/// The room or site a plant is placed in.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PlantaSite {
    #[serde(default)]
    pub name: Option<String>,
}

/// The plant's current photo.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlantaImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PlantaPlant {
    /// Converts the DTO into the source-agnostic record used by the sync core.
    ///
    /// Blank strings are treated as absent.
    pub fn into_record(self) -> ExternalPlantRecord {
        let image = self.image.unwrap_or_default();
        ExternalPlantRecord {
            id: self.id,
            custom_name: non_blank(self.names.custom),
            common_name: non_blank(self.names.localized_name),
            scientific_name: non_blank(self.names.scientific),
            location: non_blank(self.site.and_then(|site| site.name)),
            photo_url: non_blank(image.url),
            photo_updated_at: image.last_updated,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize, Debug)]
struct RefreshResponse {
    data: RefreshData,
}

/// Token pair returned by the refresh exchange.
///
/// Planta reports either an absolute `expiresAt` or a relative `expiresIn`
/// (seconds); `expiresAt` wins when both are present.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl RefreshData {
    fn into_pair(self, now: DateTime<Utc>) -> Result<TokenPair, AppError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => now + ChronoDuration::seconds(secs),
            (None, None) => {
                return Err(AppError::SourceUnavailable(
                    "token refresh response carries no expiry".to_string(),
                ));
            }
        };
        Ok(TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

/// HTTP client for the Planta public API.
#[derive(Clone)]
pub struct PlantaClient {
    client: Client,
    plants_url: Url,
    refresh_url: Url,
    page_size: Option<u32>,
    max_photo_bytes: u64,
    timeout_secs: u64,
}

impl PlantaClient {
    /// Creates a client for the API described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the base URL and paths do not form
    /// valid URLs, `AppError::Generic` if the HTTP client cannot be built.
    pub fn new(config: PlantaConfig, http: &HttpConfig) -> Result<Self, AppError> {
        let plants_url = endpoint(&config.base_url, &config.plants_path)?;
        let refresh_url = endpoint(&config.base_url, &config.refresh_path)?;

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout)
            .build()
            .map_err(|e| AppError::Generic(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            plants_url,
            refresh_url,
            page_size: config.page_size,
            max_photo_bytes: config.max_photo_bytes,
            timeout_secs: http.timeout.as_secs(),
        })
    }

    /// Builds the listing URL for `cursor`.
    fn page_url(&self, cursor: Option<&str>) -> Url {
        let mut url = self.plants_url.clone();
        if cursor.is_some() || self.page_size.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
            if let Some(limit) = self.page_size {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        url
    }

    /// Maps transport failures of API calls.
    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else {
            AppError::SourceUnavailable(format!("cannot reach Planta API: {}", e))
        }
    }
}

/// Joins the base URL and a path, keeping any path prefix of the base.
fn endpoint(base_url: &str, path: &str) -> Result<Url, AppError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|_| AppError::InvalidUrl(joined))
}

/// Classifies the status of a listing response.
fn check_listing_status(status: StatusCode) -> Result<(), AppError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::SourceAuthError {
            status: status.as_u16(),
        }),
        s => Err(AppError::SourceUnavailable(format!(
            "plant listing returned HTTP {}",
            s.as_u16()
        ))),
    }
}

/// Classifies the status of a token exchange response.
///
/// 429 and 5xx are transient; any other failure means the refresh token was
/// rejected.
fn check_refresh_status(status: StatusCode) -> Result<(), AppError> {
    match status {
        s if s.is_success() => Ok(()),
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => Err(
            AppError::SourceUnavailable(format!("token refresh returned HTTP {}", s.as_u16())),
        ),
        s => Err(AppError::AuthError(format!(
            "refresh token rejected (HTTP {}), re-import tokens",
            s.as_u16()
        ))),
    }
}

/// Rejects a photo whose declared length or received byte count is over `max`.
fn check_photo_size(declared: Option<u64>, received: usize, max: u64) -> Result<(), AppError> {
    let size = declared.unwrap_or(0).max(received as u64);
    if size > max {
        return Err(AppError::DownloadError(format!(
            "photo is {} bytes, limit is {}",
            size, max
        )));
    }
    Ok(())
}

impl PlantSource for PlantaClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let response = self
            .client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        check_refresh_status(response.status())?;

        let body: RefreshResponse = response.json().await.map_err(|e| {
            AppError::SourceUnavailable(format!("malformed token refresh response: {}", e))
        })?;

        debug!("Planta token exchange succeeded");
        body.data.into_pair(Utc::now())
    }

    async fn fetch_plants_page(
        &self,
        token: &AccessToken,
        cursor: Option<&str>,
    ) -> Result<PlantPage, AppError> {
        let url = self.page_url(cursor);
        let response = self
            .client
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        check_listing_status(response.status())?;

        let body: PlantsResponse = response.json().await.map_err(|e| {
            AppError::SourceUnavailable(format!("malformed plant listing: {}", e))
        })?;

        let next_cursor = body
            .pagination
            .and_then(|p| p.next_page)
            .filter(|c| !c.is_empty());
        let records: Vec<ExternalPlantRecord> =
            body.data.into_iter().map(PlantaPlant::into_record).collect();

        debug!(records = records.len(), has_next = next_cursor.is_some(), "Fetched plant page");

        Ok(PlantPage {
            records,
            next_cursor,
        })
    }

    async fn download_photo(&self, url: &str) -> Result<DownloadedPhoto, AppError> {
        let parsed = Url::parse(url).map_err(|_| AppError::InvalidUrl(url.to_string()))?;

        let mut response = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::DownloadError(format!("timed out after {}s", self.timeout_secs))
            } else {
                AppError::DownloadError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::DownloadError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_PHOTO_CONTENT_TYPE.to_string());

        check_photo_size(response.content_length(), 0, self.max_photo_bytes)?;

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::DownloadError(format!("reading body failed: {}", e)))?
        {
            check_photo_size(None, body.len() + chunk.len(), self.max_photo_bytes)?;
            body.extend_from_slice(&chunk);
        }
        let bytes: Bytes = body.freeze();

        Ok(DownloadedPhoto {
            bytes,
            content_type,
        })
    }
}
