//! Configuration types for Plantfolio components.
//!
//! Defaults are hardcoded here. Binaries override them from CLI flags and
//! environment variables, and [`load_sync_settings`] layers an optional TOML
//! file on top of [`SyncConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::AppError;
use crate::retry::RetryConfig;

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for the plant source and photo downloads.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("plantfolio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Wire details of the Planta API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantaConfig {
    pub base_url: String,
    /// Path of the paginated plant listing.
    pub plants_path: String,
    /// Path of the refresh-token exchange.
    pub refresh_path: String,
    /// Page size requested from the listing; `None` uses the provider default.
    pub page_size: Option<u32>,
    /// Largest photo body accepted, in bytes.
    pub max_photo_bytes: u64,
}

impl Default for PlantaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public.planta-api.com".to_string(),
            plants_path: "/v1/addedPlants".to_string(),
            refresh_path: "/v1/auth/refreshToken".to_string(),
            page_size: None,
            max_photo_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Sync run configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of plants reconciled concurrently.
    pub concurrency: usize,
    /// A token expiring within this margin is refreshed before use.
    pub token_safety_margin: Duration,
    /// Bound on each token exchange and listing page request.
    pub request_timeout: Duration,
    /// Bound on each photo download.
    pub download_timeout: Duration,
    /// Bound on each object storage write.
    pub upload_timeout: Duration,
    /// Bound on each repository call.
    pub db_timeout: Duration,
    /// Backoff for transient plant source failures.
    pub retry: RetryConfig,
    /// Breaker on repository calls; when it opens the run stops.
    pub store_circuit_breaker: CircuitBreakerConfig,
    /// Breaker on photo downloads; when it opens remaining archives are skipped.
    pub download_circuit_breaker: CircuitBreakerConfig,
    /// Overall bound on a run; plants not started in time are skipped.
    pub run_deadline: Option<Duration>,
    /// Upper bound on listing pages per run.
    pub max_pages: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            token_safety_margin: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(30),
            db_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            store_circuit_breaker: CircuitBreakerConfig::default(),
            download_circuit_breaker: CircuitBreakerConfig::default(),
            run_deadline: None,
            max_pages: 1000,
        }
    }
}

impl SyncConfig {
    /// Builds the default config with breaker thresholds taken from
    /// `CB_STORE_*` and `CB_DOWNLOAD_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            store_circuit_breaker: CircuitBreakerConfig::from_env_with_prefix("CB_STORE"),
            download_circuit_breaker: CircuitBreakerConfig::from_env_with_prefix("CB_DOWNLOAD"),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin = margin;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_store_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.store_circuit_breaker = config;
        self
    }

    pub fn with_download_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.download_circuit_breaker = config;
        self
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Applies the values present in a settings file.
    pub fn apply(mut self, settings: &SyncSettings) -> Self {
        if let Some(v) = settings.concurrency {
            self = self.with_concurrency(v);
        }
        if let Some(v) = settings.token_safety_margin_secs {
            self.token_safety_margin = Duration::from_secs(v);
        }
        if let Some(v) = settings.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.download_timeout_secs {
            self.download_timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.upload_timeout_secs {
            self.upload_timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.db_timeout_secs {
            self.db_timeout = Duration::from_secs(v);
        }
        if let Some(v) = settings.max_retries {
            self.retry.max_retries = v;
        }
        if let Some(v) = settings.run_deadline_secs {
            self.run_deadline = Some(Duration::from_secs(v));
        }
        if let Some(v) = settings.max_pages {
            self = self.with_max_pages(v);
        }
        self
    }
}

// =============================================================================
// Settings File (sync.toml)
// =============================================================================

/// Optional overrides read from `sync.toml`.
///
/// # Example
///
/// ```toml
/// concurrency = 4
/// download_timeout_secs = 60
/// run_deadline_secs = 240
///
/// [planta]
/// page_size = 50
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    pub concurrency: Option<usize>,
    pub token_safety_margin_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
    pub db_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub run_deadline_secs: Option<u64>,
    pub max_pages: Option<usize>,
    pub planta: Option<PlantaConfig>,
}

/// Default settings file name.
pub const CONFIG_FILE_NAME: &str = "sync.toml";

/// Returns the default configuration directory path: `~/.config/plantfolio/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("plantfolio"))
}

/// Returns the default settings file path: `~/.config/plantfolio/sync.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Load sync settings from a TOML file.
///
/// # Returns
/// * `Ok(Some(settings))` - file found and parsed
/// * `Ok(None)` - no file at the default path
/// * `Err(e)` - an explicit path is missing, or the file is invalid
pub fn load_sync_settings(path: Option<PathBuf>) -> Result<Option<SyncSettings>, AppError> {
    let explicit = path.is_some();
    let config_path = match path.or_else(default_config_path) {
        Some(p) => p,
        None => return Ok(None),
    };

    if !config_path.exists() {
        if explicit {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        return Ok(None);
    }

    read_settings(&config_path).map(Some)
}

fn read_settings(path: &Path) -> Result<SyncSettings, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let settings: SyncSettings = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!("Invalid TOML in '{}': {}", path.display(), e))
    })?;

    tracing::debug!(path = %path.display(), "Loaded sync settings");
    Ok(settings)
}
