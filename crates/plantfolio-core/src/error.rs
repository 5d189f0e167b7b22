use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents every failure the sync pipeline and its collaborators
/// can produce. It uses the `thiserror` crate for ergonomic error handling and
/// automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Severity
///
/// Errors fall into three groups that drive the orchestrator's behaviour:
///
/// - **Run-level, fatal**: [`AppError::AuthError`], [`AppError::SourceAuthError`],
///   [`AppError::ConfigError`]. The run is finalized as `failed`.
/// - **Retryable**: [`AppError::SourceUnavailable`], [`AppError::Timeout`].
///   Retried with backoff, fatal once retries are exhausted.
/// - **Per-plant**: [`AppError::DownloadError`], [`AppError::StorageWriteError`],
///   [`AppError::DatabaseError`]. Recorded against the plant, the run continues.
///
/// # Examples
///
/// ```
/// use plantfolio_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable credentials for the plant source.
    ///
    /// Raised when no token row exists or the provider rejects the refresh
    /// token during the exchange.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The plant source could not be reached or answered with a server error.
    #[error("Plant source unavailable: {0}")]
    SourceUnavailable(String),

    /// The plant source rejected the access token (HTTP 401/403).
    #[error("Plant source rejected credentials (HTTP {status})")]
    SourceAuthError {
        /// HTTP status returned by the provider.
        status: u16,
    },

    /// Fetching photo bytes from the remote URL failed.
    #[error("Photo download failed: {0}")]
    DownloadError(String),

    /// Writing photo bytes to object storage failed.
    #[error("Photo storage write failed: {0}")]
    StorageWriteError(String),

    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Plant not found in the database.
    #[error("Plant not found: {0}")]
    PlantNotFound(String),

    /// Another sync run holds the run lock.
    #[error("A sync run is already in progress")]
    SyncInProgress,

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthError(msg) => {
                format!(
                    "Cannot obtain Planta credentials: {}\n   Import a fresh token pair with: plantfolio token import",
                    msg
                )
            }
            AppError::SourceAuthError { status } => {
                format!(
                    "Planta rejected the access token (HTTP {}).\n   Re-authorize and import a fresh token pair with: plantfolio token import",
                    status
                )
            }
            AppError::SourceUnavailable(msg) => {
                format!(
                    "Planta API unavailable: {}\n   The provider may be down. Try again later.",
                    msg
                )
            }
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::StorageWriteError(msg) => {
                format!(
                    "Photo storage write failed: {}\n   Check the STORAGE_* settings and bucket permissions.",
                    msg
                )
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The remote service may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::SyncInProgress => {
                "Another sync is already running. Wait for it to finish.".to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use plantfolio_core::error::AppError;
    ///
    /// let err = AppError::SourceUnavailable("HTTP 503".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::SourceAuthError { status: 401 };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::SourceUnavailable(_) | AppError::Timeout(_))
    }

    /// Returns true if this error aborts a run no matter where it occurs.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::AuthError(_) | AppError::SourceAuthError { .. } | AppError::ConfigError(_)
        )
    }

    /// Returns true if this error should count toward a circuit breaker's
    /// consecutive-failure threshold.
    ///
    /// Repository failures, download failures and timeouts count. Row-level
    /// conditions such as a missing row do not, since they say nothing about
    /// the health of the backend.
    ///
    /// # Examples
    ///
    /// ```
    /// use plantfolio_core::error::AppError;
    ///
    /// let err = AppError::DownloadError("connection reset".to_string());
    /// assert!(err.should_trip_circuit());
    ///
    /// let err = AppError::PlantNotFound("abc".to_string());
    /// assert!(!err.should_trip_circuit());
    /// ```
    pub fn should_trip_circuit(&self) -> bool {
        match self {
            AppError::DatabaseError(e) => !matches!(e, sqlx::Error::RowNotFound),
            AppError::DownloadError(_)
            | AppError::StorageWriteError(_)
            | AppError::SourceUnavailable(_)
            | AppError::Timeout(_) => true,
            _ => false,
        }
    }
}
