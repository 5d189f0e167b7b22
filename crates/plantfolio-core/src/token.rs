//! Access token lifecycle.
//!
//! [`TokenRefresher`] guarantees that every call to the plant source uses a
//! token valid for at least the configured safety margin. Refresh-and-persist
//! runs under an async mutex, so concurrent callers never trigger duplicate
//! exchanges: the first caller refreshes, the rest see the memoized result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::AppError;
use crate::models::{AccessToken, Token};
use crate::retry::{RetryAction, RetryConfig, retry_with_backoff, with_timeout};
use crate::traits::{PlantSource, TokenStore};

/// Loads, refreshes and persists the plant source credentials.
///
/// The loaded token is memoized until [`TokenRefresher::invalidate`] is
/// called. [`crate::SyncService`] invalidates at the start of every run.
#[derive(Clone)]
pub struct TokenRefresher<T: TokenStore, C: PlantSource> {
    store: T,
    source: C,
    safety_margin: chrono::Duration,
    request_timeout: Duration,
    retry: RetryConfig,
    current: Arc<Mutex<Option<Token>>>,
}

impl<T: TokenStore, C: PlantSource> TokenRefresher<T, C> {
    pub fn new(
        store: T,
        source: C,
        safety_margin: Duration,
        request_timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            source,
            safety_margin: chrono::Duration::from_std(safety_margin)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
            request_timeout,
            retry,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns an access token that is valid for at least the safety margin.
    ///
    /// # Errors
    ///
    /// - [`AppError::AuthError`] if no token was ever imported, or the
    ///   provider rejected the refresh token.
    /// - [`AppError::SourceUnavailable`] / [`AppError::Timeout`] if the
    ///   exchange kept failing after retries.
    /// - [`AppError::DatabaseError`] if the new pair could not be persisted.
    pub async fn ensure_valid_token(&self) -> Result<AccessToken, AppError> {
        let mut current = self.current.lock().await;

        let token = match current.take() {
            Some(token) => token,
            None => self.store.load_token().await?.ok_or_else(|| {
                AppError::AuthError(
                    "no token stored; import a token pair before the first sync".to_string(),
                )
            })?,
        };

        if !token.needs_refresh(Utc::now(), self.safety_margin) {
            let access = AccessToken::new(token.access_token.clone());
            *current = Some(token);
            return Ok(access);
        }

        info!(expires_at = %token.expires_at, "Access token expired or expiring, refreshing");

        let refreshed = self.refresh(&token.refresh_token).await?;
        let access = AccessToken::new(refreshed.access_token.clone());
        *current = Some(refreshed);
        Ok(access)
    }

    /// Forgets the memoized token so the next call reloads it from the store.
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, AppError> {
        let pair = retry_with_backoff(&self.retry, RetryAction::for_app_error, || {
            with_timeout(
                self.request_timeout,
                self.source.refresh_token(refresh_token),
            )
        })
        .await
        .map_err(|e| match e {
            AppError::SourceAuthError { status } => {
                AppError::AuthError(format!("refresh token rejected (HTTP {})", status))
            }
            other => other,
        })?;

        // The provider may have rotated the refresh token already; losing the
        // new pair here means a manual re-import.
        let saved = self.store.save_token(&pair).await.map_err(|e| {
            error!(error = %e, "Failed to persist refreshed token pair");
            e
        })?;

        info!(expires_at = %saved.expires_at, "Access token refreshed");
        Ok(saved)
    }
}
