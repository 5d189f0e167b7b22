//! Repository for the singleton Planta credentials row.

use plantfolio_core::error::AppError;
use plantfolio_core::models::{Token, TokenPair};
use plantfolio_core::traits::TokenStore;
use sqlx::{PgPool, Pool, Postgres};

/// The well-known key of the credentials row.
pub const TOKEN_ROW_ID: i16 = 1;

/// Stores the Planta token pair as a single row with `id = 1`.
#[derive(Clone)]
pub struct TokenRepository {
    pool: Pool<Postgres>,
}

impl TokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the stored token, `None` before the first import.
    pub async fn get(&self) -> Result<Option<Token>, AppError> {
        let result = sqlx::query_as::<_, Token>(
            r#"
            SELECT id, access_token, refresh_token, expires_at, updated_at
            FROM tokens
            WHERE id = $1
            "#,
        )
        .bind(TOKEN_ROW_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(result)
    }

    /// Overwrites the credentials row with `pair`, creating it if needed.
    pub async fn upsert(&self, pair: &TokenPair) -> Result<Token, AppError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            INSERT INTO tokens (id, access_token, refresh_token, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING id, access_token, refresh_token, expires_at, updated_at
            "#,
        )
        .bind(TOKEN_ROW_ID)
        .bind(&pair.access_token)
        .bind(&pair.refresh_token)
        .bind(pair.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(token)
    }
}

impl TokenStore for TokenRepository {
    async fn load_token(&self) -> Result<Option<Token>, AppError> {
        TokenRepository::get(self).await
    }

    async fn save_token(&self, pair: &TokenPair) -> Result<Token, AppError> {
        TokenRepository::upsert(self, pair).await
    }
}
