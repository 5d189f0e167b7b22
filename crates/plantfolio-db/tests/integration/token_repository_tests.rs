//! Integration tests for TokenRepository.

use chrono::{Duration, Utc};
use plantfolio_core::models::TokenPair;
use plantfolio_core::traits::TokenStore;
use plantfolio_db::{TOKEN_ROW_ID, TokenRepository};

use crate::integration::common::setup_test_db;

fn pair(access: &str, refresh: &str) -> TokenPair {
    TokenPair {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

#[tokio::test]
async fn test_get_before_import_is_none() {
    let (pool, _container) = setup_test_db().await;
    let repo = TokenRepository::new(pool);

    assert!(repo.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_overwrites_single_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = TokenRepository::new(pool.clone());

    repo.upsert(&pair("a1", "r1")).await.unwrap();
    let second = repo.upsert(&pair("a2", "r2")).await.unwrap();

    assert_eq!(second.id, TOKEN_ROW_ID);
    assert_eq!(second.access_token, "a2");
    assert_eq!(second.refresh_token, "r2");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn test_token_store_round_trip() {
    let (pool, _container) = setup_test_db().await;
    let repo = TokenRepository::new(pool);
    let saved = repo.save_token(&pair("access", "refresh")).await.unwrap();

    let loaded = repo.load_token().await.unwrap().expect("token should exist");

    assert_eq!(loaded.access_token, "access");
    assert_eq!(
        loaded.expires_at.timestamp_micros(),
        saved.expires_at.timestamp_micros()
    );
}
