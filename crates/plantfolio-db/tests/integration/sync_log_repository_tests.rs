//! Integration tests for SyncLogRepository.

use chrono::Duration;
use plantfolio_core::models::{SyncError, SyncLog, SyncLogStatus};
use plantfolio_db::SyncLogRepository;
use uuid::Uuid;

use crate::integration::common::{at, setup_test_db};

fn log(day: u32, status: SyncLogStatus, errors: Vec<SyncError>) -> SyncLog {
    SyncLog {
        id: Uuid::new_v4(),
        synced_at: at(day),
        status,
        plants_checked: 4,
        photos_added: 2,
        errors,
        duration_ms: 1534,
    }
}

#[tokio::test]
async fn test_insert_and_list_preserves_errors() {
    let (pool, _container) = setup_test_db().await;
    let repo = SyncLogRepository::new(pool);
    let errors = vec![
        SyncError::for_plant("p2", "Photo download failed: HTTP 404"),
        SyncError::run_level("run cancelled: 1 of 5 plants not started"),
    ];
    let original = log(1, SyncLogStatus::Partial, errors);

    repo.insert(&original).await.unwrap();
    let listed = repo.list_recent(10).await.unwrap();

    assert_eq!(listed.len(), 1);
    let stored = &listed[0];
    assert_eq!(stored.id, original.id);
    assert_eq!(stored.status, SyncLogStatus::Partial);
    assert_eq!(stored.plants_checked, 4);
    assert_eq!(stored.photos_added, 2);
    assert_eq!(stored.duration_ms, 1534);
    assert_eq!(stored.errors.len(), 2);
    assert_eq!(stored.errors[0].plant_id.as_deref(), Some("p2"));
    assert_eq!(stored.errors[1].plant_id, None);
    assert_eq!(stored.errors[0].message, original.errors[0].message);
}

#[tokio::test]
async fn test_list_recent_is_newest_first_and_limited() {
    let (pool, _container) = setup_test_db().await;
    let repo = SyncLogRepository::new(pool);
    for day in [3, 1, 7, 5] {
        repo.insert(&log(day, SyncLogStatus::Success, vec![]))
            .await
            .unwrap();
    }

    let listed = repo.list_recent(3).await.unwrap();

    let days: Vec<_> = listed.iter().map(|l| l.synced_at).collect();
    assert_eq!(days, vec![at(7), at(5), at(3)]);
}

#[tokio::test]
async fn test_non_positive_limit_returns_one_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = SyncLogRepository::new(pool);
    repo.insert(&log(1, SyncLogStatus::Failed, vec![])).await.unwrap();
    repo.insert(&log(2, SyncLogStatus::Failed, vec![])).await.unwrap();

    assert_eq!(repo.list_recent(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let (pool, _container) = setup_test_db().await;
    let repo = SyncLogRepository::new(pool);
    let entry = log(1, SyncLogStatus::Success, vec![]);
    repo.insert(&entry).await.unwrap();

    let mut again = entry.clone();
    again.synced_at = entry.synced_at + Duration::minutes(1);

    assert!(repo.insert(&again).await.is_err());
}
