//! Integration tests for the happy paths of SyncService.

use std::sync::Mutex;
use std::sync::atomic::Ordering;
use std::time::Duration;

use plantfolio_core::{
    AppError, PhotoSource, ProgressReporter, SyncEvent, SyncLogStatus, SyncPhase, SyncStatus,
};

use crate::integration::common::{
    Harness, MockPlantStore, MockTokenStore, record, stored_plant, test_config, ts,
};

/// Three plants fetched, two with photos newer than stored, one unchanged.
#[tokio::test]
async fn test_end_to_end_two_new_photos_one_unchanged() {
    // Arrange
    let mut harness = Harness::new(vec![vec![
        record("p1", Some(ts(10))),
        record("p2", Some(ts(12))),
        record("p3", Some(ts(5))),
    ]]);
    harness.store = MockPlantStore::with_plants(vec![
        stored_plant("p1", Some(ts(3))),
        stored_plant("p2", None),
        stored_plant("p3", Some(ts(5))),
    ]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(result.log.plants_checked, 3);
    assert_eq!(result.log.photos_added, 2);
    assert!(result.log.errors.is_empty());
    assert_eq!(result.status, SyncStatus::Completed);
    assert!(result.log_persisted);

    assert_eq!(harness.store.photo_count(), 2);
    assert_eq!(harness.storage.object_count(), 2);
    assert_eq!(harness.source.downloads.load(Ordering::SeqCst), 2);
    assert!(harness.store.photos_for("p3").is_empty());

    assert_eq!(harness.store.get("p1").unwrap().external_image_updated_at, Some(ts(10)));
    assert_eq!(harness.store.get("p2").unwrap().external_image_updated_at, Some(ts(12)));
    assert_eq!(harness.store.get("p3").unwrap().external_image_updated_at, Some(ts(5)));

    let logs = harness.logs.recorded();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, result.log.id);
}

#[tokio::test]
async fn test_new_plants_are_created_with_photos() {
    // Arrange
    let harness = Harness::new(vec![vec![record("fresh", Some(ts(2)))]]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.photos_added, 1);
    let plant = harness.store.get("fresh").unwrap();
    assert_eq!(plant.common_name.as_deref(), Some("Common fresh"));
    assert_eq!(plant.external_image_updated_at, Some(ts(2)));

    let photos = harness.store.photos_for("fresh");
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].source, PhotoSource::External);
    assert_eq!(photos[0].date, ts(2));
    assert_eq!(
        photos[0].url,
        "https://photos.plantfolio.example/plants/fresh/20240602T090000.000Z.jpg"
    );
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    // Arrange
    let harness = Harness::new(vec![vec![
        record("p1", Some(ts(4))),
        record("p2", Some(ts(6))),
    ]]);
    let service = harness.service(test_config());

    // Act
    let first = service.run().await.unwrap();
    let second = service.run().await.unwrap();

    // Assert
    assert_eq!(first.log.photos_added, 2);
    assert_eq!(second.log.photos_added, 0);
    assert_eq!(second.log.plants_checked, 2);
    assert_eq!(second.log.status, SyncLogStatus::Success);
    assert_eq!(harness.store.plant_count(), 2);
    assert_eq!(harness.store.photo_count(), 2);
    assert_eq!(harness.logs.recorded().len(), 2);
}

#[tokio::test]
async fn test_custom_name_survives_sync() {
    // Arrange
    let mut harness = Harness::new(vec![vec![record("p1", Some(ts(2)))]]);
    let mut renamed = stored_plant("p1", Some(ts(2)));
    renamed.custom_name = Some("Gerald".to_string());
    harness.store = MockPlantStore::with_plants(vec![renamed]);
    let service = harness.service(test_config());

    // Act
    service.run().await.unwrap();

    // Assert
    let plant = harness.store.get("p1").unwrap();
    assert_eq!(plant.custom_name.as_deref(), Some("Gerald"));
    assert_eq!(plant.display_name(), "Gerald");
}

#[tokio::test]
async fn test_record_without_photo_is_checked_without_download() {
    // Arrange
    let mut bare = record("bare", None);
    bare.photo_url = None;
    let harness = Harness::new(vec![vec![bare]]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.plants_checked, 1);
    assert_eq!(result.log.photos_added, 0);
    assert_eq!(harness.source.downloads.load(Ordering::SeqCst), 0);
    assert!(harness.store.get("bare").is_some());
}

#[tokio::test]
async fn test_pages_are_fetched_in_order() {
    // Arrange
    let harness = Harness::new(vec![
        vec![record("a", Some(ts(1))), record("b", Some(ts(1)))],
        vec![record("c", Some(ts(1)))],
        vec![record("d", Some(ts(1)))],
    ]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(harness.source.page_fetches.load(Ordering::SeqCst), 3);
    assert_eq!(result.log.plants_checked, 4);
    assert_eq!(harness.store.plant_count(), 4);
}

#[tokio::test]
async fn test_duplicate_records_across_pages_are_processed_once() {
    // Arrange
    let harness = Harness::new(vec![
        vec![record("a", Some(ts(1)))],
        vec![record("a", Some(ts(1)))],
    ]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.plants_checked, 1);
    assert_eq!(harness.source.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_persisted() {
    // Arrange
    let mut harness = Harness::new(vec![
        vec![record("a", Some(ts(1)))],
        vec![record("b", Some(ts(1)))],
    ]);
    harness.tokens = MockTokenStore::expired();
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(harness.source.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(harness.tokens.saves.load(Ordering::SeqCst), 1);
    let stored = harness.tokens.current().unwrap();
    assert_eq!(stored.refresh_token, "rotated-refresh");

    let seen = harness.source.tokens_seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|t| t == "refreshed-from-stored-refresh"));
}

#[tokio::test]
async fn test_valid_token_is_not_refreshed() {
    // Arrange
    let harness = Harness::new(vec![vec![record("a", Some(ts(1)))]]);
    let service = harness.service(test_config());

    // Act
    service.run().await.unwrap();

    // Assert
    assert_eq!(harness.source.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(harness.tokens.saves.load(Ordering::SeqCst), 0);
    assert_eq!(
        harness.source.tokens_seen.lock().unwrap()[0],
        "stored-access"
    );
}

#[tokio::test]
async fn test_reimported_token_is_used_by_next_run() {
    // Arrange
    let harness = Harness::new(vec![vec![record("a", Some(ts(1)))]]);
    let service = harness.service(test_config());
    service.run().await.unwrap();

    // Act
    harness
        .tokens
        .token
        .lock()
        .unwrap()
        .as_mut()
        .unwrap()
        .access_token = "reimported-access".to_string();
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    let seen = harness.source.tokens_seen.lock().unwrap().clone();
    assert_eq!(seen, vec!["stored-access", "reimported-access"]);
    assert_eq!(harness.source.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ids_that_sanitize_alike_get_separate_photos() {
    // Arrange
    let harness = Harness::new(vec![vec![
        record("plant.1", Some(ts(3))),
        record("plant_1", Some(ts(3))),
    ]]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(result.log.photos_added, 2);
    assert_eq!(harness.storage.object_count(), 2);
    let dotted = harness.store.photos_for("plant.1");
    let underscored = harness.store.photos_for("plant_1");
    assert_eq!(dotted.len(), 1);
    assert_eq!(underscored.len(), 1);
    assert_ne!(dotted[0].url, underscored[0].url);
}

#[tokio::test]
async fn test_transient_listing_failures_are_retried() {
    // Arrange
    let harness = Harness::new(vec![vec![record("a", Some(ts(1)))]]);
    harness
        .source
        .transient_listing_failures
        .store(2, Ordering::SeqCst);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(harness.source.page_fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_overlapping_run_is_rejected() {
    // Arrange
    let harness = Harness::new(vec![vec![record("slow", Some(ts(1)))]]);
    harness.source.set_download_delay(Duration::from_millis(300));
    let service = harness.service(test_config());

    // Act
    let (first, second) = tokio::join!(service.run(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.is_running());
        service.run().await
    });

    // Assert
    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::SyncInProgress)));
    assert_eq!(harness.logs.recorded().len(), 1);
    assert_eq!(harness.source.page_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_phase_returns_to_idle() {
    // Arrange
    let harness = Harness::new(vec![vec![record("a", Some(ts(1)))]]);
    let service = harness.service(test_config());
    assert_eq!(service.current_phase(), SyncPhase::Idle);

    // Act
    service.run().await.unwrap();

    // Assert
    assert_eq!(service.current_phase(), SyncPhase::Idle);
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_empty_collection_is_success() {
    // Arrange
    let harness = Harness::new(vec![vec![]]);
    let service = harness.service(test_config());

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(result.log.plants_checked, 0);
    assert_eq!(harness.logs.recorded().len(), 1);
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        let line = match event {
            SyncEvent::PhaseChanged(phase) => format!("phase:{}", phase),
            SyncEvent::PageFetched { page, .. } => format!("page:{}", page),
            SyncEvent::PlantsFetched { total } => format!("fetched:{}", total),
            SyncEvent::PlantSynced { plant_id, .. } => format!("synced:{}", plant_id),
            SyncEvent::PlantFailed { plant_id, .. } => format!("failed:{}", plant_id),
            SyncEvent::Aborted { .. } => "aborted".to_string(),
            SyncEvent::Completed { log, .. } => format!("completed:{}", log.status),
        };
        self.events.lock().unwrap().push(line);
    }
}

#[tokio::test]
async fn test_progress_events_follow_run_phases() {
    // Arrange
    let harness = Harness::new(vec![
        vec![record("a", Some(ts(1)))],
        vec![record("b", Some(ts(1)))],
    ]);
    let service = harness.service(test_config().with_concurrency(1));
    let reporter = RecordingReporter::default();

    // Act
    service.run_with_progress(&reporter).await.unwrap();

    // Assert
    let events = reporter.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("phase:authenticating"));
    assert!(events.contains(&"page:2".to_string()));
    assert!(events.contains(&"fetched:2".to_string()));
    assert!(events.contains(&"synced:a".to_string()));
    assert!(events.contains(&"synced:b".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("phase:idle"));
    assert!(events.contains(&"completed:success".to_string()));
}
