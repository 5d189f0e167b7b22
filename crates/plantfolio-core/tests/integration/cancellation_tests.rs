//! Integration tests for cancellation and the run deadline.

use std::sync::atomic::Ordering;
use std::time::Duration;

use plantfolio_core::{SyncLogStatus, SyncStatus};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{Harness, record, test_config, ts};

fn five_plants() -> Vec<Vec<plantfolio_core::ExternalPlantRecord>> {
    vec![vec![
        record("p1", Some(ts(1))),
        record("p2", Some(ts(1))),
        record("p3", Some(ts(1))),
        record("p4", Some(ts(1))),
        record("p5", Some(ts(1))),
    ]]
}

#[tokio::test]
async fn test_cancelled_before_start_still_writes_log() {
    // Arrange
    let harness = Harness::new(five_plants());
    let service = harness.service(test_config());
    let token = CancellationToken::new();
    token.cancel();

    // Act
    let result = service.run_cancellable(token).await.unwrap();

    // Assert
    assert_eq!(result.status, SyncStatus::Cancelled);
    assert_eq!(result.log.status, SyncLogStatus::Failed);
    assert_eq!(result.log.plants_checked, 0);
    assert_eq!(harness.source.page_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(harness.logs.recorded().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_lets_in_flight_plants_finish() {
    // Arrange
    let harness = Harness::new(five_plants());
    harness.source.set_download_delay(Duration::from_millis(100));
    let config = test_config()
        .with_concurrency(1)
        .with_run_deadline(Duration::from_millis(250));
    let service = harness.service(config);

    // Act
    let result = service.run().await.unwrap();

    // Assert
    // p1 and p2 finish before the deadline, p3 is in flight when it fires.
    assert_eq!(result.status, SyncStatus::Cancelled);
    assert_eq!(result.log.status, SyncLogStatus::Partial);
    assert_eq!(result.log.plants_checked, 3);
    assert_eq!(result.log.photos_added, 3);
    assert_eq!(result.stats.skipped, 2);
    assert_eq!(harness.source.downloads.load(Ordering::SeqCst), 3);

    let run_error = result.log.errors.last().unwrap();
    assert_eq!(run_error.plant_id, None);
    assert!(run_error.message.contains("2 of 5 plants not started"));
}

#[tokio::test(start_paused = true)]
async fn test_external_cancellation_mid_run() {
    // Arrange
    let harness = Harness::new(five_plants());
    harness.source.set_download_delay(Duration::from_millis(100));
    let service = harness.service(test_config().with_concurrency(1));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    // Act
    let result = service.run_cancellable(token).await.unwrap();

    // Assert
    assert_eq!(result.status, SyncStatus::Cancelled);
    assert_eq!(result.log.plants_checked, 2);
    assert_eq!(result.stats.skipped, 3);
    assert_eq!(harness.logs.recorded().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_not_reached_completes_normally() {
    // Arrange
    let harness = Harness::new(five_plants());
    harness.source.set_download_delay(Duration::from_millis(10));
    let config = test_config().with_run_deadline(Duration::from_secs(60));
    let service = harness.service(config);

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.status, SyncStatus::Completed);
    assert_eq!(result.log.status, SyncLogStatus::Success);
    assert_eq!(result.log.plants_checked, 5);
}

#[tokio::test]
async fn test_run_lock_released_after_cancellation() {
    // Arrange
    let harness = Harness::new(five_plants());
    let service = harness.service(test_config());
    let token = CancellationToken::new();
    token.cancel();
    service.run_cancellable(token).await.unwrap();

    // Act
    let result = service.run().await.unwrap();

    // Assert
    assert_eq!(result.status, SyncStatus::Completed);
    assert_eq!(result.log.plants_checked, 5);
    assert!(!service.is_running());
}
