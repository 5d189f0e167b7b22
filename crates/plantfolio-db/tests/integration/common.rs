//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers
//! with the Plantfolio schema for each test.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use plantfolio_core::models::{NewPhoto, NewPlant, PhotoSource};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Sets up a PostgreSQL container, applies the migrations and returns a
/// connection pool.
///
/// Each call creates a fresh, isolated database container. The container is
/// automatically cleaned up when the returned `ContainerAsync` is dropped.
///
/// # Returns
///
/// A tuple of (PgPool, ContainerAsync) - keep the container alive for the test duration.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once after initdb, so early connections may fail.
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    plantfolio_db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, container)
}

/// A fixed timestamp on day `day` of March 2024.
pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// Creates a sample NewPlant without a photo timestamp.
pub fn sample_new_plant(id: &str) -> NewPlant {
    NewPlant {
        id: id.to_string(),
        custom_name: None,
        common_name: Some(format!("Common {}", id)),
        scientific_name: Some(format!("Plantae {}", id)),
        location: Some("Hallway".to_string()),
        external_image_updated_at: None,
    }
}

/// Creates a sample external photo for `plant_id`.
pub fn sample_photo(plant_id: &str, day: u32) -> NewPhoto {
    NewPhoto {
        plant_id: plant_id.to_string(),
        url: format!("https://photos.example.com/plants/{}/{}.jpg", plant_id, day),
        date: at(day),
        source: PhotoSource::External,
    }
}
