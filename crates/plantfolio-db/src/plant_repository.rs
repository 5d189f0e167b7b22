//! Plant and photo repository for PostgreSQL.
//!
//! Upserts keep a user-set `custom_name` and only advance
//! `external_image_updated_at` when a value is supplied. Photo inserts are
//! keyed on the unique `url`, so archiving the same photo twice never creates
//! a second row.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use plantfolio_core::error::AppError;
use plantfolio_core::models::{
    NewPhoto, NewPlant, Photo, PhotoInsert, PhotoSource, Plant, PlantWithPhotos,
    sort_photos_newest_first,
};
use plantfolio_core::traits::PlantStore;
use sqlx::{PgPool, Pool, Postgres};
use tracing::warn;
use uuid::Uuid;

/// Column list for plant SELECT queries.
const PLANT_COLUMNS: &str = "id, custom_name, common_name, scientific_name, location, external_image_updated_at, last_synced_at";

/// Column list for photo SELECT queries.
const PHOTO_COLUMNS: &str = "id, plant_id, url, date, source, created_at";

/// Repository for plants and their photos.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use plantfolio_db::PlantRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/plantfolio")
///     .await?;
///
/// let repo = PlantRepository::new(pool);
/// let gallery = repo.list_plants_with_photos().await?;
/// println!("{} plants", gallery.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PlantRepository {
    pool: Pool<Postgres>,
}

impl PlantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a plant or updates its metadata, returning the stored row.
    pub async fn upsert(&self, plant: &NewPlant) -> Result<Plant, AppError> {
        let row = sqlx::query_as::<_, Plant>(&format!(
            r#"
            INSERT INTO plants (
                id,
                custom_name,
                common_name,
                scientific_name,
                location,
                external_image_updated_at,
                last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                custom_name = COALESCE(NULLIF(plants.custom_name, ''), EXCLUDED.custom_name),
                common_name = EXCLUDED.common_name,
                scientific_name = EXCLUDED.scientific_name,
                location = EXCLUDED.location,
                external_image_updated_at = COALESCE(
                    EXCLUDED.external_image_updated_at,
                    plants.external_image_updated_at
                ),
                last_synced_at = NOW()
            RETURNING {}
            "#,
            PLANT_COLUMNS
        ))
        .bind(&plant.id)
        .bind(&plant.custom_name)
        .bind(&plant.common_name)
        .bind(&plant.scientific_name)
        .bind(&plant.location)
        .bind(plant.external_image_updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row)
    }

    /// Inserts a photo row unless its URL is already stored, and reports which
    /// plant owns an existing row.
    pub async fn insert_photo(&self, photo: &NewPhoto) -> Result<PhotoInsert, AppError> {
        // The outer SELECT sees the pre-insert snapshot, so `owner` is the
        // existing row's plant when the insert hit the conflict.
        let (inserted, owner): (bool, Option<String>) = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO photos (id, plant_id, url, date, source)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (url) DO NOTHING
                RETURNING plant_id
            )
            SELECT
                EXISTS (SELECT 1 FROM inserted),
                (SELECT plant_id FROM photos WHERE url = $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&photo.plant_id)
        .bind(&photo.url)
        .bind(photo.date)
        .bind(photo.source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        if inserted {
            return Ok(PhotoInsert::Inserted);
        }
        Ok(match owner {
            Some(owner) if owner == photo.plant_id => PhotoInsert::AlreadyStored,
            _ => {
                warn!(
                    plant_id = %photo.plant_id,
                    url = %photo.url,
                    "Photo URL already stored for another plant"
                );
                PhotoInsert::OwnedByOtherPlant
            }
        })
    }

    /// Returns every stored plant keyed by id.
    pub async fn load_all(&self) -> Result<HashMap<String, Plant>, AppError> {
        let rows = sqlx::query_as::<_, Plant>(&format!("SELECT {} FROM plants", PLANT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    /// Retrieves a plant by id.
    pub async fn get(&self, id: &str) -> Result<Option<Plant>, AppError> {
        let result = sqlx::query_as::<_, Plant>(&format!(
            "SELECT {} FROM plants WHERE id = $1",
            PLANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(result)
    }

    /// Returns the photos of a plant, newest first.
    pub async fn photos_for(&self, plant_id: &str) -> Result<Vec<Photo>, AppError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos WHERE plant_id = $1 ORDER BY date DESC, created_at DESC",
            PHOTO_COLUMNS
        ))
        .bind(plant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().filter_map(PhotoRow::into_photo).collect())
    }

    /// Returns one plant with its photos ordered newest first.
    pub async fn get_plant_with_photos(
        &self,
        id: &str,
    ) -> Result<Option<PlantWithPhotos>, AppError> {
        let Some(plant) = self.get(id).await? else {
            return Ok(None);
        };
        let photos = self.photos_for(id).await?;
        Ok(Some(PlantWithPhotos { plant, photos }))
    }

    /// Returns all plants ordered by common name (nulls last, then id), each
    /// with its photos ordered newest first.
    pub async fn list_plants_with_photos(&self) -> Result<Vec<PlantWithPhotos>, AppError> {
        let plants = sqlx::query_as::<_, Plant>(&format!(
            "SELECT {} FROM plants ORDER BY common_name ASC NULLS LAST, id ASC",
            PLANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        let photo_rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos ORDER BY date DESC, created_at DESC",
            PHOTO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        let mut by_plant: HashMap<String, Vec<Photo>> = HashMap::new();
        for photo in photo_rows.into_iter().filter_map(PhotoRow::into_photo) {
            by_plant.entry(photo.plant_id.clone()).or_default().push(photo);
        }

        Ok(plants
            .into_iter()
            .map(|plant| {
                let mut photos = by_plant.remove(&plant.id).unwrap_or_default();
                sort_photos_newest_first(&mut photos);
                PlantWithPhotos { plant, photos }
            })
            .collect())
    }

    /// Checks database connectivity by executing a simple query.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

// =============================================================================
// Helper Types for Database Mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: Uuid,
    plant_id: String,
    url: String,
    date: DateTime<Utc>,
    source: String,
    created_at: DateTime<Utc>,
}

impl PhotoRow {
    /// Converts the row, skipping rows with an unknown source.
    fn into_photo(self) -> Option<Photo> {
        match self.source.parse::<PhotoSource>() {
            Ok(source) => Some(Photo {
                id: self.id,
                plant_id: self.plant_id,
                url: self.url,
                date: self.date,
                source,
                created_at: self.created_at,
            }),
            Err(e) => {
                warn!(photo_id = %self.id, error = %e, "Skipping photo with unknown source");
                None
            }
        }
    }
}

// =============================================================================
// Trait Implementation: PlantStore
// =============================================================================

impl PlantStore for PlantRepository {
    async fn load_plants(&self) -> Result<HashMap<String, Plant>, AppError> {
        PlantRepository::load_all(self).await
    }

    async fn upsert_plant(&self, plant: &NewPlant) -> Result<Plant, AppError> {
        PlantRepository::upsert(self, plant).await
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<PhotoInsert, AppError> {
        PlantRepository::insert_photo(self, photo).await
    }
}
