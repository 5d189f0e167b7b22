//! Read-only gallery endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::dto::{PlantDetailResponse, PlantListResponse, PlantSummaryDto};
use crate::error::ApiError;
use crate::state::{AppState, GalleryBackend};

/// List all plants for the gallery.
///
/// Plants are ordered by common name with unnamed plants last, each with
/// its most recent photo.
#[utoipa::path(
    get,
    path = "/api/v1/plants",
    responses(
        (status = 200, description = "Plant gallery", body = PlantListResponse),
        (status = 503, description = "Database unavailable"),
    ),
    tag = "plants"
)]
pub async fn list_plants<B: GalleryBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<PlantListResponse>, ApiError> {
    let plants = state.backend.list_plants().await?;
    let plants: Vec<PlantSummaryDto> = plants.iter().map(PlantSummaryDto::from).collect();

    Ok(Json(PlantListResponse {
        count: plants.len(),
        plants,
    }))
}

/// Get one plant with its full photo history.
#[utoipa::path(
    get,
    path = "/api/v1/plants/{id}",
    params(
        ("id" = String, Path, description = "Planta plant id")
    ),
    responses(
        (status = 200, description = "Plant found", body = PlantDetailResponse),
        (status = 404, description = "Plant not found"),
        (status = 503, description = "Database unavailable"),
    ),
    tag = "plants"
)]
pub async fn get_plant<B: GalleryBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Result<Json<PlantDetailResponse>, ApiError> {
    let plant = state
        .backend
        .get_plant(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Plant not found: {}", id)))?;

    Ok(Json(PlantDetailResponse::from(plant)))
}
