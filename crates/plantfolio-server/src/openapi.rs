//! OpenAPI documentation configuration.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::{
    HealthResponse, PhotoDto, PlantDetailResponse, PlantListResponse, PlantSummaryDto,
    ServiceStatus, SyncErrorDto, SyncLogDto, SyncLogsQuery, SyncLogsResponse, SyncTriggerQuery,
    SyncTriggerResponse,
};
use crate::error::ErrorResponse;
use crate::handlers::{health, plants, sync};

/// OpenAPI documentation for the Plantfolio API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Plantfolio API",
        version = "1.0.0",
        description = "Photo gallery of a houseplant collection mirrored from Planta.

A scheduled job calls the sync trigger, which pulls the plant collection from
the Planta API, archives new plant photos to object storage and records a run
log. The gallery endpoints are read-only.

## Quick Start

1. Check server health: `GET /api/v1/health`
2. Browse the gallery: `GET /api/v1/plants`
3. Trigger a sync: `GET /api/sync-plants?manual=true` with `Authorization: Bearer <CRON_SECRET>`
"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health::health_check,
        plants::list_plants,
        plants::get_plant,
        sync::trigger_sync,
        sync::list_sync_logs,
    ),
    components(
        schemas(
            // Request types
            SyncTriggerQuery,
            SyncLogsQuery,
            // Response types
            HealthResponse,
            ServiceStatus,
            PhotoDto,
            PlantSummaryDto,
            PlantListResponse,
            PlantDetailResponse,
            SyncTriggerResponse,
            SyncErrorDto,
            SyncLogDto,
            SyncLogsResponse,
            ErrorResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "system", description = "System health"),
        (name = "plants", description = "Plant gallery"),
        (name = "sync", description = "Planta sync trigger and run logs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme used by the protected sync endpoints.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
