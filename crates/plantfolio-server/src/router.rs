//! Router configuration and route composition.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{Router, middleware, routing::get};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::require_cron_secret;
use crate::handlers::{health, plants, sync};
use crate::openapi::ApiDoc;
use crate::state::{AppState, GalleryBackend};

/// Creates the main application router with all routes and middleware.
///
/// `cors_origins` is either `"*"` or a comma-separated list of origins.
pub fn create_router<B: GalleryBackend>(state: AppState<B>, cors_origins: &str) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check::<B>))
        .route("/plants", get(plants::list_plants::<B>))
        .route("/plants/:id", get(plants::get_plant::<B>));

    // Protected routes (require Bearer CRON_SECRET)
    let protected_routes = Router::new()
        .route("/sync-logs", get(sync::list_sync_logs::<B>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_cron_secret::<B>,
        ));

    let trigger_route = Router::new()
        .route("/api/sync-plants", get(sync::trigger_sync::<B>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_cron_secret::<B>,
        ));

    let api_routes = public_routes.merge(protected_routes);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(trigger_route)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware layers (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}

/// Build CORS layer from configuration.
///
/// If `origins` is "*", allows any origin (for development).
/// Otherwise, parses comma-separated origins.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(allowed)
    }
}
