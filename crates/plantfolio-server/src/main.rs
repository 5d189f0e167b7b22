//! Plantfolio REST API Server
//!
//! This binary starts the Plantfolio API server, exposing the sync trigger
//! and the read-only gallery endpoints.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use plantfolio_client::{PlantaClient, S3Config, S3PhotoStorage};
use plantfolio_core::{DbConfig, HttpConfig, PlantaConfig, SyncConfig, load_sync_settings};

use plantfolio_server::{AppState, LiveBackend, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::parse();

    info!("Connecting to database...");
    let db_config = DbConfig {
        max_connections: config.db_max_connections,
    };
    let pool = plantfolio_db::connect(&config.database_url, &db_config)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");

    // Sync tunables: defaults, then sync.toml, then CLI flags
    let settings = load_sync_settings(config.sync_config.clone())
        .context("Failed to load sync settings")?;
    let mut sync_config = SyncConfig::from_env();
    let mut planta_config = PlantaConfig::default();
    if let Some(settings) = &settings {
        sync_config = sync_config.apply(settings);
        if let Some(planta) = &settings.planta {
            planta_config = planta.clone();
        }
    }
    let planta_config = config.planta.apply(planta_config);

    let planta = PlantaClient::new(planta_config, &HttpConfig::default())
        .context("Failed to initialize Planta client")?;
    let storage = S3PhotoStorage::new(S3Config::from(&config.storage))
        .await
        .context("Failed to initialize photo storage")?;

    if config.cron_secret.is_none() {
        warn!("CRON_SECRET is not set; the sync trigger and log endpoints are disabled");
    }

    let shutdown_token = CancellationToken::new();
    let backend = LiveBackend::new(pool, planta, storage, sync_config);
    let app_state = AppState::new(backend, config.cron_secret.clone(), shutdown_token.clone());

    let app = create_router(app_state, &config.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting Plantfolio API server on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    // Running syncs stop starting new plants and write their log
    shutdown_token.cancel();

    tokio::time::sleep(Duration::from_secs(2)).await;
}
