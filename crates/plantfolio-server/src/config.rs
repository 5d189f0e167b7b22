use clap::{Args, Parser};
use std::path::PathBuf;

use plantfolio_client::S3Config;
use plantfolio_core::PlantaConfig;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "plantfolio-server")]
#[command(author, version, about = "REST API and sync trigger for the Plantfolio gallery")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "5")]
    pub db_max_connections: u32,

    /// Shared secret expected as `Authorization: Bearer <secret>` on protected routes
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Allowed CORS origins, comma separated, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Path to sync.toml (defaults to ~/.config/plantfolio/sync.toml)
    #[arg(long, env = "SYNC_CONFIG")]
    pub sync_config: Option<PathBuf>,

    #[command(flatten)]
    pub planta: PlantaArgs,

    #[command(flatten)]
    pub storage: StorageArgs,
}

/// Planta API endpoint overrides.
#[derive(Args, Debug, Clone)]
pub struct PlantaArgs {
    /// Base URL of the Planta API
    #[arg(long, env = "PLANTA_BASE_URL")]
    pub planta_base_url: Option<String>,

    /// Page size requested from the plant listing
    #[arg(long, env = "PLANTA_PAGE_SIZE")]
    pub planta_page_size: Option<u32>,
}

impl PlantaArgs {
    /// Layers the flags over `base`, usually the settings file's `[planta]` table.
    pub fn apply(&self, mut base: PlantaConfig) -> PlantaConfig {
        if let Some(url) = &self.planta_base_url {
            base.base_url = url.clone();
        }
        if let Some(size) = self.planta_page_size {
            base.page_size = Some(size);
        }
        base
    }
}

/// Photo bucket settings.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Bucket archived photos are written to
    #[arg(long, env = "STORAGE_BUCKET", default_value = "plant-photos")]
    pub storage_bucket: String,

    /// Bucket region
    #[arg(long, env = "STORAGE_REGION", default_value = "us-east-1")]
    pub storage_region: String,

    /// S3-compatible endpoint (Supabase Storage, MinIO)
    #[arg(long, env = "STORAGE_ENDPOINT")]
    pub storage_endpoint: Option<String>,

    #[arg(long, env = "STORAGE_ACCESS_KEY_ID", hide_env_values = true)]
    pub storage_access_key_id: Option<String>,

    #[arg(long, env = "STORAGE_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub storage_secret_access_key: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "STORAGE_FORCE_PATH_STYLE")]
    pub storage_force_path_style: bool,

    /// Prefix of public photo URLs stored in the gallery
    #[arg(long, env = "STORAGE_PUBLIC_BASE_URL")]
    pub storage_public_base_url: String,
}

impl From<&StorageArgs> for S3Config {
    fn from(args: &StorageArgs) -> Self {
        Self {
            bucket: args.storage_bucket.clone(),
            region: args.storage_region.clone(),
            endpoint: args.storage_endpoint.clone(),
            access_key_id: args.storage_access_key_id.clone(),
            secret_access_key: args.storage_secret_access_key.clone(),
            force_path_style: args.storage_force_path_style,
            public_base_url: args.storage_public_base_url.clone(),
        }
    }
}
