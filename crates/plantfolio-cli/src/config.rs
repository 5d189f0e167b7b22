use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;

use plantfolio_client::S3Config;
use plantfolio_core::PlantaConfig;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    // Use VERGEN_GIT_SHA for the commit hash (with safe slicing)
    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"); // YYYY-MM-DD
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "plantfolio")]
#[command(
    author,
    version = version_info(),
    about = "Mirror a Planta plant collection into the Plantfolio gallery"
)]
#[command(after_help = "Examples:
  plantfolio migrate
  plantfolio token import --access-token <A> --refresh-token <R> --expires-at 2024-06-01T12:00:00Z
  plantfolio sync --deadline-secs 240
  plantfolio logs --limit 5")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Path to sync.toml (defaults to ~/.config/plantfolio/sync.toml)
    #[arg(long, env = "SYNC_CONFIG", global = true)]
    pub sync_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync against Planta and print the run summary
    #[command(after_help = "Example: plantfolio sync --deadline-secs 240 --concurrency 4")]
    Sync {
        /// Stop starting new plants after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline_secs: Option<u64>,

        /// Number of plants reconciled concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        planta: PlantaArgs,

        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Manage the stored Planta token pair
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
    /// List recent sync runs with their errors
    Logs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },
    /// Apply database migrations
    Migrate,
}

/// Token subcommands
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store a token pair obtained from the Planta app, replacing any existing one
    Import {
        #[arg(long, env = "PLANTA_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long, env = "PLANTA_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,

        /// Access token expiry, RFC 3339 (e.g. 2024-06-01T12:00:00Z)
        #[arg(long)]
        expires_at: DateTime<Utc>,
    },
    /// Show when the stored access token expires
    Status,
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
    /// Layers the flags over `base`.
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
    #[arg(long, env = "STORAGE_BUCKET", default_value = "plant-photos")]
    pub storage_bucket: String,

    #[arg(long, env = "STORAGE_REGION", default_value = "us-east-1")]
    pub storage_region: String,

    /// S3-compatible endpoint (Supabase Storage, MinIO)
    #[arg(long, env = "STORAGE_ENDPOINT")]
    pub storage_endpoint: Option<String>,

    #[arg(long, env = "STORAGE_ACCESS_KEY_ID", hide_env_values = true)]
    pub storage_access_key_id: Option<String>,

    #[arg(long, env = "STORAGE_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub storage_secret_access_key: Option<String>,

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
