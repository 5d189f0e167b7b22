use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use plantfolio_cli::{Command, Config, PlantaArgs, StorageArgs, TokenCommand};
use plantfolio_client::{PlantaClient, S3Config, S3PhotoStorage};
use plantfolio_core::{
    DbConfig, HttpConfig, PlantaConfig, SyncConfig, SyncLog, SyncLogStatus, SyncResult,
    SyncService, SyncSettings, TokenPair, TracingReporter, load_sync_settings,
};
use plantfolio_db::{PlantRepository, SyncLogRepository, TokenRepository};
use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = Config::parse();

    info!("Connecting to database...");
    let pool = plantfolio_db::connect(&config.database_url, &DbConfig::default())
        .await
        .context("Failed to connect to database")?;

    match config.command {
        Command::Sync {
            deadline_secs,
            concurrency,
            planta,
            storage,
        } => {
            let settings = load_sync_settings(config.sync_config)
                .context("Failed to load sync settings")?;
            run_sync(pool, settings, deadline_secs, concurrency, &planta, &storage).await?;
        }
        Command::Token { action } => match action {
            TokenCommand::Import {
                access_token,
                refresh_token,
                expires_at,
            } => {
                let repo = TokenRepository::new(pool);
                let token = repo
                    .upsert(&TokenPair {
                        access_token,
                        refresh_token,
                        expires_at,
                    })
                    .await
                    .context("Failed to store token pair")?;
                info!(expires_at = %token.expires_at, "Token pair imported");
            }
            TokenCommand::Status => {
                show_token_status(&TokenRepository::new(pool)).await?;
            }
        },
        Command::Logs { limit } => {
            let logs = SyncLogRepository::new(pool).list_recent(limit).await?;
            if logs.is_empty() {
                println!("No sync runs recorded yet.");
            }
            for log in &logs {
                print!("{}", format_log(log));
            }
        }
        Command::Migrate => {
            plantfolio_db::run_migrations(&pool)
                .await
                .context("Failed to apply migrations")?;
            info!("Migrations applied");
        }
    }

    Ok(())
}

/// Builds the live sync service and runs it until done or Ctrl+C.
async fn run_sync(
    pool: PgPool,
    settings: Option<SyncSettings>,
    deadline_secs: Option<u64>,
    concurrency: Option<usize>,
    planta_args: &PlantaArgs,
    storage_args: &StorageArgs,
) -> anyhow::Result<()> {
    let mut sync_config = SyncConfig::from_env();
    let mut planta_config = PlantaConfig::default();
    if let Some(settings) = &settings {
        sync_config = sync_config.apply(settings);
        if let Some(planta) = &settings.planta {
            planta_config = planta.clone();
        }
    }
    if let Some(secs) = deadline_secs {
        sync_config = sync_config.with_run_deadline(Duration::from_secs(secs));
    }
    if let Some(n) = concurrency {
        sync_config = sync_config.with_concurrency(n);
    }

    let planta = PlantaClient::new(planta_args.apply(planta_config), &HttpConfig::default())
        .context("Failed to initialize Planta client")?;
    let storage = S3PhotoStorage::new(S3Config::from(storage_args))
        .await
        .context("Failed to initialize photo storage")?;

    let plants = PlantRepository::new(pool.clone());
    let service = SyncService::with_config(
        TokenRepository::new(pool.clone()),
        plants,
        SyncLogRepository::new(pool),
        planta,
        storage,
        sync_config,
    );

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, finishing in-flight plants...");
            ctrl_c_token.cancel();
        }
    });

    let result = service
        .run_with_progress_cancellable(&TracingReporter, cancel)
        .await?;
    print_sync_summary(&result);

    if result.log.status == SyncLogStatus::Failed {
        anyhow::bail!("Sync failed; see the errors above or run `plantfolio logs`");
    }
    Ok(())
}

async fn show_token_status(repo: &TokenRepository) -> anyhow::Result<()> {
    let Some(token) = repo.get().await? else {
        println!("No token stored. Import one with: plantfolio token import");
        return Ok(());
    };

    let remaining = token.expires_at - Utc::now();
    println!("Access token expires at: {}", token.expires_at);
    println!("Last updated:            {}", token.updated_at);
    if remaining <= chrono::Duration::zero() {
        println!("Status:                  expired (will be refreshed on next sync)");
    } else {
        println!(
            "Status:                  valid for {} more minutes",
            remaining.num_minutes()
        );
    }
    Ok(())
}

fn print_sync_summary(result: &SyncResult) {
    let log = &result.log;
    info!("");
    info!("Sync {}: {}", result.status, log.status);
    info!("  Plants checked:      {}", log.plants_checked);
    info!("  Photos added:        {}", log.photos_added);
    info!("  Failed:              {}", result.stats.failed);
    info!("  Skipped:             {}", result.stats.skipped);
    info!("  Duration:            {} ms", log.duration_ms);

    if !log.errors.is_empty() {
        info!("Errors:");
        for e in &log.errors {
            match &e.plant_id {
                Some(id) => error!("  - {}: {}", id, e.message),
                None => error!("  - {}", e.message),
            }
        }
    }
    if !result.log_persisted {
        warn!("The run log could not be written to the database");
    }
}

/// Formats one run log for `plantfolio logs`.
fn format_log(log: &SyncLog) -> String {
    let mut out = format!(
        "{}  {:<8} checked={} added={} errors={} ({} ms)\n",
        log.synced_at.format("%Y-%m-%d %H:%M:%S"),
        log.status.as_str(),
        log.plants_checked,
        log.photos_added,
        log.errors.len(),
        log.duration_ms,
    );
    for e in &log.errors {
        let scope = e.plant_id.as_deref().unwrap_or("run");
        out.push_str(&format!("    [{}] {}\n", scope, e.message));
    }
    out
}
