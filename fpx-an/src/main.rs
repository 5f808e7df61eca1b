//! fpx-an - Fluorescence Analysis microservice
//!
//! **Module Identity:**
//! - Name: fpx-an (Fluorescence Analysis)
//! - Default port: 5760
//!
//! Computes ΔF/F responses around behavioral events for uploaded fiber
//! photometry recordings and serves them through asynchronous jobs.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fpx_an::db::{init_database_pool, SqliteCatalog};
use fpx_an::services::DirectoryKeywordPolicy;
use fpx_an::AppState;
use fpx_common::config::{resolve_root_folder, RootLayout, TomlConfig, ROOT_FOLDER_ENV};
use fpx_common::events::EventBus;

#[derive(Debug, Parser)]
#[command(name = "fpx-an", version, about = "Fluorescence analysis service")]
struct Args {
    /// HTTP port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Root folder holding uploads, job snapshots and the catalog database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("fpx_an=info,tower_http=info"));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    init_tracing(&config)?;

    info!("Starting fpx-an (Fluorescence Analysis) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let layout = RootLayout::new(root_folder);
    info!("Root folder: {}", layout.root().display());

    // Step 2: Create root and uploads directories if missing
    layout
        .ensure_directories()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create the catalog database
    let db_path = layout.database_path();
    info!("Database: {}", db_path.display());
    let pool = init_database_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    info!("Database connection established");

    let event_bus = EventBus::new(config.event_bus_capacity);
    let policy = DirectoryKeywordPolicy::new(config.pairing.annotation_keywords.clone());
    let state = AppState::new(
        layout,
        Arc::new(SqliteCatalog::new(pool)),
        Arc::new(policy),
        event_bus,
    );

    // Terminal jobs past the retention age are dropped periodically
    let registry = Arc::clone(&state.registry);
    let retention = chrono::Duration::hours(config.jobs.retention_hours as i64);
    let sweep_every = Duration::from_secs(config.jobs.cleanup_interval_minutes.max(1) * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            registry.purge_expired(retention).await;
        }
    });

    let app = fpx_an::build_router(state);

    let port = args.port.unwrap_or(config.port);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("fpx-an stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
