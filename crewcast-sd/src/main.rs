//! Station Director (crewcast-sd) - Main entry point
//!
//! Brings up the database, starts a scheduler for every enabled station,
//! and serves the control API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crewcast_common::{db, EventBus};
use crewcast_sd::api;
use crewcast_sd::db::{settings, stations};
use crewcast_sd::fanout;
use crewcast_sd::lastfm::MetadataClient;
use crewcast_sd::mood::MoodTracker;
use crewcast_sd::registry::SchedulerRegistry;

/// Command-line arguments for crewcast-sd
#[derive(Parser, Debug)]
#[command(name = "crewcast-sd")]
#[command(about = "Station Director for Crewcast")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "CREWCAST_SD_PORT")]
    port: u16,

    /// Root folder holding the database, media store, and station state
    #[arg(short, long, env = "CREWCAST_ROOT_FOLDER")]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewcast_sd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let root = crewcast_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "CREWCAST_ROOT_FOLDER",
    )
    .context("Failed to resolve root folder")?;
    tokio::fs::create_dir_all(&root)
        .await
        .context("Failed to create root folder")?;

    info!("Starting Crewcast Station Director on port {}", args.port);
    info!("Root folder: {}", root.display());

    let pool = db::connect(&root.join("crewcast.db"))
        .await
        .context("Failed to open database")?;
    db::init::init_schema(&pool)
        .await
        .context("Failed to initialize schema")?;
    db::init::seed_defaults(&pool)
        .await
        .context("Failed to seed defaults")?;

    let config = settings::load_scheduler_config(&pool)
        .await
        .context("Failed to load settings")?;

    let bus = EventBus::new();

    // Song-change side effects: mood logging and play-history recording.
    let metadata = MetadataClient::new(config.lastfm_api_key.clone());
    let tracker = MoodTracker::new(pool.clone(), metadata, config.mood_window_secs);
    let _fanout = fanout::spawn(pool.clone(), bus.clone(), tracker);

    let registry = Arc::new(SchedulerRegistry::new(
        pool.clone(),
        bus.clone(),
        config,
        root.clone(),
    ));

    // One scheduler per enabled station; a station that fails to come up
    // must not keep the others down.
    let enabled = stations::enabled(&pool)
        .await
        .context("Failed to list stations")?;
    for station in &enabled {
        match registry.create(station).await {
            Ok(_) => info!("Station {} ({}) scheduled", station.id, station.name),
            Err(e) => error!("Station {} failed to start: {}", station.id, e),
        }
    }
    if enabled.is_empty() {
        warn!("No enabled stations; only the control API is up");
    }

    let app = api::create_router(api::AppState {
        db: pool,
        bus,
        registry: registry.clone(),
        port: args.port,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping all station schedulers");
    registry.stop_all().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
