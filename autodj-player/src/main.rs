//! AutoDJ Player (autodj-player) - Main entry point
//!
//! Plays the shared request queue with crossfades and serves the control API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use autodj_player::api::{self, AppContext};
use autodj_player::audio::{self, FfprobeDurationProbe, ProcessOutputDriver};
use autodj_player::config::{ConfigOverrides, RuntimeSettings, TomlConfig};
use autodj_player::playback::{CoordinatorConfig, CrossfadeEngine, QueueCoordinator};
use autodj_player::refill::{HttpRefillClient, RateLimitedRefill};
use autodj_player::source::{ChainResolver, Downloader, LibrarySearch, TrackResolver};
use autodj_player::SharedState;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time allowed for the playback task to stop its streams on shutdown
const PLAYBACK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for autodj-player
#[derive(Parser, Debug)]
#[command(name = "autodj-player")]
#[command(about = "Automated crossfading player for the DJ request queue")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "AUTODJ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "AUTODJ_PORT")]
    port: Option<u16>,

    /// Database path (overrides config)
    #[arg(short, long, env = "AUTODJ_DATABASE")]
    database: Option<PathBuf>,

    /// Music folder (overrides config)
    #[arg(short, long, env = "AUTODJ_MUSIC_FOLDER")]
    music_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let overrides = ConfigOverrides {
        port: args.port,
        database_path: args.database.clone(),
        music_folder: args.music_folder.clone(),
    };
    let config = TomlConfig::load(args.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let default_filter = format!(
        "autodj_player={level},autodj_common={level},tower_http=debug",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AutoDJ Player v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database: {}", config.database_path.display());
    info!("Music folder: {}", config.music_folder.display());

    tokio::fs::create_dir_all(&config.music_folder)
        .await
        .context("Failed to create music folder")?;

    let db_pool = autodj_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let settings = RuntimeSettings::load(&db_pool)
        .await
        .context("Failed to load runtime settings")?;

    let mut tools = vec![
        (config.player.command.as_str(), "-version"),
        (config.player.probe_command.as_str(), "-version"),
    ];
    if config.download.enabled {
        tools.push((config.download.command.as_str(), "--version"));
    }
    audio::check_tools(&tools).await;

    let state = Arc::new(SharedState::new(
        settings.volume_percent,
        settings.crossfade_seconds,
    ));

    // Playback task
    let engine = CrossfadeEngine::new(
        state.clone(),
        Arc::new(ProcessOutputDriver::new(
            config.player.command.clone(),
            config.player.audio_device.clone(),
        )),
        Arc::new(FfprobeDurationProbe::new(config.player.probe_command.clone())),
        settings.tick_interval(),
        settings.crossfade_seconds,
    );

    let mut resolvers: Vec<Box<dyn TrackResolver>> =
        vec![Box::new(LibrarySearch::new(config.music_folder.clone()))];
    if config.download.enabled {
        resolvers.push(Box::new(Downloader::new(
            config.download.command.clone(),
            config.download.url_template.clone(),
            config.music_folder.clone(),
            Duration::from_secs(config.download.timeout_seconds),
        )));
    }

    let refill = match (&config.fallback.refill_url, config.fallback.enabled) {
        (Some(url), true) => Some(RateLimitedRefill::new(
            Arc::new(HttpRefillClient::new(url.clone()).context("Failed to build HTTP client")?),
            settings.refill_cooldown(),
        )),
        _ => None,
    };

    let coordinator = QueueCoordinator::new(
        db_pool.clone(),
        engine,
        Arc::new(ChainResolver::new(resolvers)),
        refill,
        CoordinatorConfig {
            idle_poll: settings.idle_poll(),
            error_backoff: settings.error_backoff(),
            fallback_enabled: config.fallback.enabled,
            refill_threshold: settings.fallback_refill_threshold,
        },
    );
    let playback_task = tokio::spawn(coordinator.run());

    // Build the application router
    let app = api::create_router(AppContext {
        state: state.clone(),
        db_pool,
    });

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Stop playback before the server goes away
            shutdown_state.request_stop();
            match tokio::time::timeout(PLAYBACK_SHUTDOWN_TIMEOUT, playback_task).await {
                Ok(Ok(())) => info!("Playback stopped"),
                Ok(Err(e)) => warn!("Playback task ended abnormally: {}", e),
                Err(_) => warn!("Playback did not stop within {:?}", PLAYBACK_SHUTDOWN_TIMEOUT),
            }
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
