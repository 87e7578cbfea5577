//! Register the music folder's mp3 files in the `music_library` table

use anyhow::{Context, Result};
use autodj_player::config::{ConfigOverrides, TomlConfig};
use autodj_player::library::populate_library;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "populate-library")]
#[command(about = "Add existing music files to the AutoDJ library index")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "AUTODJ_CONFIG")]
    config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Music folder (overrides config)
    #[arg(short, long)]
    music_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autodj_player=info".into()),
        )
        .init();

    let args = Args::parse();
    let overrides = ConfigOverrides {
        port: None,
        database_path: args.database,
        music_folder: args.music_folder,
    };
    let config =
        TomlConfig::load(args.config.as_deref(), &overrides).context("Failed to load configuration")?;

    let pool = autodj_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    let report = populate_library(&pool, &config.music_folder)
        .await
        .context("Failed to populate library")?;

    info!(
        "Library population complete: found={} added={} skipped={} failed={}",
        report.found, report.added, report.skipped, report.failed
    );

    Ok(())
}
