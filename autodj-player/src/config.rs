//! Configuration management for autodj-player
//!
//! Two-tier configuration:
//! 1. **TOML Bootstrap**: database path, music folder, listener, external tools
//!    (static, read once at startup)
//! 2. **Database Runtime**: tunables from the `settings` table
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --database, --music-folder)
//! 2. TOML configuration file
//! 3. Database settings table (runtime tunables only)
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use autodj_common::config::{resolve_config_file, resolve_relative};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the shared SQLite database (relative paths resolve against the config file)
    pub database_path: PathBuf,

    /// Folder holding local audio files and receiving downloads
    pub music_folder: PathBuf,

    /// Control surface listen address
    pub bind_address: String,

    /// Control surface port
    pub port: u16,

    pub player: PlayerToolConfig,
    pub download: DownloadConfig,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("dj_requests.db"),
            music_folder: PathBuf::from("Music"),
            bind_address: "127.0.0.1".to_string(),
            port: 8888,
            player: PlayerToolConfig::default(),
            download: DownloadConfig::default(),
            fallback: FallbackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// External player and probe tools
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerToolConfig {
    /// Stream player executable (ffplay-compatible arguments)
    pub command: String,

    /// Duration probe executable (ffprobe-compatible arguments)
    pub probe_command: String,

    /// Output device, forwarded to the player through `AUDIODEV`
    pub audio_device: Option<String>,
}

impl Default for PlayerToolConfig {
    fn default() -> Self {
        Self {
            command: "ffplay".to_string(),
            probe_command: "ffprobe".to_string(),
            audio_device: None,
        }
    }
}

/// Network download fallback for tracks missing from the music folder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub enabled: bool,

    /// Downloader executable (yt-dlp-compatible arguments)
    pub command: String,

    /// Source URL, `{id}` replaced with the track identifier
    pub url_template: String,

    pub timeout_seconds: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "yt-dlp".to_string(),
            url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            timeout_seconds: 300,
        }
    }
}

/// Fallback auto-playlist
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,

    /// Endpoint asked to append entries to `auto_playlist_queue` (POST)
    pub refill_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Command-line overrides applied on top of the TOML file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub music_folder: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Discover the config file (CLI, env, platform dir), load it and apply overrides
    ///
    /// Relative paths in the file are resolved against the file's directory.
    /// Runs on built-in defaults when no file is found.
    pub fn load(cli_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let config_file = resolve_config_file(cli_path)?;

        let mut config = match &config_file {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let mut config = Self::from_file(path)?;
                config.database_path = resolve_relative(Some(path), &config.database_path);
                config.music_folder = resolve_relative(Some(path), &config.music_folder);
                config
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(path) = &overrides.database_path {
            self.database_path = path.clone();
        }
        if let Some(path) = &overrides.music_folder {
            self.music_folder = path.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.player.command.trim().is_empty() {
            return Err(Error::Config("player.command must not be empty".to_string()));
        }
        if self.download.enabled && !self.download.url_template.contains("{id}") {
            return Err(Error::Config(
                "download.url_template must contain an {id} placeholder".to_string(),
            ));
        }
        if self.fallback.enabled && self.fallback.refill_url.is_none() {
            warn!("Fallback playlist enabled without refill_url; refills will not be requested");
        }
        Ok(())
    }
}

// ============================================================================
// Runtime settings
// ============================================================================

pub const DEFAULT_CROSSFADE_SECONDS: f64 = 10.0;
pub const DEFAULT_VOLUME_PERCENT: u8 = 100;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;
pub const DEFAULT_IDLE_POLL_SECONDS: u64 = 5;
pub const DEFAULT_ERROR_BACKOFF_SECONDS: u64 = 5;
pub const DEFAULT_REFILL_COOLDOWN_SECONDS: u64 = 10;
pub const DEFAULT_REFILL_THRESHOLD: i64 = 2;

/// Runtime settings loaded from the database
///
/// Missing values are initialized with built-in defaults and written back so
/// the table always documents the effective configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Overlap window between consecutive tracks
    pub crossfade_seconds: f64,
    /// Volume for the next stream start (0-100)
    pub volume_percent: u8,
    /// Engine polling tick (50-1000 ms)
    pub tick_interval_ms: u64,
    /// Coordinator sleep when nothing is playable
    pub idle_poll_seconds: u64,
    /// Coordinator sleep after a failed iteration
    pub error_backoff_seconds: u64,
    /// Minimum spacing between fallback refill requests (5-30 s)
    pub fallback_refill_cooldown_seconds: u64,
    /// Fallback list length below which a refill is requested
    pub fallback_refill_threshold: i64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            crossfade_seconds: DEFAULT_CROSSFADE_SECONDS,
            volume_percent: DEFAULT_VOLUME_PERCENT,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            idle_poll_seconds: DEFAULT_IDLE_POLL_SECONDS,
            error_backoff_seconds: DEFAULT_ERROR_BACKOFF_SECONDS,
            fallback_refill_cooldown_seconds: DEFAULT_REFILL_COOLDOWN_SECONDS,
            fallback_refill_threshold: DEFAULT_REFILL_THRESHOLD,
        }
    }
}

impl RuntimeSettings {
    /// Load runtime settings from database
    ///
    /// For each setting:
    /// 1. Try to read from database
    /// 2. If missing or unparsable, use built-in default
    /// 3. Write default back to database when missing
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let crossfade_seconds: f64 =
            get_setting(pool, "crossfade_seconds", defaults.crossfade_seconds).await?;
        let volume_percent: u8 =
            get_setting(pool, "volume_percent", defaults.volume_percent).await?;
        let tick_interval_ms: u64 =
            get_setting(pool, "tick_interval_ms", defaults.tick_interval_ms).await?;
        let idle_poll_seconds: u64 =
            get_setting(pool, "idle_poll_seconds", defaults.idle_poll_seconds).await?;
        let error_backoff_seconds: u64 =
            get_setting(pool, "error_backoff_seconds", defaults.error_backoff_seconds).await?;
        let fallback_refill_cooldown_seconds: u64 = get_setting(
            pool,
            "fallback_refill_cooldown_seconds",
            defaults.fallback_refill_cooldown_seconds,
        )
        .await?;
        let fallback_refill_threshold: i64 = get_setting(
            pool,
            "fallback_refill_threshold",
            defaults.fallback_refill_threshold,
        )
        .await?;

        let settings = Self {
            crossfade_seconds,
            volume_percent,
            tick_interval_ms,
            idle_poll_seconds,
            error_backoff_seconds,
            fallback_refill_cooldown_seconds,
            fallback_refill_threshold,
        }
        .clamped();

        info!(
            "Runtime settings: crossfade={}s volume={}% tick={}ms refill_cooldown={}s",
            settings.crossfade_seconds,
            settings.volume_percent,
            settings.tick_interval_ms,
            settings.fallback_refill_cooldown_seconds
        );

        Ok(settings)
    }

    /// Force every value into its allowed range
    pub fn clamped(mut self) -> Self {
        if !self.crossfade_seconds.is_finite() || self.crossfade_seconds < 0.0 {
            warn!(
                "Invalid crossfade_seconds {}, using {}",
                self.crossfade_seconds, DEFAULT_CROSSFADE_SECONDS
            );
            self.crossfade_seconds = DEFAULT_CROSSFADE_SECONDS;
        }
        self.volume_percent = self.volume_percent.min(100);
        self.tick_interval_ms = self.tick_interval_ms.clamp(50, 1000);
        self.fallback_refill_cooldown_seconds = self.fallback_refill_cooldown_seconds.clamp(5, 30);
        self.fallback_refill_threshold = self.fallback_refill_threshold.max(0);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs(self.idle_poll_seconds)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }

    pub fn refill_cooldown(&self) -> Duration {
        Duration::from_secs(self.fallback_refill_cooldown_seconds)
    }
}

/// Read one setting, writing the default back when the key is missing
async fn get_setting<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
{
    let value_opt: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match value_opt {
        Some((Some(value),)) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                warn!(
                    "Setting '{}' has invalid value '{}', using default: {}",
                    key,
                    value,
                    default.to_string()
                );
                Ok(default)
            }
        },
        _ => {
            info!(
                "Setting '{}' not found in database, using default: {}",
                key,
                default.to_string()
            );
            sqlx::query(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
            )
            .bind(key)
            .bind(default.to_string())
            .execute(pool)
            .await?;
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn settings_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        autodj_common::db::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_toml_defaults_for_missing_sections() {
        let config = TomlConfig::from_toml_str("port = 9100\n").unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.database_path, PathBuf::from("dj_requests.db"));
        assert_eq!(config.player.command, "ffplay");
        assert!(config.download.enabled);
        assert!(!config.fallback.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_full_document() {
        let config = TomlConfig::from_toml_str(
            r#"
            database_path = "/srv/dj/requests.db"
            music_folder = "/srv/dj/Music"
            bind_address = "0.0.0.0"
            port = 8080

            [player]
            command = "ffplay"
            audio_device = "hw:1"

            [download]
            enabled = false

            [fallback]
            enabled = true
            refill_url = "http://localhost:5000/api/auto-playlist/refill"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.player.audio_device.as_deref(), Some("hw:1"));
        assert!(!config.download.enabled);
        assert_eq!(
            config.fallback.refill_url.as_deref(),
            Some("http://localhost:5000/api/auto-playlist/refill")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = TomlConfig::default();
        config.apply_overrides(&ConfigOverrides {
            port: Some(7000),
            database_path: Some(PathBuf::from("/tmp/x.db")),
            music_folder: None,
        });
        assert_eq!(config.port, 7000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.music_folder, PathBuf::from("Music"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("autodj.toml");
        std::fs::write(&file, "database_path = \"data/dj.db\"\n").unwrap();

        let config = TomlConfig::load(Some(&file), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.database_path, dir.path().join("data/dj.db"));
        assert_eq!(config.music_folder, dir.path().join("Music"));
    }

    #[test]
    fn test_url_template_requires_placeholder() {
        let config = TomlConfig::from_toml_str(
            "[download]\nenabled = true\nurl_template = \"https://example.com/\"\n",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_runtime_defaults_written_back() {
        let pool = settings_pool().await;

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings, RuntimeSettings::default());

        let stored: String =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'tick_interval_ms'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, "500");
    }

    #[tokio::test]
    async fn test_runtime_values_clamped() {
        let pool = settings_pool().await;
        for (key, value) in [
            ("fallback_refill_cooldown_seconds", "120"),
            ("tick_interval_ms", "5"),
            ("volume_percent", "100"),
            ("crossfade_seconds", "not-a-number"),
        ] {
            sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .unwrap();
        }

        let settings = RuntimeSettings::load(&pool).await.unwrap();
        assert_eq!(settings.fallback_refill_cooldown_seconds, 30);
        assert_eq!(settings.tick_interval_ms, 50);
        assert_eq!(settings.crossfade_seconds, DEFAULT_CROSSFADE_SECONDS);
    }
}
