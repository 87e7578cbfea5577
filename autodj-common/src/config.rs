//! Configuration file discovery

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// File name looked up inside the platform configuration directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "AUTODJ_CONFIG";

/// Configuration file resolution, in priority order:
/// 1. Command-line argument
/// 2. `AUTODJ_CONFIG` environment variable
/// 3. Platform configuration directory (`<config_dir>/autodj/config.toml`), if present
///
/// Returns `Ok(None)` when nothing was given and no platform file exists, in
/// which case callers run on built-in defaults.
pub fn resolve_config_file(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf()).map(Some);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return require_existing(PathBuf::from(path)).map(Some);
        }
    }

    // Priority 3: Platform default (optional)
    Ok(default_config_file().filter(|path| path.exists()))
}

/// Platform configuration file location (whether or not it exists)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autodj").join(CONFIG_FILE_NAME))
}

fn require_existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// Resolve a possibly relative path against the directory holding the config file
///
/// Relative paths in a configuration file are interpreted relative to that
/// file, so a deployment directory can be moved as a unit. Without a config
/// file they stay relative to the working directory.
pub fn resolve_relative(base_file: Option<&Path>, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base_file.and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
        _ => path.to_path_buf(),
    }
}
