//! Path resolution module for rankeval
//!
//! Provides utilities for resolving file paths with support for:
//! - Absolute paths (returned as-is)
//! - Tilde (~) and environment variable expansion
//! - Relative paths (resolved from current directory)
//! - Platform config directories
//! - Per-dataset report directories

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Expand `~` and `$VARS` in a path
pub fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", path, e))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Resolve a path to an absolute path
///
/// Resolution order:
/// 1. Expand ~ and environment variables
/// 2. If absolute, return as-is
/// 3. If relative, resolve from current directory
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = expand(path)?;

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        let current_dir = std::env::current_dir()
            .map_err(|e| anyhow!("Failed to get current directory: {}", e))?;
        Ok(current_dir.join(expanded))
    }
}

/// Get the config directory for rankeval
///
/// Returns the platform config dir (e.g. ~/.config/rankeval), falling back to
/// `.config/rankeval` when no home directory is known.
pub fn get_config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config).join("rankeval");
    }
    ProjectDirs::from("", "", "rankeval")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".config").join("rankeval"))
}

/// Get the default config file path
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Report directory for a dataset: `{reports_base}/{name}_{hash8}`
///
/// `hash8` is the first 8 hex characters of the SHA-256 of the absolute data
/// directory path, so datasets with the same directory name do not collide.
pub fn report_dir(reports_base: &Path, data_dir: &Path) -> PathBuf {
    let absolute = data_dir
        .canonicalize()
        .unwrap_or_else(|_| match std::env::current_dir() {
            Ok(cwd) if data_dir.is_relative() => cwd.join(data_dir),
            _ => data_dir.to_path_buf(),
        });

    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let slug = &hex::encode(digest)[..8];

    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "data".to_string());

    reports_base.join(format!("{}_{}", name, slug))
}
