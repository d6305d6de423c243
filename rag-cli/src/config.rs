//! Configuration loading for the CLI
//!
//! Search order: an explicit `--config` path, `./rag.toml`, then the
//! platform config directory. A missing file yields defaults, which fail
//! validation until the two required LLM paths are provided.

use anyhow::{Context, Result};
use rag_core::config::Settings;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Candidate config locations when `--config` is not given.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("rag.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("rag-cli").join("config.toml"));
    }
    paths
}

/// Load settings from the given path, or from the default search path.
///
/// # Errors
///
/// Fails when an explicitly named file cannot be read, or when any found
/// file does not parse as the settings schema.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        return Ok(settings);
    }

    for candidate in default_config_paths() {
        if candidate.is_file() {
            let raw = std::fs::read_to_string(&candidate)
                .with_context(|| format!("failed to read config file {}", candidate.display()))?;
            let settings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", candidate.display()))?;
            debug!("Loaded configuration from {}", candidate.display());
            return Ok(settings);
        }
    }

    debug!("No config file found, using defaults");
    Ok(Settings::default())
}
