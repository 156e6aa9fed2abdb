//! CLI configuration utilities

use anyhow::{Context, Result};
use cinema_http::ClientConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the config file looked up in the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory: flag, then `CINEMA_STATE_DIR`, then the
/// platform data directory
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        std::env::var("CINEMA_STATE_DIR").map_or_else(
            |_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("cinema")
            },
            PathBuf::from,
        )
    })
}

/// Load client configuration
///
/// An explicit path must exist. Without one, `config.toml` in the data
/// directory is used when present.
pub fn load_client_config(explicit: Option<&Path>, data_dir: &Path) -> Result<ClientConfig> {
    let default_path = data_dir.join(CONFIG_FILE);
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_path.exists().then_some(default_path),
    };

    if let Some(path) = &path {
        info!("Loading configuration from: {}", path.display());
    }

    ClientConfig::load(path.as_deref()).context("failed to load configuration")
}

/// Save client configuration as TOML
pub fn save_client_config(config: &ClientConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config(path: &Path) -> Result<()> {
    save_client_config(&ClientConfig::default(), path)
}
