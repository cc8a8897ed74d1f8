//! Configuration resolution for partscan-intake
//!
//! Layers command-line overrides, environment and TOML into the settings
//! the service starts with. Priority is CLI → ENV → TOML → compiled default.

use crate::catalog::{DEFAULT_REQUESTS_PER_MINUTE, MOUSER_BASE_URL};
use crate::dedup::DEFAULT_REARM_WINDOW;
use partscan_common::config::{load_toml_config, TomlConfig};
use partscan_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding the Mouser API key
pub const MOUSER_API_KEY_ENV: &str = "PARTSCAN_MOUSER_API_KEY";

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5790";

/// Resolve the Mouser API key
///
/// **Priority:** ENV → TOML. Whitespace-only values count as unset.
pub fn resolve_mouser_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(MOUSER_API_KEY_ENV)
        .ok()
        .filter(|key| is_valid_key(key));
    let toml_key = toml_config
        .mouser_api_key
        .as_ref()
        .filter(|key| is_valid_key(key));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Mouser API key found in environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("Mouser API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("Mouser API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Mouser API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: ~/.config/partscan/config.toml (mouser_api_key = \"your-key\")\n\
         \n\
         Obtain an API key at: https://www.mouser.com/api-hub/",
        MOUSER_API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Where the bootstrap configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// A path was named but does not exist
    Missing(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Report the source; call once tracing is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::Defaults => info!("No config file found, using defaults"),
        }
    }
}

/// Load the TOML config without logging
///
/// Runs before the subscriber exists, so the outcome is returned for
/// [`ConfigSource::log`] instead. A malformed file is still an error.
pub fn load_bootstrap_config(path: Option<PathBuf>) -> Result<(TomlConfig, ConfigSource)> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        Some(path) => Ok((TomlConfig::default(), ConfigSource::Missing(path))),
        None => Ok((TomlConfig::default(), ConfigSource::Defaults)),
    }
}

/// Values given on the command line, each overriding its TOML counterpart
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub rearm_window_secs: Option<u64>,
}

/// Resolved service settings, excluding the root folder and API key
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSettings {
    pub bind_address: String,
    pub rearm_window: Duration,
    pub catalog_base_url: String,
    pub catalog_requests_per_minute: u32,
    pub log_level: String,
}

impl IntakeSettings {
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let bind_address = cli
            .bind_address
            .clone()
            .or_else(|| toml_config.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let rearm_window = cli
            .rearm_window_secs
            .or(toml_config.rearm_window_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REARM_WINDOW);

        let catalog_base_url = toml_config
            .catalog_base_url
            .clone()
            .unwrap_or_else(|| MOUSER_BASE_URL.to_string());

        let catalog_requests_per_minute = toml_config
            .catalog_requests_per_minute
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE);

        Self {
            bind_address,
            rearm_window,
            catalog_base_url,
            catalog_requests_per_minute,
            log_level: toml_config.logging.level.clone(),
        }
    }
}
