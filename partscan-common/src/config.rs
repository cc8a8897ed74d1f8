//! Configuration loading and root folder resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: the service starts on defaults and
//! logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PARTSCAN_ROOT_FOLDER";

/// File name of the seen-codes table inside the root folder
pub const SEEN_CODES_FILE: &str = "seen_codes.csv";

/// File name of the resolved-parts table inside the root folder
pub const PARTS_FILE: &str = "parts.csv";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; unset fields fall through to environment or
/// compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the durable tables
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen address, e.g. "127.0.0.1:5790"
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Mouser search API key
    #[serde(default)]
    pub mouser_api_key: Option<String>,

    /// Catalog API base URL (tests and proxies)
    #[serde(default)]
    pub catalog_base_url: Option<String>,

    /// Seconds before a repeated payload is reported again
    #[serde(default)]
    pub rearm_window_secs: Option<u64>,

    /// Catalog request quota
    #[serde(default)]
    pub catalog_requests_per_minute: Option<u32>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Standard user agent for outbound HTTP requests
pub fn get_user_agent() -> String {
    format!("partscan/{}", env!("CARGO_PKG_VERSION"))
}

/// Locate the platform configuration file, if one exists
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("partscan").join("config.toml"));

    if cfg!(target_os = "linux") {
        // ~/.config/partscan/config.toml first, then /etc/partscan/config.toml
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }
        let system_config = PathBuf::from("/etc/partscan/config.toml");
        return system_config.exists().then_some(system_config);
    }

    user_config.filter(|path| path.exists())
}

/// Load TOML configuration
///
/// A missing file yields the default configuration with a warning; a file
/// that exists but does not parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write TOML configuration
///
/// Writes to a sibling temp file and renames it into place so a reader
/// never observes a half-written file.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/partscan (or /var/lib/partscan for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("partscan"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/partscan"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/partscan
        dirs::data_dir()
            .map(|d| d.join("partscan"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/partscan"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\partscan
        dirs::data_local_dir()
            .map(|d| d.join("partscan"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\partscan"))
    } else {
        PathBuf::from("./partscan_data")
    }
}

/// Creates the root folder and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Path of the seen-codes table
    pub fn seen_codes_path(&self) -> PathBuf {
        self.root_folder.join(SEEN_CODES_FILE)
    }

    /// Path of the resolved-parts table
    pub fn parts_path(&self) -> PathBuf {
        self.root_folder.join(PARTS_FILE)
    }
}
