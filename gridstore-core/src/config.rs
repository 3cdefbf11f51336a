//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gridstore/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gridstore/` (~/.config/gridstore/)
//! - Data: `$XDG_DATA_HOME/gridstore/` (~/.local/share/gridstore/)
//! - State/Logs: `$XDG_STATE_HOME/gridstore/` (~/.local/state/gridstore/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Storage engine configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload validation configuration
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage engine and connection pool configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Connections opened up front when the pool is created
    #[serde(default = "default_pool_initial")]
    pub pool_initial: usize,

    /// Connections added each time an empty pool must grow
    #[serde(default = "default_pool_growth")]
    pub pool_growth: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_initial: default_pool_initial(),
            pool_growth: default_pool_growth(),
        }
    }
}

fn default_pool_initial() -> usize {
    4
}

fn default_pool_growth() -> usize {
    3
}

/// Upload validation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Extensions admitted at upload, leading dot included
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    vec![
        ".xlsx".to_string(),
        ".xls".to_string(),
        ".csv".to_string(),
        ".json".to_string(),
    ]
}

impl UploadConfig {
    /// Check a filename against the extension allow-list.
    ///
    /// A file with no extension is never valid.
    pub fn is_allowed(&self, filename: &str) -> bool {
        let (_, ext) = crate::types::split_filename(filename);
        if ext.is_empty() {
            return false;
        }
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gridstore/config.toml` (~/.config/gridstore/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gridstore").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/gridstore/` (~/.local/share/gridstore/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("gridstore")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gridstore/` (~/.local/state/gridstore/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gridstore")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/gridstore/files.db` (~/.local/share/gridstore/files.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("files.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gridstore/gridstore.log` (~/.local/state/gridstore/gridstore.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gridstore.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
