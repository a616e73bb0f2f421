//! Configuration module for Modified Today.
//!
//! This module handles parsing configuration from environment variables.
//! Command-line flags in the binary override the vault path.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `MODIFIED_TODAY_VAULT` | Yes | - | Root directory of the vault |
//! | `MODIFIED_TODAY_DATA_DIR` | No | `<vault>/.modified-today` | Directory holding `data.json` |
//! | `MODIFIED_TODAY_DAILY_FOLDER` | No | vault root | Folder containing daily notes |
//! | `MODIFIED_TODAY_DAILY_FORMAT` | No | `%Y-%m-%d` | `strftime` format of daily note names |
//! | `MODIFIED_TODAY_DEBOUNCE_MS` | No | 250 | Delay before a burst of edits counts as one change |
//! | `MODIFIED_TODAY_QUEUE_SIZE` | No | 256 | Capacity of the command queue |
//!
//! # Example
//!
//! ```no_run
//! use modified_today::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Vault: {}", config.vault_dir.display());
//! ```

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::utils::DEFAULT_DEBOUNCE_MS;
use crate::vault::DEFAULT_DAILY_FORMAT;

/// Default data directory name relative to the vault.
pub const DEFAULT_DATA_DIR: &str = ".modified-today";

/// Default command queue capacity.
const DEFAULT_QUEUE_SIZE: usize = 256;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration for Modified Today.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the vault.
    pub vault_dir: PathBuf,

    /// Directory holding the persisted settings.
    pub data_dir: PathBuf,

    /// Vault-relative folder containing daily notes.
    pub daily_folder: String,

    /// `strftime` format of daily note file names (without `.md`).
    pub daily_format: String,

    /// Debounce delay for change events, in milliseconds.
    pub debounce_ms: u64,

    /// Capacity of the orchestrator command queue.
    pub queue_size: usize,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `MODIFIED_TODAY_VAULT` is not set, or if a
    /// numeric variable is set but is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vault_dir = env::var("MODIFIED_TODAY_VAULT")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnvVar("MODIFIED_TODAY_VAULT".to_string()))?;
        Self::from_env_with_vault(vault_dir)
    }

    /// Like [`Config::from_env`], but with the vault directory given
    /// explicitly.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a numeric variable is set but is not a
    /// positive integer.
    pub fn from_env_with_vault(vault_dir: PathBuf) -> Result<Self, ConfigError> {
        // Optional: MODIFIED_TODAY_DATA_DIR (default: <vault>/.modified-today)
        let data_dir = env::var("MODIFIED_TODAY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| vault_dir.join(DEFAULT_DATA_DIR));

        let daily_folder = env::var("MODIFIED_TODAY_DAILY_FOLDER")
            .map(|s| s.trim().trim_matches('/').to_string())
            .unwrap_or_default();

        let daily_format = env::var("MODIFIED_TODAY_DAILY_FORMAT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DAILY_FORMAT.to_string());

        let debounce_ms = parse_positive("MODIFIED_TODAY_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;
        let queue_size = parse_positive("MODIFIED_TODAY_QUEUE_SIZE", DEFAULT_QUEUE_SIZE as u64)?;

        Ok(Self {
            vault_dir,
            data_dir,
            daily_folder,
            daily_format,
            debounce_ms,
            queue_size: usize::try_from(queue_size).map_err(|_| ConfigError::InvalidValue {
                key: "MODIFIED_TODAY_QUEUE_SIZE".to_string(),
                message: format!("value too large: {queue_size}"),
            })?,
        })
    }
}

/// Parses an optional positive integer variable.
fn parse_positive(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let parsed = val
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}
