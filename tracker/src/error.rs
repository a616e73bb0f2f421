//! Error types for Modified Today.
//!
//! Each module defines its own error enum; [`TrackerError`] gathers them for
//! code that crosses module boundaries, such as the orchestrator and the
//! binary.

use thiserror::Error;

use crate::config::ConfigError;
use crate::settings::SettingsError;
use crate::splice::SpliceError;
use crate::vault::VaultError;
use crate::watcher::WatcherError;

/// Errors that can occur while tracking and rendering modified files.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Settings could not be loaded, saved or validated.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// A vault operation failed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// The managed region could not be located.
    #[error("render error: {0}")]
    Splice(#[from] SpliceError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// The orchestrator worker is no longer running.
    #[error("orchestrator stopped")]
    OrchestratorStopped,
}

/// A specialized `Result` type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
