//! JSON settings store.
//!
//! Settings live in a single `data.json` file. Loading merges the stored
//! record with defaults, so older files missing newer keys still load.
//!
//! # Retry behavior
//!
//! Saves are written to a temporary file and renamed over the target. A
//! failed save is retried with exponential backoff (100ms, 200ms, ...) up to
//! [`DEFAULT_SAVE_ATTEMPTS`] times; the last failure is returned as
//! [`SettingsError::SaveFailed`] so callers can surface it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::settings::{Settings, SettingsError};

/// File name of the settings record inside the data directory.
pub const SETTINGS_FILE: &str = "data.json";

/// Number of save attempts before giving up.
pub const DEFAULT_SAVE_ATTEMPTS: u32 = 3;

/// Delay before the first retry.
const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Reads and writes the settings record.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    attempts: u32,
    initial_delay: Duration,
}

impl SettingsStore {
    /// Creates a store for `<data_dir>/data.json`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SETTINGS_FILE),
            attempts: DEFAULT_SAVE_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
        }
    }

    /// Overrides the retry schedule.
    #[must_use]
    pub fn with_retry(mut self, attempts: u32, initial_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, falling back to defaults for a missing file or missing
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }

        let settings: Settings = serde_json::from_str(&contents)?;
        debug!(
            path = %self.path.display(),
            tracked = settings.tracked_files.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Writes settings once, without retrying.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save_once(&self, settings: &Settings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Writes settings, retrying I/O failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::SaveFailed`] once every attempt has failed, or
    /// the serialization error immediately.
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            match self.save_once(settings) {
                Ok(()) => {
                    debug!(path = %self.path.display(), attempt, "Saved settings");
                    return Ok(());
                }
                Err(SettingsError::Io(source)) if attempt >= self.attempts => {
                    return Err(SettingsError::SaveFailed {
                        attempts: attempt,
                        source,
                    });
                }
                Err(SettingsError::Io(e)) => {
                    warn!(
                        path = %self.path.display(),
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "Failed to save settings, retrying"
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
