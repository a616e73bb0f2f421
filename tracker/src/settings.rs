//! Persisted settings record.
//!
//! Settings are created once at load time (merged with defaults), mutated by
//! the orchestrator throughout the session, and saved after every logical
//! change. The JSON representation uses camelCase keys.
//!
//! # Example
//!
//! ```
//! use modified_today::settings::Settings;
//!
//! let settings: Settings = serde_json::from_str(r#"{"heading": "Modified"}"#).unwrap();
//! assert_eq!(settings.heading, "Modified");
//! assert_eq!(settings.output_format, "- [[link]]");
//! assert!(settings.tracked_files.is_empty());
//! ```

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracked::TrackedSet;

/// Default output template: a bullet with a link to the note.
pub const DEFAULT_OUTPUT_FORMAT: &str = "- [[link]]";

/// Default periodic write interval, in seconds.
pub const DEFAULT_WRITE_INTERVAL_SECS: u64 = 60;

/// Longest accepted write interval: one day.
pub const MAX_WRITE_INTERVAL_SECS: u64 = 86_400;

/// Format of `lastTrackedDate`.
pub const TRACKED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur while loading, saving or validating settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON for the settings record.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `writeInterval` is not a whole number of seconds between 0 and
    /// [`MAX_WRITE_INTERVAL_SECS`].
    #[error("invalid write interval '{0}': expected a whole number of seconds")]
    InvalidWriteInterval(String),

    /// Saving kept failing after every retry.
    #[error("failed to save settings after {attempts} attempts: {source}")]
    SaveFailed {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// The persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Files modified today, in order of first detection.
    pub tracked_files: TrackedSet,

    /// Day (`YYYY-MM-DD`) the tracked set was last reset.
    pub last_tracked_date: String,

    /// Heading text under which entries are written.
    pub heading: String,

    /// Template rendered once per tracked file.
    pub output_format: String,

    /// Comma-separated tags that exclude a file from tracking.
    pub tags: String,

    /// Comma-separated folder prefixes that exclude a file from tracking.
    pub excluded_folders: String,

    /// Comma-separated substrings that exclude a file by title.
    pub ignored_name_contains: String,

    /// Create today's daily note when it does not exist yet.
    pub automatically_create_daily_note: bool,

    /// Set once the daily note has been backed up.
    pub has_been_backed_up: bool,

    /// Seconds between periodic writes; `0` disables them.
    pub write_interval: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tracked_files: TrackedSet::new(),
            last_tracked_date: String::new(),
            heading: String::new(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            tags: String::new(),
            excluded_folders: String::new(),
            ignored_name_contains: String::new(),
            automatically_create_daily_note: false,
            has_been_backed_up: false,
            write_interval: DEFAULT_WRITE_INTERVAL_SECS.to_string(),
        }
    }
}

impl Settings {
    /// Parses `writeInterval`.
    ///
    /// Returns `Ok(None)` when periodic writes are disabled (`"0"`).
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidWriteInterval`] if the value is not made
    /// of ASCII digits only, or exceeds [`MAX_WRITE_INTERVAL_SECS`].
    pub fn write_interval(&self) -> Result<Option<Duration>, SettingsError> {
        let raw = self.write_interval.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SettingsError::InvalidWriteInterval(
                self.write_interval.clone(),
            ));
        }
        let secs = raw
            .parse::<u64>()
            .ok()
            .filter(|&secs| secs <= MAX_WRITE_INTERVAL_SECS)
            .ok_or_else(|| SettingsError::InvalidWriteInterval(self.write_interval.clone()))?;

        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    /// Returns `true` if `lastTrackedDate` is not `today`.
    #[must_use]
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_tracked_date != format_tracked_date(today)
    }
}

/// Formats a date the way `lastTrackedDate` stores it.
#[must_use]
pub fn format_tracked_date(date: NaiveDate) -> String {
    date.format(TRACKED_DATE_FORMAT).to_string()
}

/// Splits a comma-separated settings list, trimming whitespace and dropping
/// empty entries.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_json_merges_with_defaults() {
        let settings: Settings = serde_json::from_str(
            r##"{"trackedFiles": ["a.md"], "tags": "#daily", "hasBeenBackedUp": true}"##,
        )
        .unwrap();

        assert!(settings.tracked_files.contains("a.md"));
        assert_eq!(settings.tags, "#daily");
        assert!(settings.has_been_backed_up);
        assert_eq!(settings.output_format, DEFAULT_OUTPUT_FORMAT);
        assert_eq!(settings.write_interval, "60");
    }

    #[test]
    fn serializes_camel_case_keys() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        for key in [
            "trackedFiles",
            "lastTrackedDate",
            "heading",
            "outputFormat",
            "tags",
            "excludedFolders",
            "ignoredNameContains",
            "automaticallyCreateDailyNote",
            "hasBeenBackedUp",
            "writeInterval",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn write_interval_positive() {
        let settings = Settings {
            write_interval: "30".to_string(),
            ..Settings::default()
        };
        assert_eq!(
            settings.write_interval().unwrap(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn write_interval_zero_disables() {
        let settings = Settings {
            write_interval: "0".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.write_interval().unwrap(), None);
    }

    #[test]
    fn write_interval_rejects_non_integers() {
        for bad in ["", "abc", "-5", "1.5", "10s"] {
            let settings = Settings {
                write_interval: bad.to_string(),
                ..Settings::default()
            };
            assert!(
                matches!(
                    settings.write_interval(),
                    Err(SettingsError::InvalidWriteInterval(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn write_interval_rejects_out_of_range() {
        for too_long in ["86401", "18446744073709551615", "99999999999999999999999"] {
            let settings = Settings {
                write_interval: too_long.to_string(),
                ..Settings::default()
            };
            assert!(
                matches!(
                    settings.write_interval(),
                    Err(SettingsError::InvalidWriteInterval(_))
                ),
                "accepted {too_long:?}"
            );
        }

        let one_day = Settings {
            write_interval: MAX_WRITE_INTERVAL_SECS.to_string(),
            ..Settings::default()
        };
        assert_eq!(
            one_day.write_interval().unwrap(),
            Some(Duration::from_secs(MAX_WRITE_INTERVAL_SECS))
        );
    }

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" #daily , #work,, "),
            vec!["#daily".to_string(), "#work".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn stale_when_date_differs() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut settings = Settings::default();
        assert!(settings.is_stale(today));

        settings.last_tracked_date = "2024-03-09".to_string();
        assert!(!settings.is_stale(today));
    }

    #[test]
    fn settings_error_display() {
        let err = SettingsError::InvalidWriteInterval("abc".to_string());
        assert_eq!(
            err.to_string(),
            "invalid write interval 'abc': expected a whole number of seconds"
        );
    }
}
