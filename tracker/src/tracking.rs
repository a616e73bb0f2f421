//! Tracked-set membership updates.
//!
//! These functions are the only writers of `trackedFiles` and
//! `lastTrackedDate`. Each one first performs the daily rollover: when the
//! stored date is not today, the tracked set is cleared and the date updated
//! before the change is applied.
//!
//! Callers are responsible for serializing invocations; the orchestrator runs
//! them one at a time from its command queue.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::filter::{Candidate, Filters};
use crate::settings::{format_tracked_date, Settings};

/// Result of evaluating a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The file was not tracked and now is.
    Added,
    /// The file was tracked but now matches an ignore rule.
    Removed,
    /// Nothing changed.
    Unchanged,
}

impl Membership {
    #[must_use]
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }
}

/// Clears the tracked set if it belongs to a previous day.
///
/// Returns `true` if a rollover happened.
pub fn roll_over(settings: &mut Settings, today: NaiveDate) -> bool {
    if !settings.is_stale(today) {
        return false;
    }
    info!(
        previous = %settings.last_tracked_date,
        today = %today,
        cleared = settings.tracked_files.len(),
        "Daily rollover, clearing tracked files"
    );
    settings.tracked_files.clear();
    settings.last_tracked_date = format_tracked_date(today);
    true
}

/// Applies a content change of `candidate` to the tracked set.
pub fn on_file_changed(
    settings: &mut Settings,
    candidate: &Candidate<'_>,
    today: NaiveDate,
) -> Membership {
    roll_over(settings, today);

    let trackable = Filters::from_settings(settings).is_trackable(candidate);
    let tracked = settings.tracked_files.contains(candidate.path);

    match (tracked, trackable) {
        (false, true) => {
            settings.tracked_files.insert(candidate.path);
            debug!(path = %candidate.path, "Tracking file");
            Membership::Added
        }
        (true, false) => {
            settings.tracked_files.remove(candidate.path);
            debug!(path = %candidate.path, "File now matches an ignore rule, untracking");
            Membership::Removed
        }
        _ => Membership::Unchanged,
    }
}

/// Removes a deleted file from the tracked set.
///
/// Returns `true` if the path was tracked.
pub fn on_file_deleted(settings: &mut Settings, path: &str, today: NaiveDate) -> bool {
    roll_over(settings, today);
    let removed = settings.tracked_files.remove(path);
    if removed {
        debug!(path = %path, "Deleted file untracked");
    }
    removed
}

/// Replaces a renamed file's old path with its new one.
///
/// The new path is appended at the end of the set rather than taking the old
/// path's position. Returns `true` if `old_path` was tracked.
pub fn on_file_renamed(
    settings: &mut Settings,
    old_path: &str,
    new_path: &str,
    today: NaiveDate,
) -> bool {
    roll_over(settings, today);
    if !settings.tracked_files.remove(old_path) {
        return false;
    }
    settings.tracked_files.insert(new_path);
    debug!(from = %old_path, to = %new_path, "Renamed tracked file");
    true
}
