//! Ordered set of tracked file paths.
//!
//! Insertion order is the order in which files were first detected today and
//! is the order in which entries are rendered. Membership checks are O(1).

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Insertion-ordered set of vault-relative file paths.
///
/// Serializes as a plain JSON array so the persisted `trackedFiles` field
/// stays a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedSet(IndexSet<String>);

impl TrackedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(IndexSet::new())
    }

    /// Returns `true` if `path` is tracked.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    /// Appends `path` unless it is already tracked.
    ///
    /// Returns `true` if the path was inserted.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.0.insert(path.into())
    }

    /// Removes `path`, keeping the relative order of the remaining entries.
    ///
    /// Returns `true` if the path was present.
    pub fn remove(&mut self, path: &str) -> bool {
        self.0.shift_remove(path)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the tracked paths in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TrackedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
