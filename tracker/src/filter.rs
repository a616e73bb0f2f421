//! Predicates deciding whether a file should be tracked.
//!
//! All predicates are pure. [`Filters`] is built from the current [`Settings`]
//! so the comma-separated lists are split once per evaluation instead of once
//! per predicate call.
//!
//! # Example
//!
//! ```
//! use modified_today::filter::Filters;
//! use modified_today::settings::Settings;
//!
//! let settings = Settings {
//!     excluded_folders: "Archive".to_string(),
//!     ..Settings::default()
//! };
//! let filters = Filters::from_settings(&settings);
//! assert!(filters.is_excluded_path("Archive/Sub/x.md"));
//! assert!(!filters.is_excluded_path("Notes/x.md"));
//! ```

use crate::settings::{split_list, Settings};

/// A file as seen by the filters.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Vault-relative path, e.g. `Notes/A.md`.
    pub path: &'a str,
    /// Tags found in the file, each with a leading `#`.
    pub tags: &'a [String],
    /// Base name of the file without extension.
    pub title: &'a str,
    /// Whether the file is today's daily note.
    pub is_daily_note: bool,
}

/// The ignore rules from the settings, split into lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    ignored_tags: Vec<String>,
    excluded_folders: Vec<String>,
    ignored_text: Vec<String>,
}

impl Filters {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ignored_tags: split_list(&settings.tags),
            excluded_folders: split_list(&settings.excluded_folders)
                .into_iter()
                .map(|folder| folder.trim_matches('/').to_string())
                .filter(|folder| !folder.is_empty())
                .collect(),
            ignored_text: split_list(&settings.ignored_name_contains)
                .into_iter()
                .map(|text| text.to_lowercase())
                .collect(),
        }
    }

    /// Returns `true` if any of `tags` is an ignored tag (case-sensitive).
    #[must_use]
    pub fn has_ignored_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.ignored_tags.contains(tag))
    }

    /// Returns `true` if the file's parent folder starts with an excluded
    /// folder prefix.
    #[must_use]
    pub fn is_excluded_path(&self, path: &str) -> bool {
        if self.excluded_folders.is_empty() {
            return false;
        }
        let parent = parent_folder(path);
        self.excluded_folders
            .iter()
            .any(|folder| parent.starts_with(folder.as_str()))
    }

    /// Returns `true` if `title` contains an ignored substring, ignoring case.
    #[must_use]
    pub fn title_contains_ignored_text(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.ignored_text
            .iter()
            .any(|text| title.contains(text.as_str()))
    }

    /// A file is trackable when no ignore rule matches and it is not the
    /// daily note itself.
    #[must_use]
    pub fn is_trackable(&self, candidate: &Candidate<'_>) -> bool {
        !candidate.is_daily_note
            && !self.has_ignored_tag(candidate.tags)
            && !self.is_excluded_path(candidate.path)
            && !self.title_contains_ignored_text(candidate.title)
    }
}

/// Returns the parent folder of a vault-relative path without surrounding
/// slashes; files at the vault root have an empty parent.
fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => path[..idx].trim_matches('/'),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(tags: &str, folders: &str, text: &str) -> Filters {
        Filters::from_settings(&Settings {
            tags: tags.to_string(),
            excluded_folders: folders.to_string(),
            ignored_name_contains: text.to_string(),
            ..Settings::default()
        })
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ignored_tag_matches_any_intersection() {
        let f = filters("#daily", "", "");
        assert!(f.has_ignored_tag(&tags(&["#daily", "#work"])));
        assert!(!f.has_ignored_tag(&tags(&["#work"])));
    }

    #[test]
    fn ignored_tag_is_case_sensitive() {
        let f = filters("#Daily", "", "");
        assert!(!f.has_ignored_tag(&tags(&["#daily"])));
    }

    #[test]
    fn ignored_tag_list_is_trimmed() {
        let f = filters(" #daily ,  #meta", "", "");
        assert!(f.has_ignored_tag(&tags(&["#meta"])));
    }

    #[test]
    fn no_tag_rules_never_matches() {
        let f = filters("", "", "");
        assert!(!f.has_ignored_tag(&tags(&["#anything"])));
    }

    #[test]
    fn excluded_folder_matches_nested_files() {
        let f = filters("", "Archive", "");
        assert!(f.is_excluded_path("Archive/Sub/x.md"));
        assert!(f.is_excluded_path("Archive/x.md"));
        assert!(!f.is_excluded_path("Notes/Archive/x.md"));
    }

    #[test]
    fn excluded_folder_strips_slashes() {
        let f = filters("", "/Templates/, Journal/", "");
        assert!(f.is_excluded_path("Templates/meeting.md"));
        assert!(f.is_excluded_path("Journal/2024/x.md"));
    }

    #[test]
    fn excluded_folder_never_matches_root_files() {
        let f = filters("", "Archive", "");
        assert!(!f.is_excluded_path("Archive.md"));
    }

    #[test]
    fn no_excluded_folders_returns_false() {
        let f = filters("", "", "");
        assert!(!f.is_excluded_path("Archive/x.md"));

        let only_slashes = filters("", "/, ,/", "");
        assert!(!only_slashes.is_excluded_path("Archive/x.md"));
    }

    #[test]
    fn title_match_is_case_insensitive() {
        let f = filters("", "", "Draft, tmp");
        assert!(f.title_contains_ignored_text("my DRAFT idea"));
        assert!(f.title_contains_ignored_text("TMP-123"));
        assert!(!f.title_contains_ignored_text("final"));
    }

    #[test]
    fn trackable_requires_every_rule_to_pass() {
        let f = filters("#daily", "Archive", "draft");
        let no_tags: Vec<String> = vec![];
        let base = Candidate {
            path: "Notes/A.md",
            tags: &no_tags,
            title: "A",
            is_daily_note: false,
        };
        assert!(f.is_trackable(&base));

        let daily = Candidate {
            is_daily_note: true,
            ..base
        };
        assert!(!f.is_trackable(&daily));

        let archived = Candidate {
            path: "Archive/A.md",
            ..base
        };
        assert!(!f.is_trackable(&archived));

        let draft = Candidate {
            title: "Draft A",
            ..base
        };
        assert!(!f.is_trackable(&draft));

        let tagged = tags(&["#daily"]);
        let with_tag = Candidate {
            tags: &tagged,
            ..base
        };
        assert!(!f.is_trackable(&with_tag));
    }
}
