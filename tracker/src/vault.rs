//! Vault abstraction and its filesystem implementation.
//!
//! The [`Vault`] trait is the narrow surface the rest of the crate uses to
//! read and write notes, look up their metadata, build links between them and
//! resolve the daily note. [`FsVault`] implements it over a directory of
//! markdown files.
//!
//! All paths crossing this interface are vault-relative and `/`-separated,
//! e.g. `Notes/A.md`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info};

use crate::metadata::{parse_metadata, FileMetadata};

/// Default `strftime` format of daily note file names.
pub const DEFAULT_DAILY_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur during vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The daily note for the given date does not exist.
    #[error("daily note not found: {0}")]
    DailyNoteNotFound(String),

    /// A file could not be read, written or copied.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl VaultError {
    fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Host capabilities consumed by the tracker.
pub trait Vault: Send + Sync {
    /// Returns `true` if a file exists at `path`.
    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> Result<String, VaultError>;

    fn write(&self, path: &str, content: &str) -> Result<(), VaultError>;

    fn copy(&self, from: &str, to: &str) -> Result<(), VaultError>;

    /// Returns the parsed tags and headings of the note at `path`.
    fn metadata(&self, path: &str) -> Option<FileMetadata>;

    /// Returns the creation date of the file at `path`.
    fn created_date(&self, path: &str) -> Option<NaiveDate>;

    /// Returns the path the daily note for `date` lives at.
    fn daily_note_path(&self, date: NaiveDate) -> String;

    /// Creates an empty daily note for `date` and returns its path.
    fn create_daily_note(&self, date: NaiveDate) -> Result<String, VaultError>;

    /// Returns the path of the existing daily note for `date`.
    fn resolve_daily_note(&self, date: NaiveDate) -> Result<String, VaultError> {
        let path = self.daily_note_path(date);
        if self.exists(&path) {
            Ok(path)
        } else {
            Err(VaultError::DailyNoteNotFound(path))
        }
    }

    /// Builds a markdown link to `target` usable inside the note at `from`.
    fn markdown_link(&self, target: &str, from: &str) -> String {
        relative_markdown_link(target, from)
    }
}

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
    daily_folder: String,
    daily_format: String,
}

impl FsVault {
    /// Creates a vault rooted at `root` with daily notes at the root named
    /// `YYYY-MM-DD.md`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            daily_folder: String::new(),
            daily_format: DEFAULT_DAILY_FORMAT.to_string(),
        }
    }

    /// Places daily notes in `folder` and names them with `format`.
    #[must_use]
    pub fn with_daily_notes(mut self, folder: &str, format: &str) -> Self {
        self.daily_folder = folder.trim_matches('/').to_string();
        self.daily_format = format.to_string();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a vault-relative path to an absolute one.
    #[must_use]
    pub fn absolute(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Converts an absolute path inside the vault to a vault-relative one.
    ///
    /// Returns `None` for paths outside the vault.
    #[must_use]
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        (!parts.is_empty()).then(|| parts.join("/"))
    }
}

impl Vault for FsVault {
    fn exists(&self, path: &str) -> bool {
        self.absolute(path).is_file()
    }

    fn read(&self, path: &str) -> Result<String, VaultError> {
        fs::read_to_string(self.absolute(path)).map_err(|e| VaultError::io(path, e))
    }

    fn write(&self, path: &str, content: &str) -> Result<(), VaultError> {
        let target = self.absolute(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(path, e))?;
        }
        fs::write(&target, content).map_err(|e| VaultError::io(path, e))?;
        debug!(path = %path, bytes = content.len(), "Wrote note");
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), VaultError> {
        fs::copy(self.absolute(from), self.absolute(to))
            .map(|_| ())
            .map_err(|e| VaultError::io(to, e))
    }

    fn metadata(&self, path: &str) -> Option<FileMetadata> {
        let text = fs::read_to_string(self.absolute(path)).ok()?;
        Some(parse_metadata(&text))
    }

    fn created_date(&self, path: &str) -> Option<NaiveDate> {
        let meta = fs::metadata(self.absolute(path)).ok()?;
        // Some filesystems do not record birth time.
        let time = meta.created().or_else(|_| meta.modified()).ok()?;
        Some(DateTime::<Local>::from(time).date_naive())
    }

    fn daily_note_path(&self, date: NaiveDate) -> String {
        let name = format!("{}.md", date.format(&self.daily_format));
        if self.daily_folder.is_empty() {
            name
        } else {
            format!("{}/{}", self.daily_folder, name)
        }
    }

    fn create_daily_note(&self, date: NaiveDate) -> Result<String, VaultError> {
        let path = self.daily_note_path(date);
        self.write(&path, "")?;
        info!(path = %path, "Created daily note");
        Ok(path)
    }
}

/// Builds `[name](relative/path.md)` pointing at `target` from the folder of
/// `from`.
///
/// # Example
///
/// ```
/// use modified_today::vault::relative_markdown_link;
///
/// assert_eq!(relative_markdown_link("Notes/A.md", "2024-05-17.md"), "[A](Notes/A.md)");
/// assert_eq!(
///     relative_markdown_link("Notes/My Note.md", "Daily/2024-05-17.md"),
///     "[My Note](../Notes/My%20Note.md)"
/// );
/// ```
#[must_use]
pub fn relative_markdown_link(target: &str, from: &str) -> String {
    let target_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let mut from_dirs: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    from_dirs.pop();

    let (target_dirs, file) = match target_parts.split_last() {
        Some((file, dirs)) => (dirs, *file),
        None => (&[][..], ""),
    };

    let common = target_dirs
        .iter()
        .zip(from_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dirs.len() - common];
    parts.extend(&target_dirs[common..]);
    parts.push(file);

    let href = parts.join("/").replace(' ', "%20");
    format!("[{}]({href})", crate::format::base_name(target))
}
