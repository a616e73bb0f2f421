//! Output template parsing and rendering.
//!
//! A template is scanned once into literal text and placeholder tokens. Only
//! the four recognized tokens are substituted; any other `[[...]]` sequence
//! (including ordinary wiki links) is kept verbatim.
//!
//! | Token | Replaced with |
//! |-------|---------------|
//! | `[[link]]` | Markdown link to the file, relative to the daily note |
//! | `[[name]]` | File base name without extension |
//! | `[[tags]]` | The file's tags, each prefixed with `\`, joined by `, ` |
//! | `[[ctime]]` | File creation date as `YYYY-MM-DD` |
//!
//! # Example
//!
//! ```
//! use modified_today::format::{EntryFields, Placeholder, Template};
//!
//! let template = Template::parse("- [[name]] ([[ctime]]) [[other]]");
//! assert!(template.uses(Placeholder::Name));
//! assert!(!template.uses(Placeholder::Link));
//!
//! let fields = EntryFields {
//!     name: "A".to_string(),
//!     ctime: "2024-05-17".to_string(),
//!     ..EntryFields::default()
//! };
//! assert_eq!(template.render(&fields), "- A (2024-05-17) [[other]]");
//! ```

use thiserror::Error;

use crate::vault::Vault;

/// Escape prefix written before each rendered tag so it is not re-parsed as
/// a tag of the daily note.
pub const TAG_ESCAPE: char = '\\';

/// Errors that can occur while rendering an entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The tracked path no longer resolves to a file.
    #[error("tracked file no longer exists: {0}")]
    MissingFile(String),
}

/// The recognized placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Link,
    Name,
    Tags,
    CreationDate,
}

impl Placeholder {
    pub const ALL: [Self; 4] = [Self::Link, Self::Name, Self::Tags, Self::CreationDate];

    /// The text between `[[` and `]]` for this placeholder.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Name => "name",
            Self::Tags => "tags",
            Self::CreationDate => "ctime",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub link: String,
    pub name: String,
    pub tags: String,
    pub ctime: String,
}

impl EntryFields {
    fn get(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Link => &self.link,
            Placeholder::Name => &self.name,
            Placeholder::Tags => &self.tags,
            Placeholder::CreationDate => &self.ctime,
        }
    }
}

impl Template {
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("[[") {
            let after_open = &rest[open + 2..];
            let token = after_open
                .find("]]")
                .and_then(|close| Placeholder::from_key(&after_open[..close]).map(|p| (p, close)));

            match token {
                Some((placeholder, close)) => {
                    literal.push_str(&rest[..open]);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(placeholder));
                    rest = &after_open[close + 2..];
                }
                None => {
                    // Keep the `[[` and continue scanning after it.
                    literal.push_str(&rest[..open + 2]);
                    rest = after_open;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Returns `true` if the template contains `placeholder`.
    #[must_use]
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(p) if *p == placeholder))
    }

    #[must_use]
    pub fn render(&self, fields: &EntryFields) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Placeholder(p) => fields.get(*p),
            })
            .collect()
    }
}

/// Renders the entry for the tracked file at `path`.
///
/// Only the fields the template uses are looked up.
///
/// # Errors
///
/// Returns [`FormatError::MissingFile`] if `path` no longer exists in the
/// vault.
pub fn render_entry(
    vault: &dyn Vault,
    path: &str,
    daily_note_path: &str,
    template: &Template,
) -> Result<String, FormatError> {
    if !vault.exists(path) {
        return Err(FormatError::MissingFile(path.to_string()));
    }

    let mut fields = EntryFields::default();
    if template.uses(Placeholder::Link) {
        fields.link = vault.markdown_link(path, daily_note_path);
    }
    if template.uses(Placeholder::Name) {
        fields.name = base_name(path).to_string();
    }
    if template.uses(Placeholder::Tags) {
        let tags = vault.metadata(path).map(|m| m.tags).unwrap_or_default();
        fields.tags = format_tags(&tags);
    }
    if template.uses(Placeholder::CreationDate) {
        fields.ctime = vault
            .created_date(path)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
    }

    Ok(template.render(&fields))
}

/// Returns the file name of `path` without its extension.
#[must_use]
pub fn base_name(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("{TAG_ESCAPE}{tag}"))
        .collect::<Vec<_>>()
        .join(", ")
}
