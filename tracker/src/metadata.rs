//! Tag and heading extraction from markdown text.
//!
//! This is the crate's stand-in for a note host's metadata cache. It
//! recognizes:
//!
//! - YAML front matter `tags:` (inline list, comma list, or block list)
//! - inline `#tags` outside fenced code blocks
//! - ATX headings (`#` to `######` followed by a space) outside fenced code
//!   blocks and front matter
//!
//! # Example
//!
//! ```
//! use modified_today::metadata::parse_metadata;
//!
//! let text = "---\ntags: [work]\n---\n# Modified\nsee #idea\n## Next\n";
//! let meta = parse_metadata(text);
//! assert_eq!(meta.tags, vec!["#work".to_string(), "#idea".to_string()]);
//! assert_eq!(meta.headings.len(), 2);
//! assert_eq!(meta.headings[0].text, "Modified");
//! assert_eq!(meta.headings[0].line, 3);
//! ```

use serde::{Deserialize, Serialize};

/// A heading found in a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading text without the leading `#`s.
    pub text: String,
    /// 1 for `#`, up to 6 for `######`.
    pub level: u8,
    /// Zero-based line index of the heading.
    pub line: usize,
}

/// Parsed metadata of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Tags with a leading `#`, in first-seen order, without duplicates.
    pub tags: Vec<String>,
    /// Headings in document order.
    pub headings: Vec<Heading>,
}

/// Parses tags and headings out of `text`.
#[must_use]
pub fn parse_metadata(text: &str) -> FileMetadata {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut meta = FileMetadata::default();

    let body_start = match front_matter_end(&lines) {
        Some(end) => {
            for tag in front_matter_tags(&lines[1..end]) {
                push_tag(&mut meta.tags, tag);
            }
            end + 1
        }
        None => 0,
    };

    let mut fence: Option<&str> = None;
    for (idx, raw) in lines.iter().enumerate().skip(body_start) {
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim_start();

        if let Some(marker) = fence_marker(trimmed) {
            match fence {
                Some(open) if marker == open => fence = None,
                None => fence = Some(marker),
                _ => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        if let Some((level, text)) = parse_heading(line) {
            meta.headings.push(Heading {
                text: text.to_string(),
                level,
                line: idx,
            });
        }

        for tag in inline_tags(line) {
            push_tag(&mut meta.tags, tag);
        }
    }

    meta
}

/// Returns the line index of the closing `---` when the text opens with
/// front matter.
fn front_matter_end(lines: &[&str]) -> Option<usize> {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| l.trim_end() == "---")
        .map(|(idx, _)| idx)
}

fn front_matter_tags<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let mut tags = Vec::new();
    let mut in_block = false;

    for line in lines {
        let line = line.trim_end_matches('\r');
        if in_block {
            if let Some(item) = line.trim_start().strip_prefix("- ") {
                tags.push(unquote(item.trim()));
                continue;
            }
            if line.starts_with(' ') || line.trim().is_empty() {
                continue;
            }
            in_block = false;
        }

        let Some(value) = line
            .strip_prefix("tags:")
            .or_else(|| line.strip_prefix("tag:"))
        else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            in_block = true;
            continue;
        }
        let value = value
            .strip_prefix('[')
            .and_then(|v| v.strip_suffix(']'))
            .unwrap_or(value);
        tags.extend(
            value
                .split(',')
                .map(|t| unquote(t.trim()))
                .filter(|t| !t.is_empty()),
        );
    }

    tags
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

fn push_tag(tags: &mut Vec<String>, raw: &str) {
    let name = raw.trim_start_matches('#');
    if name.is_empty() {
        return;
    }
    let tag = format!("#{name}");
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Parses an ATX heading, returning its level and text.
fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    // `hashes` is at most 6
    Some((hashes as u8, text))
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '/')
}

/// Finds `#tag` tokens preceded by whitespace or the start of the line.
fn inline_tags(line: &str) -> Vec<&str> {
    let mut tags = Vec::new();
    let mut prev: Option<char> = None;

    for (idx, c) in line.char_indices() {
        if c == '#' && prev.map_or(true, char::is_whitespace) {
            let rest = &line[idx + 1..];
            let len: usize = rest
                .chars()
                .take_while(|&ch| is_tag_char(ch))
                .map(char::len_utf8)
                .sum();
            let name = &rest[..len];
            if !name.is_empty() && !name.chars().all(|ch| ch.is_ascii_digit()) {
                tags.push(name);
            }
        }
        prev = Some(c);
    }

    tags
}
