//! Managed region replacement in the daily note.
//!
//! The managed region is the run of lines after the configured heading, up to
//! (not including) the next heading of any level, or to the end of the
//! document. Splicing replaces exactly that range and leaves every other line
//! untouched.
//!
//! # Example
//!
//! ```
//! use modified_today::metadata::parse_metadata;
//! use modified_today::splice::splice_managed_region;
//!
//! let lines = vec!["# Modified", "old line", "# Next"];
//! let headings = parse_metadata(&lines.join("\n")).headings;
//! let entries = vec!["- [A](Notes/A.md)".to_string()];
//!
//! let result = splice_managed_region(&lines, Some(headings.as_slice()), "Modified", &entries).unwrap();
//! assert_eq!(result, vec!["# Modified", "- [A](Notes/A.md)", "# Next"]);
//! ```

use std::ops::Range;

use thiserror::Error;

use crate::metadata::Heading;

/// Reasons the managed region cannot be rewritten.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    /// No heading is configured.
    #[error("no heading configured; cannot render the file list")]
    NoHeadingConfigured,

    /// The document's heading metadata is not available.
    #[error("heading metadata unavailable; cannot render the file list")]
    HeadingsUnavailable,

    /// The configured heading does not exist in the document.
    #[error("heading '{0}' not found in the daily note")]
    HeadingNotFound(String),
}

/// Computes the line range owned by `heading`.
///
/// # Errors
///
/// Returns a [`SpliceError`] when no heading is configured, no heading list
/// is available, or the heading is not present.
pub fn managed_region(
    headings: Option<&[Heading]>,
    heading: &str,
    line_count: usize,
) -> Result<Range<usize>, SpliceError> {
    if heading.is_empty() {
        return Err(SpliceError::NoHeadingConfigured);
    }
    let headings = headings.ok_or(SpliceError::HeadingsUnavailable)?;

    let index = headings
        .iter()
        .position(|h| h.text == heading)
        .ok_or_else(|| SpliceError::HeadingNotFound(heading.to_string()))?;

    let start = (headings[index].line + 1).min(line_count);
    let end = headings[index + 1..]
        .iter()
        .map(|h| h.line)
        .find(|&line| line >= start)
        .unwrap_or(line_count)
        .min(line_count);

    Ok(start..end)
}

/// Replaces the managed region of `lines` with `entries`.
///
/// The result is `lines[..start] + entries + lines[end..]`. An empty
/// `entries` clears the region.
///
/// # Errors
///
/// See [`managed_region`]. The input is never modified on error.
pub fn splice_managed_region<S: AsRef<str>>(
    lines: &[S],
    headings: Option<&[Heading]>,
    heading: &str,
    entries: &[String],
) -> Result<Vec<String>, SpliceError> {
    let region = managed_region(headings, heading, lines.len())?;

    let mut result = Vec::with_capacity(lines.len() - region.len() + entries.len());
    result.extend(lines[..region.start].iter().map(|l| l.as_ref().to_string()));
    result.extend(entries.iter().cloned());
    result.extend(lines[region.end..].iter().map(|l| l.as_ref().to_string()));
    Ok(result)
}

/// Splices a whole document.
///
/// A trailing newline is kept out of the managed region so that rewriting a
/// region that extends to the end of the document does not drop it. A
/// document using `\r\n` line endings is written back with `\r\n`.
///
/// # Errors
///
/// See [`managed_region`].
pub fn splice_text(
    text: &str,
    headings: Option<&[Heading]>,
    heading: &str,
    entries: &[String],
) -> Result<String, SpliceError> {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let (body, trailing_newline) = match text.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (text, false),
    };
    let lines: Vec<&str> = body
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let mut spliced = splice_managed_region(&lines, headings, heading, entries)?.join(newline);
    if trailing_newline {
        spliced.push_str(newline);
    }
    Ok(spliced)
}
