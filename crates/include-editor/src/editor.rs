//! Adding or removing one header in a source file.

use crate::error::IncludeError;
use crate::header::classify;
use crate::include::{find_includes, parse_includes, Include};
use crate::primary::mark_primary_include;
use crate::serialize::serialize_includes;
use crate::Result;
use std::fmt;
use std::ops::Range;

/// Why a file was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoIncludes,
    Unparsable,
    /// Removal requested but the header is not included.
    NotFound(String),
    /// Addition requested but the header is already included.
    AlreadyPresent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoIncludes => write!(f, "unable to find includes!"),
            SkipReason::Unparsable => write!(f, "unable to parse includes!"),
            SkipReason::NotFound(header) => write!(f, "unable to find {}", header),
            SkipReason::AlreadyPresent => write!(f, "no changes required!"),
        }
    }
}

/// Result of applying a [`HeaderEdit`] to one file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Skipped(SkipReason),
    Rewritten {
        source: String,
        /// Zero-based line range of the rewritten include block.
        lines: Range<usize>,
    },
}

impl EditOutcome {
    pub fn source(&self) -> Option<&str> {
        match self {
            EditOutcome::Rewritten { source, .. } => Some(source),
            EditOutcome::Skipped(_) => None,
        }
    }
}

/// A validated request to insert or remove one decorated header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEdit {
    pub header: String,
    pub remove: bool,
}

impl HeaderEdit {
    pub fn new(header: impl Into<String>, remove: bool) -> Result<HeaderEdit> {
        let header = header.into();
        if classify(&header).is_none() {
            return Err(IncludeError::InvalidHeader(header));
        }
        Ok(HeaderEdit { header, remove })
    }

    pub fn add(header: impl Into<String>) -> Result<HeaderEdit> {
        Self::new(header, false)
    }

    pub fn remove(header: impl Into<String>) -> Result<HeaderEdit> {
        Self::new(header, true)
    }

    /// "Inserting" or "Removing".
    pub fn verb(&self) -> &'static str {
        if self.remove {
            "Removing"
        } else {
            "Inserting"
        }
    }

    /// Apply the edit to the text of `filename`.
    ///
    /// The rewritten source always ends with a newline.
    pub fn apply(&self, filename: &str, source: &str) -> EditOutcome {
        let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
        let Some(block) = find_includes(&lines) else {
            return EditOutcome::Skipped(SkipReason::NoIncludes);
        };
        let Some(mut includes) = parse_includes(&lines[block.clone()]) else {
            return EditOutcome::Skipped(SkipReason::Unparsable);
        };

        let existing = includes
            .iter()
            .position(|include| include.decorated_name == self.header);
        match (self.remove, existing) {
            (true, Some(idx)) => {
                includes.remove(idx);
            }
            (true, None) => {
                return EditOutcome::Skipped(SkipReason::NotFound(self.header.clone()));
            }
            (false, Some(_)) => return EditOutcome::Skipped(SkipReason::AlreadyPresent),
            (false, None) => match Include::plain(self.header.clone()) {
                Some(include) => includes.push(include),
                None => return EditOutcome::Skipped(SkipReason::Unparsable),
            },
        }

        mark_primary_include(&mut includes, filename);
        let rendered = serialize_includes(&mut includes);
        let rewritten = block.start..block.start + rendered.len();
        lines.splice(block, rendered);
        lines.push(String::new());

        EditOutcome::Rewritten {
            source: lines.join("\n"),
            lines: rewritten,
        }
    }
}

/// Lexically normalise a path: collapse separators, `.` and `..`.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
