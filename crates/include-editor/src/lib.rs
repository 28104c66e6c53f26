//! include-editor - insert or remove a C++ `#include` across source files
//!
//! clang-format only sorts headers inside blocks delimited by blank lines, so
//! inserting a header is more than prepending a line. This crate classifies
//! header blocks (C system, C++ system, user), finds the primary header of an
//! implementation file, and rewrites the include block in sorted, grouped
//! form.

pub mod clang_format;
pub mod editor;
pub mod error;
pub mod header;
pub mod include;
pub mod primary;
pub mod serialize;

pub use editor::{normalize_path, EditOutcome, HeaderEdit, SkipReason};
pub use error::IncludeError;
pub use header::HeaderType;
pub use include::{find_includes, parse_includes, Directive, Include};
pub use primary::mark_primary_include;
pub use serialize::serialize_includes;

use std::path::Path;
use tracing::info;

/// Result alias used across include-editor.
pub type Result<T> = std::result::Result<T, IncludeError>;

/// Options for [`edit_file`] beyond the edit itself.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// clang-format executable, `None` to skip formatting.
    pub clang_format: Option<String>,
}

/// Apply `edit` to one file in place. Returns whether the file changed.
pub async fn edit_file(path: &Path, edit: &HeaderEdit, options: &FormatOptions) -> Result<bool> {
    let filename = normalize_path(&path.to_string_lossy());
    let source = tokio::fs::read_to_string(path).await?;
    match edit.apply(&filename, &source) {
        EditOutcome::Skipped(reason) => {
            println!("Skipping {}: {}", filename, reason);
            Ok(false)
        }
        EditOutcome::Rewritten { source, lines } => {
            tokio::fs::write(path, source).await?;
            info!(file = %filename, "{} #include {}", edit.verb(), edit.header);
            if let Some(clang_format) = &options.clang_format {
                clang_format::format_lines(clang_format, path, lines).await?;
            }
            Ok(true)
        }
    }
}
