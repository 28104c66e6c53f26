//! Reformatting the rewritten include block with clang-format.

use crate::Result;
use crtools_core::{ToolCommand, ToolRunner};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};

/// Run `clang-format -i` over the zero-based `lines` range of `path`.
///
/// A failing clang-format is reported and otherwise ignored; the include
/// block is already sorted.
pub async fn format_lines(clang_format: &str, path: &Path, lines: Range<usize>) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let config = ToolCommand::from_args(
        "clang-format",
        [
            clang_format.to_string(),
            "-i".to_string(),
            format!("--lines={}:{}", lines.start + 1, lines.end),
            path.display().to_string(),
        ],
    );
    let output = ToolRunner::run(&config).await?;
    if output.passed() {
        debug!(path = %path.display(), "clang-format applied");
    } else {
        warn!(
            "clang-format failed on {} (exit code {}): {}",
            path.display(),
            output.exit_code,
            output.stderr.trim_end()
        );
    }
    Ok(())
}
