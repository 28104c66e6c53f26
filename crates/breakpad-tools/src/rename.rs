//! Renaming breakpad symbol files after the module they describe.
//!
//! A breakpad file starts with `MODULE <os> <arch> <id> <name...>`; the
//! symbolizer looks files up as `<ID>.breakpad`.

use crate::error::BreakpadError;
use crate::Result;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// The module id from a breakpad header line, or `None` if the line is not
/// a well-formed header.
pub fn parse_module_header(line: &str) -> Option<&str> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 || tokens[0] != "MODULE" {
        return None;
    }
    Some(tokens[3])
}

/// The module id recorded in the first line of `path`.
pub fn extract_module_id(path: &Path) -> Result<Option<String>> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    Ok(parse_module_header(&first_line).map(str::to_string))
}

/// Move every breakpad file under `input_dir` to `output_dir/<ID>.breakpad`.
///
/// Only files with `.breakpad` in their name and a valid header are moved;
/// everything else, directories included, stays where it is. Returns the
/// new paths. A second file for an already moved module id is an error.
pub fn rename_breakpad_files(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().contains(".breakpad")
        {
            candidates.push(entry.into_path());
        }
    }

    let mut seen = BTreeSet::new();
    let mut moved = Vec::new();
    for path in candidates {
        let Some(module_id) = extract_module_id(&path)? else {
            debug!(path = %path.display(), "not a breakpad file, skipping");
            continue;
        };
        let module_id = module_id.to_uppercase();
        if !seen.insert(module_id.clone()) {
            return Err(BreakpadError::DuplicateModuleId {
                module_id,
                path: path.display().to_string(),
            });
        }
        let destination = output_dir.join(format!("{}.breakpad", module_id));
        move_file(&path, &destination)?;
        debug!(from = %path.display(), to = %destination.display(), "renamed breakpad file");
        moved.push(destination);
    }
    info!(count = moved.len(), output = %output_dir.display(), "renamed breakpad files");
    Ok(moved)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        // Crossing filesystems.
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_header() {
        assert_eq!(
            parse_module_header("MODULE Linux x86_64 34984AB4EF948C name1.so"),
            Some("34984AB4EF948C")
        );
        assert_eq!(
            parse_module_header("MODULE mac x86_64 1240DF90E9AC39038EF400 Chrome Name\n"),
            Some("1240DF90E9AC39038EF400")
        );
        assert_eq!(parse_module_header(""), None);
        assert_eq!(
            parse_module_header("NOTMODULE mac x86_64 1240DF90E9AC39038EF400 name"),
            None
        );
        assert_eq!(parse_module_header("MODULE mac 1240DF90E9AC39038EF400 name"), None);
    }

    #[test]
    fn test_extract_module_id_reads_first_line_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.breakpad");
        std::fs::write(&path, "FILE 0 a.cc\nMODULE mac x86_64 ABC name\n").unwrap();
        assert_eq!(extract_module_id(&path).unwrap(), None);

        std::fs::write(&path, "MODULE mac x86_64 abc name\nFILE 0 a.cc\n").unwrap();
        assert_eq!(extract_module_id(&path).unwrap().as_deref(), Some("abc"));
    }
}
