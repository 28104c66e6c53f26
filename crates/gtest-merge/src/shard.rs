//! Per-shard gtest output files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default cap on a shard's `output.json`: 100 MiB.
pub const OUTPUT_JSON_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// The gtest launcher's JSON summary for one shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardOutput {
    pub all_tests: Vec<String>,
    pub disabled_tests: Vec<String>,
    pub global_tags: Vec<String>,
    /// One map per iteration, test name to its list of runs.
    pub per_iteration_data: Vec<Map<String, Value>>,
    pub test_locations: Map<String, Value>,
}

/// Why a shard's output could not be used. Displays as the reason printed
/// after "No result was found: ".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardLoadError {
    Missing(usize),
    Duplicated(usize),
    TooLarge(usize),
}

impl std::fmt::Display for ShardLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardLoadError::Missing(index) => {
                write!(f, "shard {} test output was missing", index)
            }
            ShardLoadError::Duplicated(index) => {
                write!(f, "shard {} test output was duplicated", index)
            }
            ShardLoadError::TooLarge(index) => {
                write!(f, "shard {} test output exceeded the size limit", index)
            }
        }
    }
}

/// Find and read the output of shard `index`.
///
/// The output is the `output.json` whose parent directory is named after the
/// shard index or its task id. Diagnostics go to `out`.
pub fn load_shard_json(
    index: usize,
    task_id: Option<&str>,
    jsons_to_merge: &[PathBuf],
    size_limit: u64,
    out: &mut dyn Write,
) -> Result<ShardOutput, ShardLoadError> {
    let index_name = index.to_string();
    let matching: Vec<&PathBuf> = jsons_to_merge
        .iter()
        .filter(|path| {
            path.file_name().is_some_and(|name| name == "output.json")
                && parent_name(path).is_some_and(|parent| {
                    parent == index_name || Some(parent.as_str()) == task_id
                })
        })
        .collect();

    let path = match matching.as_slice() {
        [] => {
            let _ = writeln!(out, "shard {} test output missing", index);
            return Err(ShardLoadError::Missing(index));
        }
        [path] => *path,
        _ => {
            let _ = writeln!(out, "duplicate test output for shard {}", index);
            return Err(ShardLoadError::Duplicated(index));
        }
    };

    match read_output(path, size_limit) {
        Ok(output) => Ok(output),
        Err(ReadFailure::TooLarge(size)) => {
            let _ = writeln!(
                out,
                "output.json is {} bytes. Max size is {}",
                size, size_limit
            );
            Err(ShardLoadError::TooLarge(index))
        }
        Err(ReadFailure::Invalid(reason)) => {
            let _ = writeln!(out, "Missing or invalid gtest JSON file: {}", path.display());
            let _ = writeln!(out, "{}", reason);
            Err(ShardLoadError::Missing(index))
        }
    }
}

enum ReadFailure {
    TooLarge(u64),
    Invalid(String),
}

fn read_output(path: &Path, size_limit: u64) -> Result<ShardOutput, ReadFailure> {
    let size = std::fs::metadata(path)
        .map_err(|e| ReadFailure::Invalid(format!("IOError: {}", e)))?
        .len();
    if size > size_limit {
        return Err(ReadFailure::TooLarge(size));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ReadFailure::Invalid(format!("IOError: {}", e)))?;
    serde_json::from_str(&content).map_err(|e| ReadFailure::Invalid(format!("ValueError: {}", e)))
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
}
