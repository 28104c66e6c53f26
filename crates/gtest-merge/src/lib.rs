//! gtest-merge - merge sharded gtest results
//!
//! A Swarming task that runs a gtest binary across N shards leaves one
//! `output.json` per shard and a `summary.json` describing each shard's
//! state. [`merge_shard_results`] folds them into the single JSON object the
//! recipes consume, recording which shards went missing.

pub mod annotations;
pub mod error;
pub mod shard;

pub use annotations::emit_warning;
pub use error::MergeError;
pub use shard::{load_shard_json, ShardLoadError, ShardOutput, OUTPUT_JSON_SIZE_LIMIT};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result alias used across gtest-merge.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Tag added to `global_tags` when shards are missing.
pub const UNRELIABLE_RESULTS: &str = "UNRELIABLE_RESULTS";

const MISSING_SHARDS_MSG: &str = "Missing results from the following shard(s): {}

This can happen in following cases:
  * Test failed to start (missing *.dll/*.so dependency for example)
  * Test crashed or hung
  * Task expired because there are not enough bots available and are all used
  * Swarming service experienced problems

Please examine logs to figure out what happened.
";

/// The merged result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedResults {
    pub all_tests: Vec<String>,
    pub disabled_tests: Vec<String>,
    pub global_tags: Vec<String>,
    pub missing_shards: Vec<usize>,
    pub per_iteration_data: Vec<Map<String, Value>>,
    pub swarming_summary: Value,
    pub test_locations: Map<String, Value>,
}

/// The fields of a Swarming shard summary the merge looks at.
#[derive(Debug, Clone, Default, Deserialize)]
struct ShardSummary {
    state: Option<String>,
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwarmingSummary {
    shards: Vec<Option<ShardSummary>>,
}

/// Merge shard outputs as described by the Swarming summary at `summary_json`.
///
/// Returns `None` when the summary is missing or unreadable; a warning is
/// emitted to `out` in that case. Every diagnostic goes to `out`.
pub fn merge_shard_results(
    summary_json: &Path,
    jsons_to_merge: &[PathBuf],
    size_limit: u64,
    out: &mut dyn Write,
) -> Result<Option<MergedResults>> {
    let Some((raw_summary, summary)) = read_summary(summary_json) else {
        emit_warning(
            out,
            "summary.json is missing or can not be read",
            Some("Something is seriously wrong with swarming client or the bot."),
        )?;
        return Ok(None);
    };

    let mut all_tests = BTreeSet::new();
    let mut disabled_tests = BTreeSet::new();
    let mut global_tags = BTreeSet::new();
    let mut missing_shards = Vec::new();
    let mut per_iteration_data: Vec<Map<String, Value>> = Vec::new();
    let mut test_locations = Map::new();

    for (index, shard) in summary.shards.iter().enumerate() {
        let Some(shard) = shard else {
            missing_shards.push(index);
            continue;
        };
        report_state(index, shard.state.as_deref(), out)?;

        match load_shard_json(index, shard.task_id.as_deref(), jsons_to_merge, size_limit, out) {
            Ok(output) => {
                debug!(shard = index, tests = output.all_tests.len(), "merging shard");
                all_tests.extend(output.all_tests);
                disabled_tests.extend(output.disabled_tests);
                global_tags.extend(output.global_tags);
                for (test, location) in output.test_locations {
                    test_locations.entry(test).or_insert(location);
                }
                merge_iterations(&mut per_iteration_data, output.per_iteration_data);
            }
            Err(reason) => {
                missing_shards.push(index);
                writeln!(out, "No result was found: {}", reason)?;
            }
        }
    }

    if !missing_shards.is_empty() {
        let as_str = missing_shards
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        emit_warning(
            out,
            &format!("some shards did not complete: {}", as_str),
            Some(&MISSING_SHARDS_MSG.replace("{}", &as_str)),
        )?;
        global_tags.insert(UNRELIABLE_RESULTS.to_string());
    }

    Ok(Some(MergedResults {
        all_tests: all_tests.into_iter().collect(),
        disabled_tests: disabled_tests.into_iter().collect(),
        global_tags: global_tags.into_iter().collect(),
        missing_shards,
        per_iteration_data,
        swarming_summary: raw_summary,
        test_locations,
    }))
}

/// Merge and write the result file. A missing summary writes `null`.
pub fn standard_gtest_merge(
    output_json: &Path,
    summary_json: &Path,
    jsons_to_merge: &[PathBuf],
    size_limit: u64,
    out: &mut dyn Write,
) -> Result<()> {
    let merged = merge_shard_results(summary_json, jsons_to_merge, size_limit, out)?;
    std::fs::write(output_json, serde_json::to_string(&merged)?)?;
    Ok(())
}

fn read_summary(path: &Path) -> Option<(Value, SwarmingSummary)> {
    let content = std::fs::read_to_string(path).ok()?;
    let raw: Value = serde_json::from_str(&content).ok()?;
    let summary = SwarmingSummary::deserialize(&raw).ok()?;
    Some((raw, summary))
}

fn report_state(index: usize, state: Option<&str>, out: &mut dyn Write) -> Result<()> {
    match state {
        Some("COMPLETED") => {}
        Some("BOT_DIED") => writeln!(out, "Shard #{} had a Swarming internal failure", index)?,
        Some("EXPIRED") => writeln!(out, "There wasn't enough capacity to run your test")?,
        Some("TIMED_OUT") => writeln!(
            out,
            "Test runtime exceeded allocated time\n\
             Either it ran for too long (hard timeout) or it didn't produce \
             I/O for an extended period of time (I/O timeout)"
        )?,
        Some(other) => writeln!(out, "Invalid Swarming task state: {}", other)?,
        None => writeln!(out, "Invalid Swarming task state: None")?,
    }
    Ok(())
}

/// Merge iteration `i` of `incoming` into iteration `i` of `merged`; runs of
/// a test seen in both are concatenated.
fn merge_iterations(merged: &mut Vec<Map<String, Value>>, incoming: Vec<Map<String, Value>>) {
    for (i, iteration) in incoming.into_iter().enumerate() {
        if merged.len() <= i {
            merged.push(Map::new());
        }
        let target = &mut merged[i];
        for (test, runs) in iteration {
            match (target.get_mut(&test), runs) {
                (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
                (_, runs) => {
                    target.insert(test, runs);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn iteration(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_merge_iterations_concatenates_runs() {
        let mut merged = vec![iteration(json!({"A.a": [{"status": "FAILURE"}]}))];
        merge_iterations(
            &mut merged,
            vec![
                iteration(json!({"A.a": [{"status": "SUCCESS"}], "A.b": []})),
                iteration(json!({"A.c": [{"status": "SUCCESS"}]})),
            ],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[0]["A.a"],
            json!([{"status": "FAILURE"}, {"status": "SUCCESS"}])
        );
        assert_eq!(merged[0]["A.b"], json!([]));
        assert_eq!(merged[1]["A.c"], json!([{"status": "SUCCESS"}]));
    }

    #[test]
    fn test_report_state_messages() {
        let mut out = Vec::new();
        report_state(0, Some("COMPLETED"), &mut out).unwrap();
        assert!(out.is_empty());
        report_state(2, Some("BOT_DIED"), &mut out).unwrap();
        report_state(3, Some("PENDING"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Shard #2 had a Swarming internal failure"));
        assert!(text.contains("Invalid Swarming task state: PENDING"));
    }
}
