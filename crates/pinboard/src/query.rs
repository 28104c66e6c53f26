//! Parallel BigQuery queries through the `bq` command line tool.
//!
//! Each query runs in its own `bq` process with the SQL on stdin. Starts are
//! staggered since a burst of queries trips the account's rate limit. When
//! one query is rate limited anyway the whole batch is torn down and rerun.

use crate::error::PinboardError;
use crate::Result;
use crtools_core::{shell_join, ToolCommand, ToolRunner};
use futures::future::try_join_all;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const MAX_QUERY_TRIES: u32 = 3;
pub const QUERY_DELAY: Duration = Duration::from_secs(2);
const MAX_ROWS: u64 = (1 << 31) - 1;

/// How `bq` is invoked.
#[derive(Debug, Clone)]
pub struct BigQuery {
    pub bq: String,
    pub project: String,
    pub batch: bool,
    /// `--parameter=name:TYPE:value` triples.
    pub parameters: Vec<(String, String, String)>,
    /// Gap between consecutive query starts.
    pub delay: Duration,
}

impl BigQuery {
    pub fn new(project: impl Into<String>) -> Self {
        BigQuery {
            bq: "bq".to_string(),
            project: project.into(),
            batch: true,
            parameters: Vec::new(),
            delay: QUERY_DELAY,
        }
    }

    /// The `bq query` command line. The query itself goes on stdin.
    pub fn command(&self) -> Vec<String> {
        let mut cmd = vec![
            self.bq.clone(),
            "query".to_string(),
            format!("--max_rows={}", MAX_ROWS),
            "--format=json".to_string(),
            format!("--project_id={}", self.project),
            "--use_legacy_sql=false".to_string(),
        ];
        if self.batch {
            cmd.push("--batch".to_string());
        }
        for (name, kind, value) in &self.parameters {
            cmd.push(format!("--parameter={}:{}:{}", name, kind, value));
        }
        cmd
    }

    async fn run_one(&self, index: usize, query: &str) -> Result<String> {
        tokio::time::sleep(self.delay * index as u32).await;
        let command = ToolCommand::new("bq query", self.command()).stdin(query.as_bytes());
        let output = ToolRunner::run(&command).await?;
        if output.passed() {
            return Ok(output.stdout);
        }
        if output.stdout.contains("Exceeded rate limits") {
            return Err(PinboardError::RateLimited);
        }
        Err(PinboardError::Query {
            command: shell_join(&command.command),
            stdout: output.stdout,
        })
    }

    /// Run every query and return all their rows, in query order.
    pub async fn run(&self, queries: &[String]) -> Result<Vec<Value>> {
        let mut attempt = 0;
        let outputs = loop {
            if attempt >= MAX_QUERY_TRIES {
                return Err(PinboardError::TooManyQueryAttempts);
            }
            attempt += 1;
            // A failed query drops the rest, killing their processes.
            let batch = queries
                .iter()
                .enumerate()
                .map(|(index, query)| self.run_one(index, query));
            match try_join_all(batch).await {
                Ok(outputs) => break outputs,
                Err(PinboardError::RateLimited) => {
                    warn!("Query hit rate limit, retrying");
                }
                Err(err) => return Err(err),
            }
        };

        let mut rows = Vec::new();
        for output in outputs {
            match serde_json::from_str::<Value>(&output)? {
                Value::Array(values) => rows.extend(values),
                other => rows.push(other),
            }
        }
        debug!(rows = rows.len(), "queries done");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_bq(dir: &std::path::Path, script: &str) -> BigQuery {
        let path = dir.join("bq");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        BigQuery {
            bq: path.display().to_string(),
            delay: Duration::ZERO,
            ..BigQuery::new("chrome-unexpected-pass-data")
        }
    }

    #[test]
    fn test_command() {
        let mut bq = BigQuery::new("my-project");
        bq.parameters
            .push(("num_builds".to_string(), "INT64".to_string(), "5".to_string()));
        assert_eq!(
            bq.command(),
            vec![
                "bq",
                "query",
                "--max_rows=2147483647",
                "--format=json",
                "--project_id=my-project",
                "--use_legacy_sql=false",
                "--batch",
                "--parameter=num_builds:INT64:5",
            ]
        );
    }

    #[tokio::test]
    async fn test_rows_are_combined() {
        let dir = tempfile::tempdir().unwrap();
        // Echo the query back as a one-row result.
        let bq = fake_bq(dir.path(), "#!/bin/sh\nprintf '[{\"q\": \"%s\"}]' \"$(cat)\"\n");
        let rows = bq
            .run(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(rows, vec![serde_json::json!({"q": "one"}), serde_json::json!({"q": "two"})]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("limited");
        let script = format!(
            "#!/bin/sh\ncat > /dev/null\nif [ ! -e {0} ]; then touch {0}; echo 'Exceeded rate limits for foo.'; exit 1; fi\necho '[]'\n",
            marker.display()
        );
        let bq = fake_bq(dir.path(), &script);
        assert!(bq.run(&["select 1".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_three_rate_limits() {
        let dir = tempfile::tempdir().unwrap();
        let bq = fake_bq(
            dir.path(),
            "#!/bin/sh\ncat > /dev/null\necho run >> \"$(dirname \"$0\")/runs\"\necho 'Exceeded rate limits'\nexit 1\n",
        );
        let err = bq.run(&["select 1".to_string()]).await.unwrap_err();
        assert!(matches!(err, PinboardError::TooManyQueryAttempts));
        let runs = std::fs::read_to_string(dir.path().join("runs")).unwrap();
        assert_eq!(runs.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_other_failures_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bq = fake_bq(dir.path(), "#!/bin/sh\ncat > /dev/null\necho 'Resources exceeded: memory'\nexit 1\n");
        let err = bq.run(&["select 1".to_string()]).await.unwrap_err();
        assert!(matches!(err, PinboardError::Query { .. }));
    }
}
