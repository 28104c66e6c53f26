//! Pinpoint, through `pinpoint_cli`.

use crate::error::PinboardError;
use crate::Result;
use async_trait::async_trait;
use crtools_core::{ToolCommand, ToolRunner};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pinpoint operations used by pinboard.
#[async_trait]
pub trait PinpointApi: Send + Sync {
    /// Start a job from a JSON config file and return its id.
    async fn start_job(&self, config: &Path) -> Result<String>;

    /// Current status of each job, by id.
    async fn status(&self, ids: &[String]) -> Result<BTreeMap<String, String>>;

    /// Write the results of `ids` as CSV to `output`.
    async fn get_csv(&self, output: &Path, ids: &[String]) -> Result<()>;
}

/// The job id from `start-job` output, the last path segment of the job URL.
pub fn parse_job_id(output: &str) -> Result<String> {
    let output = output.trim();
    if !output.contains("https://pinpoint") {
        return Err(PinboardError::UnexpectedOutput {
            tool: "pinpoint start-job".to_string(),
            output: output.to_string(),
        });
    }
    Ok(output.rsplit('/').next().unwrap_or(output).to_string())
}

/// `id: status` lines from `status`.
pub fn parse_status(output: &str) -> Result<BTreeMap<String, String>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_once(": ")
                .map(|(id, status)| (id.to_string(), status.to_string()))
                .ok_or_else(|| PinboardError::UnexpectedOutput {
                    tool: "pinpoint status".to_string(),
                    output: line.to_string(),
                })
        })
        .collect()
}

/// [`PinpointApi`] backed by `vpython tools/perf/pinpoint_cli`.
pub struct PinpointCli {
    pub vpython: String,
    pub cli: PathBuf,
}

impl PinpointCli {
    pub fn new(tools_perf: &Path) -> Self {
        PinpointCli {
            vpython: "vpython".to_string(),
            cli: tools_perf.join("pinpoint_cli"),
        }
    }

    fn command(&self, args: &[String]) -> ToolCommand {
        let mut command = vec![self.vpython.clone(), self.cli.display().to_string()];
        command.extend(args.iter().cloned());
        ToolCommand::new("pinpoint_cli", command)
    }
}

#[async_trait]
impl PinpointApi for PinpointCli {
    async fn start_job(&self, config: &Path) -> Result<String> {
        let args = vec!["start-job".to_string(), config.display().to_string()];
        let output = ToolRunner::check_output(&self.command(&args)).await?;
        info!("{}", output.trim());
        parse_job_id(&output)
    }

    async fn status(&self, ids: &[String]) -> Result<BTreeMap<String, String>> {
        let mut args = vec!["status".to_string()];
        args.extend(ids.iter().cloned());
        parse_status(&ToolRunner::check_output(&self.command(&args)).await?)
    }

    async fn get_csv(&self, output: &Path, ids: &[String]) -> Result<()> {
        let mut args = vec![
            "get-csv".to_string(),
            "--output".to_string(),
            output.display().to_string(),
            "--".to_string(),
        ];
        args.extend(ids.iter().cloned());
        ToolRunner::check_output(&self.command(&args)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id() {
        let output = "Started: https://pinpoint.example.com/job/14b4c451f40000\n";
        assert_eq!(parse_job_id(output).unwrap(), "14b4c451f40000");
        assert!(parse_job_id("Error: quota exceeded").is_err());
    }

    #[test]
    fn test_parse_status() {
        let updates = parse_status("job5: running\njob6: failed\n").unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates["job5"], "running");
        assert_eq!(updates["job6"], "failed");
        assert!(parse_status("garbage").is_err());
    }
}
