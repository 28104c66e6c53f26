//! Locating the last commit of a day on origin/master.

use crate::error::PinboardError;
use crate::time::{end_of_day, isoformat, to_pacific};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use crtools_core::{ToolCommand, ToolRunner};
use std::path::PathBuf;
use tracing::info;

/// A commit and its time, ISO 8601 in Pacific time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub revision: String,
    pub timestamp: String,
}

/// The git queries pinboard needs.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Bring origin/master up to date.
    async fn fetch(&self) -> Result<()>;

    /// Latest origin/master commit within the bounds, if any.
    async fn find_commit(
        &self,
        before: Option<&DateTime<FixedOffset>>,
        after: Option<&DateTime<FixedOffset>>,
    ) -> Result<Option<Commit>>;
}

/// Arguments of the `git log` that finds a commit.
pub fn find_commit_args(
    before: Option<&DateTime<FixedOffset>>,
    after: Option<&DateTime<FixedOffset>>,
) -> Vec<String> {
    let mut args: Vec<String> = ["git", "log", "--max-count", "1", "--format=format:%H:%ct"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(before) = before {
        args.push("--before".to_string());
        args.push(isoformat(before));
    }
    if let Some(after) = after {
        args.push("--after".to_string());
        args.push(isoformat(after));
    }
    args.push("origin/master".to_string());
    args
}

/// A `<hash>:<epoch seconds>` line; empty output means no commit.
pub fn parse_commit_line(output: &str) -> Result<Option<Commit>> {
    let line = output.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let unexpected = || PinboardError::UnexpectedOutput {
        tool: "git log".to_string(),
        output: line.to_string(),
    };
    let (revision, seconds) = line.split_once(':').ok_or_else(unexpected)?;
    let seconds: i64 = seconds.parse().map_err(|_| unexpected())?;
    let time = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(unexpected)?;
    Ok(Some(Commit {
        revision: revision.to_string(),
        timestamp: isoformat(&to_pacific(&time)),
    }))
}

/// The last commit that landed on `date`. Fails when no commit has landed
/// after that day yet.
pub async fn last_commit_of_date(
    repo: &dyn Repository,
    date: &DateTime<FixedOffset>,
) -> Result<Commit> {
    info!("Fetching latest origin/master data.");
    repo.fetch().await?;

    let cutoff = end_of_day(date)?;
    info!("Finding latest commit before {}.", isoformat(&cutoff));
    if repo.find_commit(None, Some(&cutoff)).await?.is_none() {
        return Err(PinboardError::FutureDate(isoformat(&cutoff)));
    }
    repo.find_commit(Some(&cutoff), None)
        .await?
        .ok_or_else(|| PinboardError::UnexpectedOutput {
            tool: "git log".to_string(),
            output: format!("no commit before {}", isoformat(&cutoff)),
        })
}

/// [`Repository`] backed by the git checkout holding tools/perf.
pub struct GitCheckout {
    pub cwd: PathBuf,
}

impl GitCheckout {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        GitCheckout { cwd: cwd.into() }
    }
}

#[async_trait]
impl Repository for GitCheckout {
    async fn fetch(&self) -> Result<()> {
        let command = ToolCommand::from_args("git fetch", ["git", "fetch", "origin", "master"])
            .current_dir(&self.cwd);
        ToolRunner::check_output(&command).await?;
        Ok(())
    }

    async fn find_commit(
        &self,
        before: Option<&DateTime<FixedOffset>>,
        after: Option<&DateTime<FixedOffset>>,
    ) -> Result<Option<Commit>> {
        let command =
            ToolCommand::new("git log", find_commit_args(before, after)).current_dir(&self.cwd);
        parse_commit_line(&ToolRunner::check_output(&command).await?)
    }
}
