//! The Swarming queries the triggerer needs, and the Go client that runs them.

use crate::error::TriggerError;
use crate::Result;
use async_trait::async_trait;
use crtools_core::{with_retries, ToolCommand, ToolRunner};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default Swarming server when none is given.
pub const DEFAULT_SERVER: &str = "chromium-swarm.appspot.com";

const A_WEEK_IN_SECONDS: i64 = 60 * 60 * 24 * 7;
const QUERY_ATTEMPTS: u32 = 3;
const QUERY_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A bot as listed by `swarming bots`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotInfo {
    pub bot_id: String,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub quarantined: bool,
    #[serde(default)]
    pub maintenance_msg: Option<String>,
}

impl BotInfo {
    /// Dead, quarantined and overheating bots are not alive. Other
    /// maintenance is short enough to wait out.
    pub fn is_alive(&self) -> bool {
        !self.is_dead
            && !self.quarantined
            && !self
                .maintenance_msg
                .as_deref()
                .is_some_and(|msg| msg.contains("Device temperature"))
    }
}

/// A task as listed by `swarming tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInfo {
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskInfo {
    /// The bot that ran the task, from `bot_id` or an `id:` tag.
    pub fn bot_id(&self) -> Option<&str> {
        self.bot_id.as_deref().or_else(|| {
            self.tags
                .iter()
                .find_map(|tag| tag.strip_prefix("id:"))
        })
    }
}

/// Swarming operations used by the perf triggerer.
#[async_trait]
pub trait SwarmingApi: Send + Sync {
    /// Bots matching every dimension.
    async fn list_bots(
        &self,
        server: &str,
        dimensions: &BTreeMap<String, String>,
    ) -> Result<Vec<BotInfo>>;

    /// The most recent tasks (newest first) carrying every tag, from the
    /// last week.
    async fn list_tasks(
        &self,
        server: &str,
        tags: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<TaskInfo>>;

    /// Run `swarming trigger` with python-style arguments. Returns the exit
    /// code; the task list lands in the file named by `--dump-json`.
    async fn trigger(&self, args: &[String]) -> Result<i32>;
}

/// [`SwarmingApi`] backed by the Go `swarming` binary.
pub struct GoSwarming {
    pub swarming: PathBuf,
}

impl GoSwarming {
    pub fn new(swarming: impl Into<PathBuf>) -> Self {
        GoSwarming {
            swarming: swarming.into(),
        }
    }

    async fn query<T: serde::de::DeserializeOwned>(&self, mut args: Vec<String>) -> Result<Vec<T>> {
        let result_json = tempfile::Builder::new()
            .prefix("swarming")
            .suffix(".json")
            .tempfile()?
            .into_temp_path();
        args.push("-json".to_string());
        args.push(result_json.display().to_string());

        let mut command = vec![self.swarming.display().to_string()];
        command.extend(args);
        info!("Running Go `swarming` with args: {:?}", &command[1..]);
        let config = ToolCommand::new("swarming", command);

        with_retries(
            "swarming query",
            QUERY_ATTEMPTS,
            QUERY_RETRY_DELAY,
            |_: &TriggerError| true,
            |_| async { Ok::<_, TriggerError>(ToolRunner::run(&config).await?.into_checked()?) },
        )
        .await?;
        read_list(&result_json)
    }
}

#[async_trait]
impl SwarmingApi for GoSwarming {
    async fn list_bots(
        &self,
        server: &str,
        dimensions: &BTreeMap<String, String>,
    ) -> Result<Vec<BotInfo>> {
        let mut args = vec!["bots".to_string(), "-server".to_string(), server.to_string()];
        for (key, value) in dimensions {
            args.push("-dimension".to_string());
            args.push(format!("{}={}", key, value));
        }
        self.query(args).await
    }

    async fn list_tasks(
        &self,
        server: &str,
        tags: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<TaskInfo>> {
        let mut args = vec!["tasks".to_string(), "-server".to_string(), server.to_string()];
        let mut tags = tags.to_vec();
        tags.sort();
        for tag in tags {
            args.push("-tag".to_string());
            args.push(tag);
        }
        // Queries on broad tags such as os:Mac are slow without a window.
        let start = chrono::Utc::now().timestamp() - A_WEEK_IN_SECONDS;
        args.push("-start".to_string());
        args.push(start.to_string());
        if let Some(limit) = limit {
            args.push("-limit".to_string());
            args.push(limit.to_string());
        }
        self.query(args).await
    }

    async fn trigger(&self, args: &[String]) -> Result<i32> {
        let go_args = convert_to_go_swarming_args(args);
        info!("Running Go `swarming` with args: {:?}", go_args);
        let mut command = vec![self.swarming.display().to_string()];
        command.extend(go_args);
        Ok(ToolRunner::status(&ToolCommand::new("swarming trigger", command)).await?)
    }
}

/// Rewrite python client arguments for the Go client: `--swarming` becomes
/// `-server` and `--dimension k v` becomes `-dimension k=v`.
pub fn convert_to_go_swarming_args(args: &[String]) -> Vec<String> {
    let mut go_args = Vec::with_capacity(args.len());
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        i += 1;
        match arg {
            "--swarming" => go_args.push("-server".to_string()),
            "--dimension" if i + 1 < args.len() => {
                go_args.push(arg.to_string());
                go_args.push(format!("{}={}", args[i], args[i + 1]));
                i += 2;
            }
            _ => go_args.push(arg.to_string()),
        }
    }
    go_args
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

fn read_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match read_json::<serde_json::Value>(path)? {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(TriggerError::from))
            .collect(),
        // Empty results come back as `{}` from some client versions.
        serde_json::Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        other => Err(TriggerError::UnexpectedOutput(other.to_string())),
    }
}
