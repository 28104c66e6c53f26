//! In-memory Swarming fake (testing only)
//!
//! `FakeSwarming` answers bot and task queries from canned data and records
//! every trigger call, writing a one-task result to its `--dump-json` file.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::TriggerError;
use crate::swarming::{BotInfo, SwarmingApi, TaskInfo};
use crate::Result;

#[derive(Debug, Default)]
pub struct FakeSwarming {
    bots: Vec<BotInfo>,
    task_responses: Mutex<VecDeque<Vec<TaskInfo>>>,
    /// Fail every task query that carries a `shard:` tag.
    pub fail_sharded_queries: bool,
    /// Exit code returned by `trigger`.
    pub trigger_exit_code: i32,
    task_queries: Mutex<Vec<Vec<String>>>,
    triggers: Mutex<Vec<Vec<String>>>,
}

impl FakeSwarming {
    /// `task_responses` answer task queries in order; an exhausted queue
    /// answers with no tasks.
    pub fn new(bots: Vec<BotInfo>, task_responses: Vec<Vec<TaskInfo>>) -> Self {
        FakeSwarming {
            bots,
            task_responses: Mutex::new(task_responses.into()),
            ..Default::default()
        }
    }

    /// Tags of every task query, in call order.
    pub fn task_queries(&self) -> Vec<Vec<String>> {
        self.task_queries.lock().unwrap().clone()
    }

    /// Arguments of every trigger call, in call order.
    pub fn triggers(&self) -> Vec<Vec<String>> {
        self.triggers.lock().unwrap().clone()
    }

    /// `shard -> bot id` read back from the trigger arguments.
    pub fn triggered_shard_to_bot(&self) -> BTreeMap<usize, String> {
        let mut triggered = BTreeMap::new();
        for args in self.triggers() {
            let bot = args
                .iter()
                .position(|arg| arg == "id")
                .and_then(|i| args.get(i + 1))
                .cloned();
            let shard = args
                .iter()
                .find_map(|arg| arg.strip_prefix("shard:"))
                .and_then(|shard| shard.parse().ok());
            if let (Some(shard), Some(bot)) = (shard, bot) {
                triggered.insert(shard, bot);
            }
        }
        triggered
    }
}

#[async_trait]
impl SwarmingApi for FakeSwarming {
    async fn list_bots(
        &self,
        _server: &str,
        _dimensions: &BTreeMap<String, String>,
    ) -> Result<Vec<BotInfo>> {
        Ok(self.bots.clone())
    }

    async fn list_tasks(
        &self,
        _server: &str,
        tags: &[String],
        _limit: Option<u32>,
    ) -> Result<Vec<TaskInfo>> {
        self.task_queries.lock().unwrap().push(tags.to_vec());
        if self.fail_sharded_queries && tags.iter().any(|tag| tag.starts_with("shard:")) {
            return Err(TriggerError::UnexpectedOutput("deadline exceeded".to_string()));
        }
        Ok(self
            .task_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn trigger(&self, args: &[String]) -> Result<i32> {
        let mut triggers = self.triggers.lock().unwrap();
        let task_id = format!("f{}", triggers.len());
        triggers.push(args.to_vec());
        if let Some(path) = args
            .iter()
            .position(|arg| arg == "--dump-json")
            .and_then(|i| args.get(i + 1))
        {
            let result = json!({"tasks": [{"request": {"task_id": task_id}}]});
            std::fs::write(path, result.to_string())?;
        }
        Ok(self.trigger_exit_code)
    }
}
