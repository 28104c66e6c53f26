//! Triggering one Swarming task per shard.

use crate::affinity::{assign_dynamic_shards, assign_with_soft_affinity, Bot};
use crate::args::{
    modify_args, remove_swarming_dimension, swarming_dimensions, swarming_server, BotConfig,
};
use crate::error::TriggerError;
use crate::swarming::{read_json, SwarmingApi};
use crate::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Options shared by every trigger script.
#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    /// JSON list of dimension sets; one bot config per entry.
    pub multiple_trigger_configs: Option<String>,
    /// Where the merged task list goes.
    pub dump_json: PathBuf,
    pub shards: usize,
    /// Trigger only this shard.
    pub shard_index: Option<usize>,
    pub use_dynamic_shards: bool,
}

impl TriggerOptions {
    pub fn indices_to_trigger(&self) -> Vec<usize> {
        match self.shard_index {
            Some(index) => vec![index],
            None => (0..self.shards).collect(),
        }
    }
}

/// Triggers perf shards with soft device affinity.
pub struct PerfDeviceTriggerer<'a> {
    api: &'a dyn SwarmingApi,
    server: String,
    dimensions: BTreeMap<String, String>,
    eligible: Vec<Bot>,
    sharded_query_failed: bool,
}

impl<'a> PerfDeviceTriggerer<'a> {
    /// Look up the bots matching the dimensions in `swarming_args`, unless
    /// explicit bot configs were given.
    pub async fn new(
        api: &'a dyn SwarmingApi,
        options: &TriggerOptions,
        swarming_args: &[String],
        default_server: &str,
    ) -> Result<PerfDeviceTriggerer<'a>> {
        let mut triggerer = PerfDeviceTriggerer {
            api,
            server: swarming_server(swarming_args).unwrap_or_else(|| default_server.to_string()),
            dimensions: swarming_dimensions(swarming_args),
            eligible: Vec::new(),
            sharded_query_failed: false,
        };
        if options.multiple_trigger_configs.is_none() {
            triggerer.eligible = triggerer.query_eligible_bots().await?;
        }
        Ok(triggerer)
    }

    /// Bots matching the dimensions, in listing order.
    pub fn eligible_bots(&self) -> &[Bot] {
        &self.eligible
    }

    async fn query_eligible_bots(&self) -> Result<Vec<Bot>> {
        let listed = self.api.list_bots(&self.server, &self.dimensions).await?;
        let mut bots: Vec<Bot> = Vec::with_capacity(listed.len());
        for info in listed {
            let bot = Bot::new(info.bot_id.clone(), info.is_alive());
            match bots.iter_mut().find(|existing| existing.id == bot.id) {
                Some(existing) => *existing = bot,
                None => bots.push(bot),
            }
        }
        Ok(bots)
    }

    /// The bot that most recently ran `shard_index` with these dimensions.
    ///
    /// Tag queries that include the shard can time out the first time they
    /// are made; after one failure every later query drops the shard tag.
    async fn last_shard_bot(&mut self, shard_index: usize) -> Result<Option<String>> {
        let mut tags: Vec<String> = self
            .dimensions
            .iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect();
        tags.sort();
        let mut with_shard = tags.clone();
        with_shard.push(format!("shard:{}", shard_index));
        with_shard.sort();

        let mut tasks = None;
        if !self.sharded_query_failed {
            match self.api.list_tasks(&self.server, &with_shard, Some(1)).await {
                Ok(found) => tasks = Some(found),
                Err(err) => {
                    warn!("sharded task query failed, retrying without the shard tag: {}", err);
                    self.sharded_query_failed = true;
                }
            }
        }
        let tasks = match tasks {
            Some(tasks) => tasks,
            None => self.api.list_tasks(&self.server, &tags, Some(1)).await?,
        };
        Ok(tasks
            .first()
            .and_then(|task| task.bot_id())
            .map(str::to_string))
    }

    /// The dimension sets to choose from: the explicit configs, or one
    /// `{id: <bot>}` per eligible bot.
    pub fn bot_configs(&self, options: &TriggerOptions) -> Result<Vec<BotConfig>> {
        match &options.multiple_trigger_configs {
            Some(raw) => parse_bot_configs(raw),
            None => Ok(self
                .eligible
                .iter()
                .map(|bot| BotConfig::from([("id".to_string(), bot.id.clone())]))
                .collect()),
        }
    }

    /// `(shard index, bot config index)` for every shard to trigger.
    pub async fn select_config_indices(
        &mut self,
        options: &TriggerOptions,
        configs: &[BotConfig],
    ) -> Result<Vec<(usize, usize)>> {
        let indices = options.indices_to_trigger();
        if options.multiple_trigger_configs.is_some() {
            // Each config is exactly one bot; trigger regardless of health.
            return Ok(indices
                .into_iter()
                .enumerate()
                .map(|(config, shard)| (shard, config))
                .collect());
        }

        let selected = if options.use_dynamic_shards {
            let mut rng = rand::rng();
            assign_dynamic_shards(&self.eligible, &mut rng)
        } else {
            if indices.len() > self.eligible.len() {
                return Err(TriggerError::NotEnoughBots {
                    shards: indices.len(),
                    bots: self.eligible.len(),
                });
            }
            let mut previous = Vec::with_capacity(indices.len());
            for shard in indices {
                previous.push((shard, self.last_shard_bot(shard).await?));
            }
            assign_with_soft_affinity(&self.eligible, &previous)?
        };

        selected
            .into_iter()
            .map(|(shard, bot)| {
                configs
                    .iter()
                    .position(|config| config.get("id") == Some(&bot.id))
                    .map(|index| (shard, index))
                    .ok_or(TriggerError::UnknownBot(bot.id))
            })
            .collect()
    }

    /// Trigger every selected shard and write the merged task list to
    /// `options.dump_json`. Returns the first non-zero trigger exit code.
    pub async fn trigger_tasks(
        &mut self,
        options: &TriggerOptions,
        remaining: &[String],
    ) -> Result<i32> {
        debug!("init: {:?}", remaining);
        let configs = self.bot_configs(options)?;

        // Each shard gets its config's dimensions; drop the generic ones.
        let mut filtered = remaining.to_vec();
        for config in &configs {
            for key in config.keys() {
                filtered = remove_swarming_dimension(&filtered, key);
            }
        }
        debug!("After filtered: {:?}", filtered);

        let selected = self.select_config_indices(options, &configs).await?;
        let total_shards = if options.use_dynamic_shards {
            selected.len()
        } else {
            options.shards
        };

        let mut merged = Map::new();
        merged.insert("tasks".to_string(), Value::Object(Map::new()));
        for (shard_index, bot_index) in selected {
            let dump = tempfile::Builder::new()
                .prefix("base_trigger_dimensions")
                .suffix(".json")
                .tempfile()?
                .into_temp_path();
            let args = modify_args(
                &filtered,
                configs.get(bot_index),
                shard_index,
                total_shards,
                &dump.display().to_string(),
            );
            debug!("Before calling swarming: {:?}", args);
            let ret = self.api.trigger(&args).await?;
            if ret != 0 {
                eprintln!("Failed to trigger a task, aborting");
                return Ok(ret);
            }
            let result: Value = read_json(&dump)?;
            merge_trigger_result(&mut merged, &result, shard_index, total_shards);
        }

        std::fs::write(&options.dump_json, serde_json::to_string(&merged)?)?;
        info!(path = %options.dump_json.display(), "wrote trigger results");
        Ok(0)
    }
}

/// Parse `--multiple-trigger-configs`: a non-empty JSON list of objects.
pub fn parse_bot_configs(raw: &str) -> Result<Vec<BotConfig>> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        TriggerError::InvalidBotConfigs(format!(
            "Error while parsing JSON from bot config string {}: {}",
            raw, e
        ))
    })?;
    let Value::Array(entries) = value else {
        return Err(TriggerError::InvalidBotConfigs(format!(
            "Bot configurations must be a list, were: {}",
            raw
        )));
    };
    if entries.is_empty() {
        return Err(TriggerError::InvalidBotConfigs(
            "Bot configuration list must have at least one entry".to_string(),
        ));
    }
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect()),
            _ => Err(TriggerError::InvalidBotConfigs(
                "Bot configurations must all be dictionaries".to_string(),
            )),
        })
        .collect()
}

/// Fold one `swarming trigger` result into `merged["tasks"]`, keyed by
/// `<task_id>:<shard>:<shards>`.
pub fn merge_trigger_result(
    merged: &mut Map<String, Value>,
    result: &Value,
    shard_index: usize,
    shards: usize,
) {
    let Some(Value::Object(tasks)) = merged.get_mut("tasks") else {
        return;
    };
    let Some(triggered) = result.get("tasks").and_then(Value::as_array) else {
        return;
    };
    for task in triggered {
        let Some(Value::Object(request)) = task.get("request") else {
            continue;
        };
        let Some(task_id) = request.get("task_id").and_then(Value::as_str) else {
            continue;
        };
        let mut entry = request.clone();
        if let Some(invocation) = task.pointer("/task_result/resultdb_info/invocation") {
            entry.insert("invocation".to_string(), invocation.clone());
        }
        entry.insert("shard_index".to_string(), Value::from(shard_index));
        tasks.insert(
            format!("{}:{}:{}", task_id, shard_index, shards),
            Value::Object(entry),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bot_configs() {
        let configs = parse_bot_configs(r#"[{"id": "build1", "pool": "perf"}]"#).unwrap();
        assert_eq!(configs[0]["id"], "build1");
        assert_eq!(configs[0]["pool"], "perf");

        for bad in ["not json", r#"{"id": "x"}"#, "[]", r#"["x"]"#] {
            assert!(matches!(
                parse_bot_configs(bad),
                Err(TriggerError::InvalidBotConfigs(_))
            ));
        }
    }

    #[test]
    fn test_merge_trigger_result() {
        let mut merged = Map::new();
        merged.insert("tasks".to_string(), json!({}));
        let result = json!({
            "tasks": [{
                "request": {"task_id": "abc", "name": "benchmark"},
                "task_result": {"resultdb_info": {"invocation": "invocations/task-abc"}},
            }]
        });
        merge_trigger_result(&mut merged, &result, 2, 5);
        assert_eq!(
            Value::Object(merged),
            json!({"tasks": {"abc:2:5": {
                "task_id": "abc",
                "name": "benchmark",
                "invocation": "invocations/task-abc",
                "shard_index": 2,
            }}})
        );
    }

    #[test]
    fn test_indices_to_trigger() {
        let mut options = TriggerOptions {
            shards: 3,
            ..Default::default()
        };
        assert_eq!(options.indices_to_trigger(), vec![0, 1, 2]);
        options.shard_index = Some(1);
        assert_eq!(options.indices_to_trigger(), vec![1]);
    }
}
