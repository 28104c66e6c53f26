//! perf-trigger - Swarming triggering with soft device affinity
//!
//! Perf benchmarks compare a device against its own history, so each shard
//! should keep running on the same bot. The triggerer asks Swarming which
//! bots match the requested dimensions and which bot last ran each shard,
//! then triggers one task per shard with an explicit `id` dimension and a
//! `shard:<i>` tag for the next run to find.
//!
//! - [`affinity`]: shard to bot assignment
//! - [`args`]: editing `swarming trigger` argument lists
//! - [`swarming`]: the Swarming queries, via the Go client
//! - [`triggerer`]: the trigger loop and merged dump JSON

pub mod affinity;
pub mod args;
pub mod error;
pub mod fakes;
pub mod swarming;
pub mod triggerer;

pub use affinity::{assign_dynamic_shards, assign_with_soft_affinity, Bot};
pub use args::{modify_args, split_known_args, BotConfig};
pub use error::TriggerError;
pub use swarming::{convert_to_go_swarming_args, BotInfo, GoSwarming, SwarmingApi, TaskInfo};
pub use triggerer::{parse_bot_configs, PerfDeviceTriggerer, TriggerOptions};

/// Result alias used across perf-trigger.
pub type Result<T> = std::result::Result<T, TriggerError>;
