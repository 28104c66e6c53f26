//! perf_device_trigger - trigger perf shards with soft device affinity
//!
//! Flags this tool does not own are passed through to `swarming trigger`.

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use crtools_core::{init_tracing, level_for, ChromiumPaths};
use perf_trigger::swarming::DEFAULT_SERVER;
use perf_trigger::{split_known_args, GoSwarming, PerfDeviceTriggerer, TriggerOptions};
use std::path::PathBuf;
use std::process::ExitCode;

const VALUED_FLAGS: &[&str] = &[
    "--multiple-trigger-configs",
    "--multiple-dimension-script-verbose",
    "--dump-json",
    "--shards",
    "--shard-index",
    "--swarming-client",
    "--default-server",
];
const SWITCHES: &[&str] = &[
    "--use-dynamic-shards",
    "-v",
    "--verbose",
    "--json",
    "-h",
    "--help",
    "-V",
    "--version",
];

#[derive(Parser)]
#[command(name = "perf_device_trigger")]
#[command(about = "Trigger perf shards on Swarming with soft device affinity", long_about = None)]
#[command(version)]
struct Cli {
    /// Dimension sets to trigger on, as a JSON list of objects
    #[arg(long)]
    multiple_trigger_configs: Option<String>,

    /// Turn on verbose logging
    #[arg(long, default_value_t = false, value_parser = BoolishValueParser::new())]
    multiple_dimension_script_verbose: bool,

    /// Where to write the tasks triggered for each shard
    #[arg(long)]
    dump_json: PathBuf,

    /// How many shards to trigger
    #[arg(long, default_value_t = 1)]
    shards: usize,

    /// Trigger only this shard
    #[arg(long)]
    shard_index: Option<usize>,

    /// Ignore affinity and spread shards over every alive bot
    #[arg(long)]
    use_dynamic_shards: bool,

    /// Go swarming client (defaults to the checkout's tools/luci-go)
    #[arg(long, env = "SWARMING_CLIENT")]
    swarming_client: Option<PathBuf>,

    /// Server used when the trigger arguments name none
    #[arg(long, env = "SWARMING_SERVER", default_value = DEFAULT_SERVER)]
    default_server: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let argv: Vec<String> = std::env::args().collect();
    let (known, remaining) = split_known_args(argv.get(1..).unwrap_or(&[]), VALUED_FLAGS, SWITCHES);
    let cli = Cli::parse_from(argv.iter().take(1).chain(known.iter()));
    init_tracing(
        cli.json,
        level_for(cli.verbose || cli.multiple_dimension_script_verbose),
    );

    let swarming = match cli.swarming_client {
        Some(path) => path,
        None => ChromiumPaths::discover()
            .context("Set --swarming-client or run inside a Chromium checkout")?
            .swarming_go(),
    };
    let api = GoSwarming::new(swarming);
    let options = TriggerOptions {
        multiple_trigger_configs: cli.multiple_trigger_configs,
        dump_json: cli.dump_json,
        shards: cli.shards,
        shard_index: cli.shard_index,
        use_dynamic_shards: cli.use_dynamic_shards,
    };

    let mut triggerer =
        PerfDeviceTriggerer::new(&api, &options, &remaining, &cli.default_server).await?;
    let ret = triggerer.trigger_tasks(&options, &remaining).await?;
    Ok(ExitCode::from(u8::try_from(ret).unwrap_or(1)))
}
