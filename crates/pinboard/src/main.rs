//! pinboard - run daily pinpoint jobs and publish their aggregated results

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crtools_core::{init_tracing, level_for, ChromiumPaths};
use pinboard::logging::init_logging;
use pinboard::time::{isoformat, now, parse_date, yesterday};
use pinboard::{Action, BigQuery, CacheDir, GitCheckout, Gsutil, PinboardContext, PinpointCli};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Lets the last cloud storage copy settle before the process exits.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliAction {
    Start,
    Collect,
    Upload,
    Auto,
}

#[derive(Parser)]
#[command(name = "pinboard")]
#[command(about = "Run daily pinpoint jobs and upload their aggregated results", long_about = None)]
#[command(version)]
struct Cli {
    /// 'start' pinpoint jobs, 'collect' job results, 'upload' aggregated
    /// data, or 'auto' to do all in sequence
    #[arg(value_enum, value_name = "ACTION", required_unless_present = "bq_query")]
    actions: Vec<CliAction>,

    /// Run jobs for the last commit landed on this date (MTV time).
    /// Defaults to yesterday
    #[arg(long)]
    date: Option<String>,

    /// Local cache (defaults to tools/perf/_cached_data/pinboard)
    #[arg(long, env = "PINBOARD_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Pinpoint job configs (defaults to tools/perf/cli_tools/pinboard/job_configs.json)
    #[arg(long)]
    job_configs: Option<PathBuf>,

    /// Run the BigQuery SQL in these files in parallel and print the rows
    #[arg(long, value_name = "SQL_FILE")]
    bq_query: Vec<PathBuf>,

    /// Billing project for --bq-query
    #[arg(long, default_value = "chrome-unexpected-pass-data")]
    bq_project: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

async fn run_queries(cli: &Cli) -> Result<()> {
    init_tracing(cli.json, level_for(cli.verbose));
    let queries = cli
        .bq_query
        .iter()
        .map(|path| {
            std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let rows = BigQuery::new(cli.bq_project.clone()).run(&queries).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if !cli.bq_query.is_empty() {
        run_queries(&cli).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let tools_perf = ChromiumPaths::discover()
        .context("pinboard runs inside a Chromium checkout")?
        .tools_perf();
    let cache = cli
        .cache_dir
        .clone()
        .map(CacheDir::new)
        .unwrap_or_else(|| CacheDir::in_tools_perf(&tools_perf));
    cache.create()?;
    init_logging(cli.json, level_for(cli.verbose), &cache.root);

    let date = match &cli.date {
        Some(date) => parse_date(date)?,
        None => yesterday(),
    };
    let actions: Vec<Action> = if cli.actions.contains(&CliAction::Auto) {
        info!("=== auto run for {} ===", isoformat(&date));
        Action::ALL.to_vec()
    } else {
        cli.actions
            .iter()
            .filter_map(|action| match action {
                CliAction::Start => Some(Action::Start),
                CliAction::Collect => Some(Action::Collect),
                CliAction::Upload => Some(Action::Upload),
                CliAction::Auto => None,
            })
            .collect()
    };

    let job_configs = cli.job_configs.clone().unwrap_or_else(|| {
        tools_perf
            .join("cli_tools")
            .join("pinboard")
            .join("job_configs.json")
    });
    let pinpoint = PinpointCli::new(&tools_perf);
    let repo = GitCheckout::new(&tools_perf);
    let storage = Gsutil::default();
    let pinboard = PinboardContext::new(cache, job_configs, &pinpoint, &repo, &storage);

    let result = pinboard.run(&actions, &date, &now()).await;
    tokio::time::sleep(SETTLE_DELAY).await;
    result?;
    Ok(ExitCode::SUCCESS)
}
