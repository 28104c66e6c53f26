//! standard_gtest_merge - merge per-shard gtest JSON into one result file

use anyhow::{Context, Result};
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use gtest_merge::{standard_gtest_merge, OUTPUT_JSON_SIZE_LIMIT};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "standard_gtest_merge")]
#[command(about = "Merge sharded gtest JSON results", long_about = None)]
#[command(version)]
struct Cli {
    /// Build properties as JSON (accepted for recipe compatibility)
    #[arg(long)]
    build_properties: Option<String>,

    /// Swarming summary describing each shard
    #[arg(long)]
    summary_json: PathBuf,

    /// Where to write the merged results
    #[arg(short = 'o', long)]
    output_json: PathBuf,

    /// Largest shard output.json accepted, in bytes
    #[arg(long, env = "GTEST_OUTPUT_SIZE_LIMIT", default_value_t = OUTPUT_JSON_SIZE_LIMIT)]
    size_limit: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Shard output files
    jsons_to_merge: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let mut stdout = std::io::stdout();
    standard_gtest_merge(
        &cli.output_json,
        &cli.summary_json,
        &cli.jsons_to_merge,
        cli.size_limit,
        &mut stdout,
    )
    .with_context(|| format!("Failed to write {}", cli.output_json.display()))
}
