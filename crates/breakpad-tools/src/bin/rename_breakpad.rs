//! rename_breakpad - file breakpad symbols under their module ids

use anyhow::{Context, Result};
use breakpad_tools::rename_breakpad_files;
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rename_breakpad")]
#[command(about = "Move breakpad files to <output-dir>/<MODULE ID>.breakpad", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory searched recursively for breakpad files
    #[arg(long)]
    input_dir: PathBuf,

    /// Directory the renamed files are moved to
    #[arg(long)]
    output_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;
    rename_breakpad_files(&cli.input_dir, &cli.output_dir)
        .with_context(|| format!("Failed to rename files in {}", cli.input_dir.display()))?;
    Ok(())
}
