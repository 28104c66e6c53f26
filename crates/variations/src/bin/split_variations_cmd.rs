//! split_variations_cmd - split a variations command file in two

use anyhow::{Context, Result};
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use std::path::PathBuf;
use tracing::info;
use variations::split_variations_cmd_from_file;

#[derive(Parser)]
#[command(name = "split_variations_cmd")]
#[command(about = "Split a variations command line into two halves", long_about = None)]
#[command(version)]
struct Cli {
    /// File holding the output of chrome://version/?show-variations-cmd
    #[arg(short, long)]
    file: PathBuf,

    /// Directory for the split files (defaults to the input's directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

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

    let written = split_variations_cmd_from_file(&cli.file, cli.output_dir.as_deref())
        .with_context(|| format!("Failed to split {}", cli.file.display()))?;
    for path in written {
        info!(path = %path.display(), "wrote split");
    }
    Ok(())
}
