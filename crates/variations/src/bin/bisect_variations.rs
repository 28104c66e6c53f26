//! bisect_variations - find the experiment that causes a browser issue

use anyhow::{Context, Result};
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use std::path::PathBuf;
use tracing::info;
use variations::{
    bisect, ensure_command_line_length, locate_browser, BisectOutcome, ProcessLauncher,
    PromptOracle, MAX_ARGS_LENGTH_WIN,
};

#[derive(Parser)]
#[command(name = "bisect_variations")]
#[command(about = "Bisect a variations file against a reproducible browser issue", long_about = None)]
#[command(version)]
struct Cli {
    /// Browser channel to launch
    #[arg(short, long, default_value = "stable")]
    browser: String,

    /// Extra browser arguments, separated by whitespace
    #[arg(long, default_value = "")]
    extra_browser_args: String,

    /// URL to open on launch
    #[arg(long)]
    url: Option<String>,

    /// Variations file from chrome://version/?show-variations-cmd
    #[arg(long)]
    input_file: PathBuf,

    /// Directory for intermediate split files (defaults to the input's directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let browser_path = locate_browser(&cli.browser)?;
    let output_dir = match &cli.output_dir {
        Some(dir) => dir.clone(),
        None => cli
            .input_file
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let runs = if cfg!(target_os = "windows") {
        ensure_command_line_length(&cli.input_file, &output_dir, MAX_ARGS_LENGTH_WIN)?
    } else {
        vec![cli.input_file.clone()]
    };

    let extra_browser_args: Vec<String> = cli
        .extra_browser_args
        .split_whitespace()
        .map(String::from)
        .collect();
    let launcher = ProcessLauncher {
        browser_path,
        url: cli.url.clone(),
    };
    let stdin = std::io::stdin();
    let mut oracle = PromptOracle::new(stdin.lock(), std::io::stdout());

    if bisect(&launcher, &mut oracle, &extra_browser_args, runs, &output_dir).await?
        == BisectOutcome::Quit
    {
        info!("bisection stopped by user");
    }
    Ok(())
}
