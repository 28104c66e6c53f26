//! dex - dex Java class files for an Android target

use anyhow::{Context, Result};
use clap::Parser;
use crtools_core::{expand_file_args, init_tracing, level_for, ChromiumPaths};
use dex_driver::{DexArgs, DexContext, ProcessDexer};
use tracing::Level;

/// Set to get debug logs and keep D8 flag files.
const DEBUG_ENV: &str = "DEX_DEBUG";

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let argv = expand_file_args(&argv).context("Failed to expand @FileArg arguments")?;
    let args = DexArgs::parse_from(argv);

    let level = if std::env::var_os(DEBUG_ENV).is_some() {
        Level::DEBUG
    } else {
        level_for(args.verbose)
    };
    init_tracing(args.json, level);

    let options = args.into_options()?;
    let java_home = ChromiumPaths::discover()
        .context("dex must run inside a Chromium checkout")?
        .java_home();

    let dexer = ProcessDexer;
    let context = DexContext::new(options, &java_home, &dexer);
    context
        .run()
        .await
        .with_context(|| format!("Failed to create {}", context.options.output.display()))?;
    Ok(())
}
