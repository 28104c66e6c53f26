//! extract_breakpad - run dump_syms over a build directory

use anyhow::{bail, Context, Result};
use breakpad_tools::{
    ensure_dump_syms_binary, extract_breakpad_files, extract_breakpad_on_subtree,
    find_matching_module, DumpSymsBinary,
};
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "extract_breakpad")]
#[command(about = "Extract breakpad symbol files from symbol binaries", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to dump_syms (defaults to <build-dir>/dump_syms)
    #[arg(long)]
    dump_syms: Option<PathBuf>,

    /// Directory holding the symbol binaries
    #[arg(long)]
    build_dir: PathBuf,

    /// Where the breakpad files go
    #[arg(long, required_unless_present_any = ["subtree", "find_module"])]
    output_dir: Option<PathBuf>,

    /// Do not prefer <build-dir>/lib.unstripped
    #[arg(long)]
    no_unstripped: bool,

    /// Only extract binaries with one of these module ids
    #[arg(long = "module-id")]
    module_ids: Vec<String>,

    /// Extract next to the binaries in every directory under --build-dir
    #[arg(long)]
    subtree: bool,

    /// Print the binary under --build-dir with this module id and exit
    #[arg(long, conflicts_with = "subtree")]
    find_module: Option<String>,

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

    let dumper = DumpSymsBinary::new(ensure_dump_syms_binary(
        cli.dump_syms.as_deref(),
        Some(&cli.build_dir),
    )?);
    let module_ids: Option<BTreeSet<String>> =
        (!cli.module_ids.is_empty()).then(|| cli.module_ids.iter().cloned().collect());

    if let Some(module_id) = &cli.find_module {
        match find_matching_module(&dumper, &cli.build_dir, module_id).await? {
            Some(path) => println!("{}", path.display()),
            None => bail!("No binary under {} has module id {}", cli.build_dir.display(), module_id),
        }
        return Ok(());
    }

    if cli.subtree {
        extract_breakpad_on_subtree(&dumper, &cli.build_dir, module_ids.as_ref()).await?;
        return Ok(());
    }

    let Some(output_dir) = cli.output_dir else {
        bail!("--output-dir is required");
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let did_extract = extract_breakpad_files(
        &dumper,
        &cli.build_dir,
        &output_dir,
        !cli.no_unstripped,
        module_ids.as_ref(),
    )
    .await?;
    if !did_extract {
        bail!(breakpad_tools::BreakpadError::NothingExtracted(
            cli.build_dir.display().to_string()
        ));
    }
    info!(output = %output_dir.display(), "extracted breakpad files");
    Ok(())
}
