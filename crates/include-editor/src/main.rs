//! add_header - mass add (or remove) a header in a set of C++ files
//!
//! Usage:
//!   add_header --header '<utility>' foo/bar.cc foo/baz.cc foo/baz.h
//!   add_header --header '<vector>' --remove foo/bar.cc

use anyhow::Result;
use clap::Parser;
use crtools_core::{init_tracing, level_for};
use include_editor::{edit_file, FormatOptions, HeaderEdit};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser)]
#[command(name = "add_header")]
#[command(about = "Mass add (or remove) a new header into a bunch of files", long_about = None)]
#[command(version)]
struct Cli {
    /// The decorated filename of the header to insert (e.g. "a" or <a>)
    #[arg(long)]
    header: String,

    /// Remove the header file instead of adding it
    #[arg(long)]
    remove: bool,

    /// Do not run clang-format over the rewritten include block
    #[arg(long)]
    no_clang_format: bool,

    /// clang-format executable
    #[arg(long, default_value = "clang-format")]
    clang_format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let edit = match HeaderEdit::new(cli.header.clone(), cli.remove) {
        Ok(edit) => edit,
        Err(_) => {
            println!("--header argument must be a decorated filename, e.g.");
            println!("  --header \"<utility>\"");
            println!("or");
            println!("  --header '\"moo.h\"'");
            return Ok(ExitCode::from(1));
        }
    };

    let options = FormatOptions {
        clang_format: (!cli.no_clang_format).then(|| cli.clang_format.clone()),
    };

    println!("{} #include {}...", edit.verb(), edit.header);
    for path in &cli.files {
        if let Err(e) = edit_file(path, &edit, &options).await {
            error!("Failed to edit {}: {}", path.display(), e);
            return Err(e.into());
        }
    }
    Ok(ExitCode::SUCCESS)
}
