//! Extracting breakpad symbol files from build outputs with `dump_syms`.

use crate::error::BreakpadError;
use crate::rename::extract_module_id;
use crate::Result;
use async_trait::async_trait;
use crtools_core::{ToolCommand, ToolRunner};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Android builds keep unstripped libraries here.
pub const UNSTRIPPED_DIR: &str = "lib.unstripped";

/// Something that runs `dump_syms`.
#[async_trait]
pub trait DumpSyms: Send + Sync {
    /// Dump the symbols of `input` into `output`, or only its `MODULE`
    /// header line when `only_module_header` is set. Returns `false` when
    /// `dump_syms` could not read the binary.
    async fn dump(&self, input: &Path, output: &Path, only_module_header: bool) -> Result<bool>;
}

/// The real `dump_syms` binary.
#[derive(Debug, Clone)]
pub struct DumpSymsBinary {
    pub path: PathBuf,
}

impl DumpSymsBinary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DumpSyms for DumpSymsBinary {
    async fn dump(&self, input: &Path, output: &Path, only_module_header: bool) -> Result<bool> {
        let mut command = vec![self.path.display().to_string()];
        if only_module_header {
            command.push("-i".to_string());
        }
        command.push(input.display().to_string());

        let result = ToolRunner::run(&ToolCommand::new("dump_syms", command)).await?;
        if !result.passed() {
            info!(
                "Dump_syms failed to extract information from symbol binary: {}. Error: {}",
                input.display(),
                result.stderr.trim()
            );
            return Ok(false);
        }
        std::fs::write(output, result.stdout)?;
        Ok(true)
    }
}

/// Use `dump_syms` if given and it exists, otherwise look for one in
/// `build_dir`.
pub fn ensure_dump_syms_binary(
    dump_syms: Option<&Path>,
    build_dir: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = dump_syms {
        if path.is_file() && path.to_string_lossy().contains("dump_syms") {
            return Ok(path.to_path_buf());
        }
    }
    if let Some(dir) = build_dir {
        let candidate = dir.join("dump_syms");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    let build_dir = build_dir
        .map(|dir| dir.display().to_string())
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| "out/android".to_string());
    Err(BreakpadError::DumpSymsNotFound { build_dir })
}

/// Whether `path` names a binary worth running `dump_syms` on.
pub fn is_valid_binary_path(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    if name.ends_with("partition.so")
        || name.ends_with(".dwp")
        || name.ends_with(".dwo")
        || name.contains("_combined")
    {
        return false;
    }
    name == "chrome" || name.ends_with(".so") || name.ends_with(".exe")
}

/// The module id `dump_syms -i` reports for `binary`.
pub async fn module_id_of(dumper: &dyn DumpSyms, binary: &Path) -> Result<Option<String>> {
    let header = tempfile::Builder::new()
        .prefix("module_header")
        .tempfile()?
        .into_temp_path();
    if !dumper.dump(binary, &header, true).await? {
        return Ok(None);
    }
    extract_module_id(&header)
}

/// With no `module_ids` every binary is needed; otherwise only those whose
/// module id is listed.
async fn is_module_needed(
    dumper: &dyn DumpSyms,
    module_ids: Option<&BTreeSet<String>>,
    binary: &Path,
) -> Result<bool> {
    let Some(module_ids) = module_ids else {
        return Ok(true);
    };
    let module_id = module_id_of(dumper, binary).await?;
    match module_id {
        Some(id) if module_ids.contains(&id) => Ok(true),
        other => {
            debug!(
                "Skipping breakpad extraction for module ({:?}, {}) since trace has no frames with this ID.",
                other,
                binary.display()
            );
            Ok(false)
        }
    }
}

/// Run `dump_syms` over each symbol binary directly inside `build_dir`
/// (or its `lib.unstripped` when `search_unstripped` is set and it exists),
/// writing `<binary name>.breakpad` into `output_dir`.
///
/// Returns whether at least one breakpad file was extracted.
pub async fn extract_breakpad_files(
    dumper: &dyn DumpSyms,
    build_dir: &Path,
    output_dir: &Path,
    search_unstripped: bool,
    module_ids: Option<&BTreeSet<String>>,
) -> Result<bool> {
    if !build_dir.is_dir() {
        return Err(BreakpadError::InvalidBuildDir(build_dir.display().to_string()));
    }
    if !output_dir.is_dir() {
        return Err(BreakpadError::InvalidOutputDir(output_dir.display().to_string()));
    }

    let unstripped = build_dir.join(UNSTRIPPED_DIR);
    let symbol_dir = if search_unstripped && unstripped.is_dir() {
        unstripped
    } else {
        build_dir.to_path_buf()
    };

    let mut binaries: Vec<PathBuf> = std::fs::read_dir(&symbol_dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<_>>()?;
    binaries.sort();

    let mut extracted = 0;
    for input in binaries {
        if !input.is_file() || !is_valid_binary_path(&input) {
            continue;
        }
        if !is_module_needed(dumper, module_ids, &input).await? {
            continue;
        }
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(format!("{}.breakpad", name.to_string_lossy()));
        debug!("Extracting breakpad file from: {}", input.display());
        if dumper.dump(&input, &output, false).await? {
            debug!("Extracted breakpad to: {}", output.display());
            extracted += 1;
        }
    }
    Ok(extracted > 0)
}

/// Extract breakpad files next to the symbol binaries in every directory
/// under `root`. Fails if nothing could be extracted anywhere.
pub async fn extract_breakpad_on_subtree(
    dumper: &dyn DumpSyms,
    root: &Path,
    module_ids: Option<&BTreeSet<String>>,
) -> Result<()> {
    match module_ids {
        None => info!(
            "No specified modules to extract. Converting all symbol binaries to breakpad."
        ),
        Some(ids) => debug!("Module IDs to symbolize: {:?}", ids),
    }

    let mut did_extract = false;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = std::path::absolute(entry.path())?;
        did_extract |= extract_breakpad_files(dumper, &dir, &dir, false, module_ids).await?;
    }
    if !did_extract {
        return Err(BreakpadError::NothingExtractedInSubtree(root.display().to_string()));
    }
    Ok(())
}

/// The first symbol binary under `root` whose module id is `module_id`.
pub async fn find_matching_module(
    dumper: &dyn DumpSyms,
    root: &Path,
    module_id: &str,
) -> Result<Option<PathBuf>> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_valid_binary_path(entry.path()) {
            continue;
        }
        if module_id_of(dumper, entry.path()).await?.as_deref() == Some(module_id) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}
