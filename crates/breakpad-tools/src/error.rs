//! Error types for breakpad-tools

use thiserror::Error;

/// Errors raised while extracting or renaming breakpad symbol files.
#[derive(Error, Debug)]
pub enum BreakpadError {
    /// No usable dump_syms binary
    #[error(
        "dump_syms binary not found. Build a binary with autoninja -C {build_dir} dump_syms \
         and try again with --dump-syms={build_dir}/dump_syms"
    )]
    DumpSymsNotFound { build_dir: String },

    #[error("Invalid build directory: {0}")]
    InvalidBuildDir(String),

    #[error("Invalid breakpad output directory: {0}")]
    InvalidOutputDir(String),

    /// Nothing usable in the build directory
    #[error("No breakpad symbols could be extracted from {0}")]
    NothingExtracted(String),

    /// No breakpad symbols anywhere below a subtree root
    #[error("No breakpad symbols could be extracted from files in the subtree: {0}")]
    NothingExtractedInSubtree(String),

    /// Two symbol files describe the same module
    #[error("Symbol file modules ids are not unique: {module_id} ({path})")]
    DuplicateModuleId { module_id: String, path: String },

    /// Directory traversal error
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// dump_syms could not be run
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
