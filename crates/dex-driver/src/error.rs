//! Error types for dex-driver

use thiserror::Error;

/// Errors raised while dexing.
#[derive(Error, Debug)]
pub enum DexError {
    /// Flags that cannot be used together
    #[error("{0}")]
    InvalidArgs(String),

    /// D8 exited non-zero
    #[error("D8 failed with exit code {code}")]
    DexFailed { code: i32 },

    /// D8 printed warnings and warnings are errors
    #[error("D8 printed warnings and --warnings-as-errors is set")]
    WarningsAsErrors,

    /// A single .dex was requested but D8 wrote another number of files
    #[error("{0} files created, expected 1")]
    UnexpectedDexCount(usize),

    /// Zip archive error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal error
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GN list parsing or subprocess error
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
