//! Error types for include-editor

use thiserror::Error;

/// Errors raised while editing include blocks.
#[derive(Error, Debug)]
pub enum IncludeError {
    /// `--header` was not a decorated name
    #[error("--header argument must be a decorated filename, e.g. \"<utility>\" or '\"moo.h\"', got {0}")]
    InvalidHeader(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// clang-format could not be run
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
