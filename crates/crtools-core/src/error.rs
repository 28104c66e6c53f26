//! Error types for crtools-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while driving external tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Command vector was empty
    #[error("Command {0} is empty")]
    EmptyCommand(String),

    /// Executable could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command ran longer than its timeout
    #[error("Command {name} timed out after {secs} seconds")]
    Timeout { name: String, secs: u64 },

    /// Command exited non-zero
    #[error("Command {name} failed with exit code {code}: {stderr}")]
    Failed {
        name: String,
        code: i32,
        stderr: String,
    },

    /// No Chromium checkout around the given directory
    #[error("Could not find a Chromium checkout above {0}")]
    CheckoutNotFound(PathBuf),

    /// Malformed GN list literal
    #[error("Invalid GN list: {0}")]
    InvalidGnList(String),

    /// `@FileArg(...)` could not be resolved
    #[error("Invalid @FileArg {arg}: {reason}")]
    FileArg { arg: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    /// Exit code to propagate when a driver fails because of this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Failed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
