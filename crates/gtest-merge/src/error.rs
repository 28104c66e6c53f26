//! Error types for gtest-merge

use thiserror::Error;

/// Errors raised while merging shard results.
#[derive(Error, Debug)]
pub enum MergeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
