//! Error types for pinboard

use thiserror::Error;

/// Errors raised while running jobs and building the dataset.
#[derive(Error, Debug)]
pub enum PinboardError {
    /// No commit has landed after the cutoff yet
    #[error("Given date appears to be in the future. There isn't yet a last commit before {0}.")]
    FutureDate(String),

    /// `--date` could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A tool printed something other than what was expected
    #[error("Unexpected {tool} output: {output}")]
    UnexpectedOutput { tool: String, output: String },

    /// A results file holds rows from another revision
    #[error("Not all results match the expected git revision {0}")]
    RevisionMismatch(String),

    /// BigQuery kept hitting the account's rate limit
    #[error("Query failed too many times, aborting")]
    TooManyQueryAttempts,

    /// A `bq` query hit the rate limit (retried by the batch runner)
    #[error("Exceeded rate limits")]
    RateLimited,

    /// A `bq` query failed for any other reason
    #[error("Error running command {command}. stdout: {stdout}")]
    Query { command: String, stdout: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An external tool failed
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
