//! Error types for perf-trigger

use thiserror::Error;

/// Errors raised while selecting bots and triggering shards.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// More shards than bots matching the dimensions
    #[error(
        "Not enough available machines exist in swarming pool.  \
         Shards requested ({shards}) exceeds available bots ({bots})."
    )]
    NotEnoughBots { shards: usize, bots: usize },

    /// `--multiple-trigger-configs` is not a non-empty list of objects
    #[error("{0}")]
    InvalidBotConfigs(String),

    /// No `--swarming <server>` in the trigger arguments
    #[error("No --swarming server in the trigger arguments")]
    MissingServer,

    /// A selected bot vanished from the config list
    #[error("Bot {0} has no config")]
    UnknownBot(String),

    /// Swarming returned JSON of an unexpected shape
    #[error("Unexpected swarming output: {0}")]
    UnexpectedOutput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The swarming client failed
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
