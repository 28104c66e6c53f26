//! Error types for xvfb-runner

use thiserror::Error;

/// Errors raised while setting up a display server or running the test.
#[derive(Error, Debug)]
pub enum XvfbError {
    /// Too few arguments
    #[error("{0}")]
    Usage(String),

    /// The first argument names a directory
    #[error("Invalid command: \"{0}\" is a directory")]
    CommandIsDirectory(String),

    /// Weston requested while Xvfb is still enabled
    #[error("Unable to use Weston with xvfb.")]
    WestonWithXvfb,

    /// Xvfb or Openbox did not come up
    #[error("Xvfb fail: {0}")]
    Xvfb(String),

    /// Weston did not come up
    #[error("Weston fail: {0}")]
    Weston(String),

    /// A helper binary could not be started
    #[error("Failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Subprocess error
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}

impl XvfbError {
    /// Exit status for the runner when this error ends the run.
    pub fn exit_code(&self) -> i32 {
        match self {
            XvfbError::Usage(_) => 2,
            XvfbError::CommandIsDirectory(_) => 3,
            _ => 1,
        }
    }
}
