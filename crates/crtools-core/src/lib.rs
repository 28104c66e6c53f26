//! crtools-core - shared plumbing for the crtools utilities
//!
//! Every utility in this workspace is a thin driver over an external tool.
//! This crate holds the small amount of code they have in common:
//! - Tracing initialisation for binaries
//! - A subprocess runner with captured output and timeouts
//! - Chromium checkout discovery
//! - GN list and `@FileArg` expansion for build-graph arguments
//! - Bounded retry for flaky RPC-style tools

pub mod error;
pub mod gn;
pub mod paths;
pub mod retry;
pub mod runner;
pub mod telemetry;

pub use error::ToolError;
pub use gn::{expand_file_args, parse_gn_list, parse_gn_lists};
pub use paths::ChromiumPaths;
pub use retry::with_retries;
pub use runner::{shell_join, ToolCommand, ToolOutput, ToolRunner};
pub use telemetry::{init_tracing, level_for};

/// Result alias used across crtools-core.
pub type Result<T> = std::result::Result<T, ToolError>;
