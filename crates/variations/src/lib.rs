//! variations - split and bisect Chrome variations command lines
//!
//! A browser's active experiments can be exported as four switches
//! (`--force-fieldtrials`, `--force-fieldtrial-params`, `--enable-features`
//! and `--disable-features`). This crate parses them, splits a set of
//! experiments into two halves, and drives an interactive bisection that
//! narrows a reproducing set down to one experiment.

pub mod bisect;
pub mod cmd;
pub mod error;
pub mod switches;

pub use bisect::{
    bisect, build_browser_args, ensure_command_line_length, load_variations, locate_browser,
    supported_browser_types, Answer, BisectOutcome, BrowserLauncher, Oracle, ProcessLauncher,
    PromptOracle, MAX_ARGS_LENGTH_WIN,
};
pub use cmd::{split_variations_cmd_from_file, split_variations_cmd_from_string, VariationsCmd};
pub use error::VariationsError;
pub use switches::{parse_switches_string, Feature, Param, Trial, TrialParams};

/// Result alias used across variations.
pub type Result<T> = std::result::Result<T, VariationsError>;
