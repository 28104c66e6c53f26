//! Error types for variations

use thiserror::Error;

/// Errors raised while parsing, splitting or bisecting variations.
#[derive(Error, Debug)]
pub enum VariationsError {
    /// A switch that is not `--name=value`
    #[error("Wrong format, expected name=value, got {0}")]
    MalformedSwitch(String),

    /// A switch other than the four variations switches
    #[error("Unexpected: --{name}={value}")]
    UnexpectedSwitch { name: String, value: String },

    /// `--force-fieldtrials` with an unpaired trial name
    #[error("odd number of items in --force-fieldtrials value")]
    OddTrialList,

    /// Malformed `--force-fieldtrial-params` entry
    #[error("{0}")]
    InvalidTrialParams(String),

    /// `*` in `--disable-features`
    #[error("--disable-features should not mark a feature with *")]
    StarredDisabledFeature,

    /// More params entries than trials
    #[error("params size ({params}) larger than trials size ({trials})")]
    TooManyParams { params: usize, trials: usize },

    /// Params for a trial that is not forced
    #[error("Fail to find trial_name {0} in trials")]
    UnknownTrial(String),

    /// Params group differs from the forced group
    #[error("group_name mismatch for trial_name {trial}, {params_group} vs {trial_group}")]
    GroupMismatch {
        trial: String,
        params_group: String,
        trial_group: String,
    },

    /// Re-emitting a parsed switch did not reproduce it
    #[error("--{switch}={value} does not round-trip (rebuilt as {rebuilt})")]
    RoundTrip {
        switch: String,
        value: String,
        rebuilt: String,
    },

    /// Browser channel not known on this platform
    #[error("Invalid browser type. Supported values are: {0}.")]
    UnsupportedBrowser(String),

    /// No browser table for this platform
    #[error("Unsupported platform")]
    UnsupportedPlatform,

    /// A file whose command line is too long and cannot be split further
    #[error("Can not split long argument list {0}")]
    CannotSplit(String),

    /// The full set reproduced, but neither half did
    #[error("Bisecting failed: should reproduce but did not: {0}")]
    BisectFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The browser could not be run
    #[error(transparent)]
    Tool(#[from] crtools_core::ToolError),
}
