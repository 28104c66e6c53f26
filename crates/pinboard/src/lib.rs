//! pinboard - daily pinpoint jobs and the dashboard dataset built from them
//!
//! Every day a set of pinpoint jobs runs, with and without a patch, on the
//! last commit of the previous day. Their results are aggregated into a CSV
//! that a dashboard reads from cloud storage.
//!
//! - [`pipeline`]: the start / collect / upload actions over the jobs state
//! - [`aggregate`]: per-revision aggregation and the dataset rows
//! - [`git`], [`pinpoint`], [`storage`]: the external tools, behind traits
//! - [`query`]: parallel `bq` queries with rate-limit retries
//! - [`time`]: Mountain View time

pub mod aggregate;
pub mod error;
pub mod git;
pub mod logging;
pub mod pinpoint;
pub mod pipeline;
pub mod query;
pub mod state;
pub mod storage;
pub mod time;

pub use aggregate::{build_dataset, revision_results, DatasetRow, ResultRow, Selection};
pub use error::PinboardError;
pub use git::{last_commit_of_date, Commit, GitCheckout, Repository};
pub use pinpoint::{PinpointApi, PinpointCli};
pub use pipeline::{Action, CacheDir, ItemsToUpdate, PinboardContext};
pub use query::BigQuery;
pub use state::{Job, JobsState, StateItem};
pub use storage::{CloudStorage, Gsutil};

/// Result alias used across pinboard.
pub type Result<T> = std::result::Result<T, PinboardError>;
