//! dex-driver - incremental D8 dexing for Android Java targets
//!
//! The build calls `dex` once per target. The driver:
//! - Builds the D8 (or CustomD8) command line from the target's flags
//! - Skips the run when no input or flag changed since the last build
//! - Re-dexes only changed class files into per-class intermediates
//! - Merges intermediates and pre-dexed jars into the final `.dex.jar`
//! - Filters known-benign D8 warnings from stderr

pub mod archive;
pub mod changes;
pub mod d8;
pub mod desugar;
pub mod driver;
pub mod error;
pub mod filter;
pub mod options;

pub use changes::{stamp_path_for, Changes, Stamp};
pub use d8::{build_dex_command, run_d8, Dexer, ProcessDexer, DEX_XMX};
pub use driver::{create_final_dex, merge_dex_for_incremental_install, write_depfile, DexContext};
pub use error::DexError;
pub use filter::StderrFilter;
pub use options::{DexArgs, DexOptions};

/// Result alias used across dex-driver.
pub type Result<T> = std::result::Result<T, DexError>;
