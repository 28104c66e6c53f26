//! breakpad-tools - breakpad symbol file helpers
//!
//! Trace symbolization wants one breakpad file per module, named after the
//! module id. `extract` produces breakpad files from symbol binaries with
//! `dump_syms`; `rename` files them under their module ids.

pub mod error;
pub mod extract;
pub mod rename;

pub use error::BreakpadError;
pub use extract::{
    ensure_dump_syms_binary, extract_breakpad_files, extract_breakpad_on_subtree,
    find_matching_module, is_valid_binary_path, module_id_of, DumpSyms, DumpSymsBinary,
};
pub use rename::{extract_module_id, parse_module_header, rename_breakpad_files};

/// Result alias used across breakpad-tools.
pub type Result<T> = std::result::Result<T, BreakpadError>;
