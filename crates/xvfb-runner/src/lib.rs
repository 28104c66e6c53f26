//! xvfb-runner - run GUI tests under a headless display server
//!
//! On Linux the test command runs inside a fresh Xvfb display with Openbox
//! and xcompmgr, or inside a headless Weston compositor for Ozone/Wayland
//! tests. Elsewhere, or with `--no-xvfb`, the command runs directly.
//!
//! Every helper started for a run is terminated on the way out (SIGTERM,
//! then SIGKILL); the test command's exit status is passed through.

pub mod command;
pub mod dbus;
pub mod display;
pub mod error;
pub mod helper;
pub mod options;
pub mod runner;
pub mod weston;

pub use command::run_test_command;
pub use display::{find_display, xvfb_command, DISPLAY_RANGE};
pub use error::XvfbError;
pub use helper::{HelperProcess, ReadySignal};
pub use options::{RunOptions, USAGE};
pub use runner::{run_executable, ServerConfig};

/// Result alias used across xvfb-runner.
pub type Result<T> = std::result::Result<T, XvfbError>;
