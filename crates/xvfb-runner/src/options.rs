//! Runner flags mixed into the test command line.
//!
//! The runner takes no flags of its own before the command; a few switches
//! anywhere in the command select the display server and are removed before
//! the command runs.

use crate::error::XvfbError;
use crate::Result;
use std::path::Path;

pub const USAGE: &str = "Usage: xvfb [command [--no-xvfb or --use-weston] args...]";

const NO_XVFB: &str = "--no-xvfb";
const USE_WESTON: &str = "--use-weston";
const WESTON_USE_GL: &str = "--weston-use-gl";
const WESTON_DEBUG_LOGGING: &str = "--weston-debug-logging";
const XVFB_WHD: &str = "--xvfb-whd";

/// Default Xvfb screen geometry.
pub const DEFAULT_WHD: &str = "1280x800x24";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// The test command with runner switches removed.
    pub command: Vec<String>,
    pub use_xvfb: bool,
    pub use_weston: bool,
    pub weston_use_gl: bool,
    pub weston_debug_logging: bool,
    /// Xvfb screen as `<width>x<height>x<depth>`.
    pub xvfb_whd: String,
}

impl RunOptions {
    /// Check the raw arguments (without the program name) and split off the
    /// runner switches.
    pub fn from_args(args: Vec<String>) -> Result<RunOptions> {
        let Some(first) = args.first() else {
            return Err(XvfbError::Usage(USAGE.to_string()));
        };
        if Path::new(first).is_dir() {
            return Err(XvfbError::CommandIsDirectory(first.clone()));
        }
        Self::from_command(args)
    }

    pub fn from_command(mut command: Vec<String>) -> Result<RunOptions> {
        let use_xvfb = !take_switch(&mut command, NO_XVFB);
        let use_weston = take_switch(&mut command, USE_WESTON);
        if use_weston && use_xvfb {
            return Err(XvfbError::WestonWithXvfb);
        }
        let (weston_use_gl, weston_debug_logging) = if use_weston {
            (
                take_switch(&mut command, WESTON_USE_GL),
                take_switch(&mut command, WESTON_DEBUG_LOGGING),
            )
        } else {
            (false, false)
        };
        let xvfb_whd = take_value(&mut command, XVFB_WHD).unwrap_or_else(|| DEFAULT_WHD.to_string());

        Ok(RunOptions {
            command,
            use_xvfb,
            use_weston,
            weston_use_gl,
            weston_debug_logging,
            xvfb_whd,
        })
    }
}

/// Remove every occurrence of `switch`, returning whether there was one.
fn take_switch(command: &mut Vec<String>, switch: &str) -> bool {
    let before = command.len();
    command.retain(|arg| arg != switch);
    command.len() != before
}

/// Remove `--flag=value` or `--flag value`, returning the last value.
fn take_value(command: &mut Vec<String>, flag: &str) -> Option<String> {
    let prefix = format!("{}=", flag);
    let mut value = None;
    let mut kept = Vec::with_capacity(command.len());
    let mut args = command.drain(..);
    while let Some(arg) = args.next() {
        if let Some(v) = arg.strip_prefix(&prefix) {
            value = Some(v.to_string());
        } else if arg == flag {
            value = args.next();
        } else {
            kept.push(arg);
        }
    }
    drop(args);
    *command = kept;
    value
}
