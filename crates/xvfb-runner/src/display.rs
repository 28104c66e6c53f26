//! X display selection and the Xvfb command line.

use crate::error::XvfbError;
use crate::Result;
use rand::seq::IndexedRandom;
use std::ops::RangeInclusive;
use std::path::Path;

/// Displays tried, starting at the `xvfb-run` default.
pub const DISPLAY_RANGE: RangeInclusive<u32> = 99..=119;

/// Every display in range without an X lock file under `lock_dir`.
pub fn available_displays(lock_dir: &Path) -> Vec<u32> {
    DISPLAY_RANGE
        .filter(|display| !lock_dir.join(format!(".X{}-lock", display)).is_file())
        .collect()
}

/// A random free display, as `:<n>`. Picking at random keeps concurrent
/// runners on one bot from racing for the same number.
pub fn find_display(lock_dir: &Path) -> Result<String> {
    let available = available_displays(lock_dir);
    match available.choose(&mut rand::rng()) {
        Some(display) => Ok(format!(":{}", display)),
        None => Err(XvfbError::Xvfb("Failed to find display number".to_string())),
    }
}

/// The Xvfb invocation for `display`. `xvfb_help` is the output of
/// `Xvfb -help`; older servers reject `-maxclients`.
pub fn xvfb_command(xvfb: &str, display: &str, whd: &str, xvfb_help: &str) -> Vec<String> {
    let mut cmd: Vec<String> = [
        xvfb, display, "-screen", "0", whd, "-ac", "-nolisten", "tcp", "-dpi", "96",
        "+extension", "RANDR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    if xvfb_help.contains("-maxclients") {
        cmd.extend(["-maxclients".to_string(), "512".to_string()]);
    }
    cmd
}
