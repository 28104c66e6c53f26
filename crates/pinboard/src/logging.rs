//! Logging to stderr and to dated files in the cache directory, so runs on
//! the dashboard machine leave a trail.
//!
//! One file per day, `pinboard.YYYY-MM-DD.log`; only the newest
//! [`MAX_LOG_FILES`] are kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_PREFIX: &str = "pinboard";
pub const LOG_SUFFIX: &str = "log";

/// Six weeks of daily logs.
pub const MAX_LOG_FILES: usize = 42;

/// Daily log files under `dir`, capped at `max_files`.
pub fn log_appender(dir: &Path, max_files: usize) -> io::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(max_files)
        .build(dir)
        .map_err(io::Error::other)
}

fn is_log_file(name: &str) -> bool {
    name.strip_prefix(LOG_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(LOG_SUFFIX))
        .and_then(|date| date.strip_suffix('.'))
        .is_some_and(|date| !date.is_empty())
}

/// Delete all but the newest `keep` log files in `dir` and return what was
/// removed. The appender only prunes when it rolls over mid-run, which a
/// short daily run never does.
pub fn prune_logs(dir: &Path, keep: usize) -> io::Result<Vec<PathBuf>> {
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_log_file))
        .map(|entry| entry.path())
        .collect();
    // Dated names sort oldest first.
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    let removed: Vec<PathBuf> = logs.drain(..excess).collect();
    for path in &removed {
        fs::remove_file(path)?;
    }
    Ok(removed)
}

/// Initialise tracing with an extra plain-text copy in the dated log files
/// under `log_dir`. Falls back to stderr only when they cannot be written.
pub fn init_logging(json: bool, level: Level, log_dir: &Path) {
    let appender = match log_appender(log_dir, MAX_LOG_FILES) {
        Ok(appender) => appender,
        Err(err) => {
            crtools_core::init_tracing(json, level);
            tracing::warn!("Cannot log to {}: {}", log_dir.display(), err);
            return;
        }
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .with(fmt::layer().with_ansi(false).with_writer(appender))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(appender))
            .try_init()
            .ok();
    }

    if let Err(err) = prune_logs(log_dir, MAX_LOG_FILES) {
        tracing::warn!("Cannot prune old logs in {}: {}", log_dir.display(), err);
    }
}
