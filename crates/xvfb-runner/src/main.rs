//! xvfb - run a test command under Xvfb or Weston
//!
//! Every argument belongs to the test command, so logging is configured
//! through the environment: `XVFB_VERBOSE` for debug logs and
//! `XVFB_LOG_JSON` for JSON lines.

use crtools_core::{init_tracing, level_for};
use std::process::ExitCode;
use xvfb_runner::{run_executable, RunOptions, ServerConfig, XvfbError, USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(
        std::env::var_os("XVFB_LOG_JSON").is_some(),
        level_for(std::env::var_os("XVFB_VERBOSE").is_some()),
    );

    let options = match RunOptions::from_args(std::env::args().skip(1).collect()) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}\n", err);
            if matches!(err, XvfbError::CommandIsDirectory(_)) {
                eprintln!("{}\n", USAGE);
            }
            return exit(err.exit_code());
        }
    };

    let env = std::env::vars().collect();
    exit(run_executable(&options, env, &ServerConfig::default()).await)
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
