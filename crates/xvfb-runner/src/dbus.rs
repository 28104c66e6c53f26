//! Session bus for headless bots.
//!
//! GLib misbehaves between fork and exec when no session bus is running,
//! which hangs browser child processes. Bots have no desktop session, so one
//! is started with `dbus-launch` unless the environment already names a bus.

use crate::helper::send_signal;
use crtools_core::{ToolCommand, ToolRunner};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const SESSION_BUS_ADDRESS: &str = "DBUS_SESSION_BUS_ADDRESS";
pub const SESSION_BUS_PID: &str = "DBUS_SESSION_BUS_PID";

lazy_static! {
    static ref ASSIGNMENT: Regex = Regex::new(r"^([^=]+)=(.+)$").expect("valid regex pattern");
}

/// `KEY=VALUE` lines printed by `dbus-launch`.
pub fn parse_dbus_launch(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| ASSIGNMENT.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// The dbus-daemon started for this run. It is not our child, so it can
/// only be killed by pid; that happens on drop.
#[derive(Debug)]
pub struct DbusSession {
    pid: u32,
}

impl DbusSession {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for DbusSession {
    fn drop(&mut self) {
        debug!(pid = self.pid, "killing dbus-daemon");
        send_signal(self.pid, libc::SIGKILL);
    }
}

/// Start a session bus unless `env` already has one, adding its variables
/// to `env`. Launch failures are reported and ignored.
pub async fn launch_dbus(
    dbus_launch: &str,
    env: &mut BTreeMap<String, String>,
) -> Option<DbusSession> {
    if env.contains_key(SESSION_BUS_ADDRESS) {
        return None;
    }
    let mut command = ToolCommand::new("dbus-launch", vec![dbus_launch.to_string()]);
    for (key, value) in env.iter() {
        command = command.env(key.clone(), value.clone());
    }
    let output = match ToolRunner::check_output(&command).await {
        Ok(output) => output,
        Err(err) => {
            println!("Exception while running dbus_launch: {}", err);
            return None;
        }
    };
    env.extend(parse_dbus_launch(&output));
    match env.get(SESSION_BUS_PID).map(|pid| pid.parse::<u32>()) {
        Some(Ok(pid)) => Some(DbusSession { pid }),
        Some(Err(err)) => {
            warn!("Invalid {}: {}", SESSION_BUS_PID, err);
            None
        }
        None => {
            warn!("dbus-launch did not report {}", SESSION_BUS_PID);
            None
        }
    }
}
