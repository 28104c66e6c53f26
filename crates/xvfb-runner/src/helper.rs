//! Helper processes (Xvfb, Openbox, xcompmgr, Weston) and their teardown.

use crate::error::XvfbError;
use crate::Result;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Wait this long after each of SIGTERM and SIGKILL.
pub const KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Send `sig` to `pid`. Errors (e.g. the process is gone) are ignored.
pub fn send_signal(pid: u32, sig: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let res = unsafe { libc::kill(pid, sig) };
    if res != 0 {
        debug!(pid, sig, "kill failed: {}", std::io::Error::last_os_error());
    }
}

/// A running helper. Dropping it kills the process.
#[derive(Debug)]
pub struct HelperProcess {
    name: String,
    child: Child,
}

impl HelperProcess {
    /// Start `command` with exactly `env`.
    pub fn spawn(name: &str, command: &[String], env: &BTreeMap<String, String>) -> Result<Self> {
        Self::spawn_with(name, command, env, false)
    }

    /// Start a server that reports readiness by sending SIGUSR1 to its
    /// parent. X servers only do so when SIGUSR1 is ignored at exec.
    pub fn spawn_signalling_ready(
        name: &str,
        command: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self> {
        Self::spawn_with(name, command, env, true)
    }

    fn spawn_with(
        name: &str,
        command: &[String],
        env: &BTreeMap<String, String>,
        ignore_usr1: bool,
    ) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| crtools_core::ToolError::EmptyCommand(name.to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if ignore_usr1 {
            // SAFETY: only calls signal(2), which is async-signal-safe.
            unsafe {
                cmd.pre_exec(|| {
                    libc::signal(libc::SIGUSR1, libc::SIG_IGN);
                    Ok(())
                });
            }
        }
        let child = cmd.spawn().map_err(|source| XvfbError::Spawn {
            name: name.to_string(),
            source,
        })?;
        debug!(name, pid = ?child.id(), "started helper");
        Ok(HelperProcess {
            name: name.to_string(),
            child,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then SIGKILL, waiting `grace` after each.
    pub async fn terminate(mut self, grace: Duration) {
        let Some(pid) = self.child.id() else {
            return;
        };
        send_signal(pid, libc::SIGTERM);
        if timeout(grace, self.child.wait()).await.is_ok() {
            return;
        }
        eprintln!("{} running after SIGTERM, trying SIGKILL.", self.name);
        if let Err(err) = self.child.start_kill() {
            debug!(name = %self.name, "SIGKILL failed: {}", err);
        }
        if timeout(grace, self.child.wait()).await.is_err() {
            warn!(name = %self.name, "still running after SIGTERM and SIGKILL");
        }
    }
}

/// SIGUSR1 from a helper announcing it is ready.
pub struct ReadySignal {
    signal: Signal,
}

impl ReadySignal {
    /// Start listening. Must happen before the helper is spawned.
    pub fn listen() -> Result<Self> {
        Ok(ReadySignal {
            signal: signal(SignalKind::user_defined1())?,
        })
    }

    /// Poll `polls` times, `interval` apart, until the helper signals or
    /// exits. True only when it signalled and is still running.
    pub async fn wait(
        &mut self,
        helper: &mut HelperProcess,
        polls: usize,
        interval: Duration,
    ) -> bool {
        let mut ready = false;
        for _ in 0..polls {
            tokio::select! {
                _ = self.signal.recv() => ready = true,
                _ = sleep(interval) => {}
            }
            if ready || !helper.is_running() {
                break;
            }
        }
        ready && helper.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        std::env::vars().collect()
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_terminate_stops_process() {
        let mut helper = HelperProcess::spawn("sleeper", &sh("exec sleep 30"), &env()).unwrap();
        assert!(helper.is_running());
        let start = std::time::Instant::now();
        helper.terminate(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_sigkill() {
        let mut helper = HelperProcess::spawn(
            "stubborn",
            &sh("trap '' TERM; while true; do sleep 1; done"),
            &env(),
        )
        .unwrap();
        // Give the shell time to install its trap.
        sleep(Duration::from_millis(200)).await;
        assert!(helper.is_running());
        helper.terminate(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let err = HelperProcess::spawn("nope", &["/nonexistent/Xvfb".to_string()], &env())
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to start nope"));
    }

    #[tokio::test]
    async fn test_exited_helper_is_not_ready() {
        let mut ready = ReadySignal::listen().unwrap();
        let mut helper = HelperProcess::spawn("quitter", &sh("exit 1"), &env()).unwrap();
        assert!(!ready.wait(&mut helper, 10, Duration::from_millis(50)).await);
    }
}
