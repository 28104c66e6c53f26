//! Headless Weston for Ozone/Wayland tests.
//!
//! Weston reports readiness with an `sd_notify` datagram (`READY=1`) on the
//! socket named by `NOTIFY_SOCKET`. Its `WAYLAND_DISPLAY` is only visible in
//! the environment of the processes it spawns, so the process tree is
//! scanned for it.

use crate::error::XvfbError;
use crate::helper::HelperProcess;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::net::UnixDatagram;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

pub const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";
pub const WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";
pub const XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";
const DEFAULT_XDG_RUNTIME_DIR: &str = "/tmp/xdg-tmp-dir/";

/// How long Weston has to send `READY=1`.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// The Weston invocation.
pub fn weston_command(weston: &Path, use_gl: bool) -> Vec<String> {
    let mut cmd = vec![
        weston.display().to_string(),
        "--backend=headless-backend.so".to_string(),
        // Idle Weston stops sending frame callbacks and tests time out.
        "--idle-time=0".to_string(),
        "--width=1024".to_string(),
        "--height=768".to_string(),
        "--modules=test-plugin.so,systemd-notify.so".to_string(),
    ];
    if use_gl {
        cmd.push("--use-gl".to_string());
    }
    cmd
}

/// Set `XDG_RUNTIME_DIR` when the environment has none.
pub fn ensure_xdg_runtime_dir(env: &mut BTreeMap<String, String>) -> Result<()> {
    if env.get(XDG_RUNTIME_DIR).is_some_and(|dir| !dir.is_empty()) {
        return Ok(());
    }
    let dir = Path::new(DEFAULT_XDG_RUNTIME_DIR);
    if !dir.exists() {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
    }
    env.insert(XDG_RUNTIME_DIR.to_string(), DEFAULT_XDG_RUNTIME_DIR.to_string());
    Ok(())
}

/// Whether an `sd_notify` message announces readiness.
pub fn is_ready_message(message: &[u8]) -> bool {
    String::from_utf8_lossy(message)
        .lines()
        .any(|line| line.trim() == "READY=1")
}

/// Block until a `READY=1` datagram arrives or `limit` passes.
pub async fn wait_for_notify(socket: &UnixDatagram, limit: Duration) -> bool {
    let wait = async {
        let mut buf = [0u8; 4096];
        loop {
            match socket.recv(&mut buf).await {
                Ok(n) if is_ready_message(&buf[..n]) => return true,
                Ok(n) => debug!("notify: {}", String::from_utf8_lossy(&buf[..n])),
                Err(err) => {
                    debug!("notify socket error: {}", err);
                    return false;
                }
            }
        }
    };
    timeout(limit, wait).await.unwrap_or(false)
}

/// A process as seen by the display scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent: Option<u32>,
    pub environ: Vec<String>,
}

/// `WAYLAND_DISPLAY` from the environment of any descendant of `root`.
pub fn find_wayland_display(processes: &[ProcessInfo], root: u32) -> Option<String> {
    let mut tree = BTreeSet::from([root]);
    // Parents may be listed after their children.
    loop {
        let before = tree.len();
        for process in processes {
            if process.parent.is_some_and(|parent| tree.contains(&parent)) {
                tree.insert(process.pid);
            }
        }
        if tree.len() == before {
            break;
        }
    }
    let prefix = format!("{}=", WAYLAND_DISPLAY);
    processes
        .iter()
        .filter(|process| process.pid != root && tree.contains(&process.pid))
        .flat_map(|process| process.environ.iter())
        .find_map(|var| var.strip_prefix(&prefix).map(str::to_string))
}

/// Snapshot every process with its environment.
pub fn list_processes(system: &mut System) -> Vec<ProcessInfo> {
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_environ(UpdateKind::Always),
    );
    system
        .processes()
        .values()
        .map(|process| ProcessInfo {
            pid: process.pid().as_u32(),
            parent: process.parent().map(|pid| pid.as_u32()),
            environ: process
                .environ()
                .iter()
                .map(|var| var.to_string_lossy().into_owned())
                .collect(),
        })
        .collect()
}

/// Poll the process tree under `pid` for its display. Weston spawns its
/// desktop shell some time after starting.
pub async fn display_from_weston(pid: u32, polls: usize, interval: Duration) -> Option<String> {
    let mut system = System::new();
    for _ in 0..polls {
        sleep(interval).await;
        if let Some(display) = find_wayland_display(&list_processes(&mut system), pid) {
            return Some(display);
        }
    }
    None
}

/// Start Weston and wait until it is ready and has a display. Tries
/// `attempts` times.
pub async fn start_weston(
    weston: &Path,
    use_gl: bool,
    env: &BTreeMap<String, String>,
    attempts: usize,
) -> Result<(HelperProcess, String)> {
    let command = weston_command(weston, use_gl);
    for attempt in 0..attempts {
        let socket_dir = tempfile::tempdir()?;
        let socket_path = socket_dir.path().join("notify");
        let socket = UnixDatagram::bind(&socket_path)?;
        let mut weston_env = env.clone();
        weston_env.insert(NOTIFY_SOCKET.to_string(), socket_path.display().to_string());

        let started = Instant::now();
        let mut proc = HelperProcess::spawn("weston", &command, &weston_env)?;
        if !wait_for_notify(&socket, READY_TIMEOUT).await || !proc.is_running() {
            debug!(attempt, "weston did not report ready");
            proc.terminate(crate::helper::KILL_TIMEOUT).await;
            continue;
        }
        debug!(elapsed = ?started.elapsed(), "weston ready");
        let Some(pid) = proc.pid() else {
            continue;
        };
        if let Some(display) = display_from_weston(pid, 100, Duration::from_millis(50)).await {
            return Ok((proc, display));
        }
        proc.terminate(crate::helper::KILL_TIMEOUT).await;
    }
    Err(XvfbError::Weston("Failed to start Weston.".to_string()))
}
