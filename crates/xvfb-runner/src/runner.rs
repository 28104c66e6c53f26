//! Setting up a display server around the test command.

use crate::command::run_test_command;
use crate::dbus::{launch_dbus, DbusSession};
use crate::display::{find_display, xvfb_command};
use crate::error::XvfbError;
use crate::helper::{HelperProcess, ReadySignal, KILL_TIMEOUT};
use crate::options::RunOptions;
use crate::weston::{ensure_xdg_runtime_dir, start_weston};
use crate::Result;
use crtools_core::{ToolCommand, ToolRunner};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

/// Where the helpers live and how patiently to wait for them.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub xvfb: String,
    pub openbox: String,
    pub xcompmgr: String,
    pub dbus_launch: String,
    /// Weston is a build output, run from the current directory.
    pub weston: PathBuf,
    /// Directory holding `.X<n>-lock` files.
    pub lock_dir: PathBuf,
    pub use_openbox: bool,
    pub use_xcompmgr: bool,
    /// Displays tried before giving up.
    pub display_attempts: usize,
    /// Readiness polls per display.
    pub ready_polls: usize,
    pub ready_interval: Duration,
    pub kill_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            xvfb: "Xvfb".to_string(),
            openbox: "openbox".to_string(),
            xcompmgr: "xcompmgr".to_string(),
            dbus_launch: "dbus-launch".to_string(),
            weston: PathBuf::from("./weston"),
            lock_dir: PathBuf::from("/tmp"),
            use_openbox: true,
            use_xcompmgr: true,
            display_attempts: 10,
            ready_polls: 10,
            ready_interval: Duration::from_millis(100),
            kill_timeout: KILL_TIMEOUT,
        }
    }
}

/// Helpers started for one run, torn down in reverse order.
#[derive(Default)]
struct Session {
    helpers: Vec<HelperProcess>,
    dbus: Option<DbusSession>,
}

impl Session {
    async fn shutdown(mut self, grace: Duration) {
        while let Some(helper) = self.helpers.pop() {
            debug!(name = helper.name(), "stopping helper");
            helper.terminate(grace).await;
        }
        // dbus-daemon is killed on drop, after everything it served is gone.
        drop(self.dbus.take());
    }
}

/// Run the command under Xvfb, Weston, or directly, and return the exit
/// status to report.
pub async fn run_executable(
    options: &RunOptions,
    env: BTreeMap<String, String>,
    config: &ServerConfig,
) -> i32 {
    let result = if cfg!(target_os = "linux") && options.use_xvfb {
        run_with_xvfb(options, env, config).await
    } else if options.use_weston {
        run_with_weston(options, env, config).await
    } else {
        run_test_command(&options.command, &env).await
    };
    result.unwrap_or_else(|err| {
        eprintln!("{}", err);
        err.exit_code()
    })
}

/// Resolves once SIGTERM or SIGINT arrives.
async fn terminated() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
    Ok(())
}

async fn run_with_xvfb(
    options: &RunOptions,
    mut env: BTreeMap<String, String>,
    config: &ServerConfig,
) -> Result<i32> {
    let mut session = Session::default();
    let setup = tokio::select! {
        result = start_x_session(options, &mut env, config, &mut session) => result,
        result = terminated() => result.and(Err(XvfbError::Xvfb("Terminated".to_string()))),
    };
    let result = match setup {
        Ok(()) => run_test_command(&options.command, &env).await,
        Err(err) => Err(err),
    };
    session.shutdown(config.kill_timeout).await;
    result
}

async fn start_x_session(
    options: &RunOptions,
    env: &mut BTreeMap<String, String>,
    config: &ServerConfig,
    session: &mut Session,
) -> Result<()> {
    let help = ToolRunner::run(&ToolCommand::new(
        "Xvfb -help",
        vec![config.xvfb.clone(), "-help".to_string()],
    ))
    .await?;
    let help = format!("{}{}", help.stdout, help.stderr);

    let mut ready = ReadySignal::listen()?;
    let mut xvfb_display = None;
    // Another runner may grab the same display number; try several.
    for attempt in 0..config.display_attempts {
        let candidate = find_display(&config.lock_dir)?;
        let cmd = xvfb_command(&config.xvfb, &candidate, &options.xvfb_whd, &help);
        let mut xvfb = HelperProcess::spawn_signalling_ready("Xvfb", &cmd, env)?;
        if ready
            .wait(&mut xvfb, config.ready_polls, config.ready_interval)
            .await
        {
            session.helpers.push(xvfb);
            xvfb_display = Some(candidate);
            break;
        }
        debug!(attempt, display = %candidate, "Xvfb did not become ready");
        xvfb.terminate(config.kill_timeout).await;
    }
    let Some(xvfb_display) = xvfb_display else {
        return Err(XvfbError::Xvfb(format!(
            "Failed to start after {} tries",
            config.display_attempts
        )));
    };
    info!(display = %xvfb_display, "Xvfb ready");
    env.insert("DISPLAY".to_string(), xvfb_display.clone());
    env.insert("XVFB_DISPLAY".to_string(), xvfb_display);

    session.dbus = launch_dbus(&config.dbus_launch, env).await;

    if config.use_openbox {
        // Openbox runs its --startup command once it manages the screen.
        let startup = format!("kill --signal SIGUSR1 {}", std::process::id());
        let cmd = vec![
            config.openbox.clone(),
            "--sm-disable".to_string(),
            "--startup".to_string(),
            startup,
        ];
        let mut openbox = HelperProcess::spawn("openbox", &cmd, env)?;
        let up = ready
            .wait(&mut openbox, config.ready_polls, config.ready_interval)
            .await;
        session.helpers.push(openbox);
        if !up {
            return Err(XvfbError::Xvfb("Failed to start OpenBox.".to_string()));
        }
    }

    if config.use_xcompmgr {
        let xcompmgr = HelperProcess::spawn("xcompmgr", &[config.xcompmgr.clone()], env)?;
        session.helpers.push(xcompmgr);
    }
    Ok(())
}

async fn run_with_weston(
    options: &RunOptions,
    mut env: BTreeMap<String, String>,
    config: &ServerConfig,
) -> Result<i32> {
    let mut session = Session::default();
    let setup = tokio::select! {
        result = start_weston_session(options, &mut env, config, &mut session) => result,
        result = terminated() => result.and(Err(XvfbError::Weston("Terminated".to_string()))),
    };
    let result = match setup {
        Ok(()) => run_test_command(&options.command, &env).await,
        Err(err) => Err(err),
    };
    session.shutdown(config.kill_timeout).await;
    result
}

async fn start_weston_session(
    options: &RunOptions,
    env: &mut BTreeMap<String, String>,
    config: &ServerConfig,
    session: &mut Session,
) -> Result<()> {
    session.dbus = launch_dbus(&config.dbus_launch, env).await;

    // Targets without the Ozone/Wayland platform do not bundle Weston.
    if !config.weston.is_file() {
        println!("Weston is not available. Starting without Wayland compositor");
        return Ok(());
    }
    ensure_xdg_runtime_dir(env)?;
    if options.weston_debug_logging {
        env.insert("WAYLAND_DEBUG".to_string(), "1".to_string());
    }
    let (weston, wayland_display) =
        start_weston(&config.weston, options.weston_use_gl, env, config.display_attempts).await?;
    session.helpers.push(weston);
    info!(display = %wayland_display, "Weston ready");
    env.insert(crate::weston::WAYLAND_DISPLAY.to_string(), wayland_display);
    Ok(())
}
