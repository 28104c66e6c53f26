//! Full runs against shell-script stand-ins for Xvfb, Openbox and xcompmgr.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use xvfb_runner::{run_executable, RunOptions, ServerConfig};

const FAKE_XVFB: &str = r#"#!/bin/sh
if [ "$1" = "-help" ]; then
  echo "-maxclients n  set maximum number of clients"
  exit 1
fi
echo $$ > "$FAKE_DIR/xvfb.pid"
echo "$@" > "$FAKE_DIR/xvfb.args"
kill -USR1 $PPID
exec sleep 30
"#;

const BROKEN_XVFB: &str = r#"#!/bin/sh
if [ "$1" = "-help" ]; then
  exit 1
fi
echo run >> "$FAKE_DIR/xvfb.runs"
exit 1
"#;

const FAKE_OPENBOX: &str = r#"#!/bin/sh
echo $$ > "$FAKE_DIR/openbox.pid"
echo "$1 $2" > "$FAKE_DIR/openbox.args"
kill -USR1 ${3##* }
exec sleep 30
"#;

const FAKE_XCOMPMGR: &str = r#"#!/bin/sh
echo $$ > "$FAKE_DIR/xcompmgr.pid"
exec sleep 30
"#;

struct Fakes {
    dir: TempDir,
}

impl Fakes {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("locks")).unwrap();
        Fakes { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn script(&self, name: &str, content: &str) -> String {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn config(&self, xvfb: &str) -> ServerConfig {
        ServerConfig {
            xvfb: self.script("Xvfb", xvfb),
            openbox: self.script("openbox", FAKE_OPENBOX),
            xcompmgr: self.script("xcompmgr", FAKE_XCOMPMGR),
            dbus_launch: "/nonexistent/dbus-launch".to_string(),
            weston: self.path("weston"),
            lock_dir: self.path("locks"),
            display_attempts: 3,
            kill_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn env(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars().collect();
        env.insert("FAKE_DIR".to_string(), self.dir.path().display().to_string());
        // Skip dbus-launch.
        env.insert(
            "DBUS_SESSION_BUS_ADDRESS".to_string(),
            "unix:path=/nonexistent".to_string(),
        );
        env.remove("DISPLAY");
        env.remove("WAYLAND_DISPLAY");
        env
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap().trim().to_string()
    }

    fn pid_is_gone(&self, name: &str) -> bool {
        let pid = self.read(name);
        !Path::new("/proc").join(pid).exists()
    }
}

fn command(script: &str, extra: &[&str]) -> RunOptions {
    let mut cmd = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    cmd.extend(extra.iter().map(|s| s.to_string()));
    RunOptions::from_command(cmd).unwrap()
}

/// Test: the command runs on the Xvfb display and every helper is stopped
#[tokio::test]
async fn test_runs_under_xvfb_and_cleans_up() {
    let fakes = Fakes::new();
    let config = fakes.config(FAKE_XVFB);
    let options = command(
        r#"echo "$DISPLAY $XVFB_DISPLAY" > "$FAKE_DIR/display"; exit 4"#,
        &["--xvfb-whd=1920x1080x24"],
    );

    let code = run_executable(&options, fakes.env(), &config).await;
    assert_eq!(code, 4);

    let display = fakes.read("display");
    let (display, xvfb_display) = display.split_once(' ').unwrap();
    assert_eq!(display, xvfb_display);
    let number: u32 = display.trim_start_matches(':').parse().unwrap();
    assert!((99..=119).contains(&number));

    let args = fakes.read("xvfb.args");
    assert!(args.starts_with(&format!("{} -screen 0 1920x1080x24 -ac", display)));
    assert!(args.ends_with("-maxclients 512"));
    assert_eq!(fakes.read("openbox.args"), "--sm-disable --startup");

    assert!(fakes.pid_is_gone("xvfb.pid"));
    assert!(fakes.pid_is_gone("openbox.pid"));
    assert!(fakes.pid_is_gone("xcompmgr.pid"));
}

/// Test: an Xvfb that never becomes ready fails the run with status 1
#[tokio::test]
async fn test_xvfb_never_ready() {
    let fakes = Fakes::new();
    let config = fakes.config(BROKEN_XVFB);
    let options = command(r#"touch "$FAKE_DIR/ran""#, &[]);

    let code = run_executable(&options, fakes.env(), &config).await;
    assert_eq!(code, 1);
    assert_eq!(fakes.read("xvfb.runs").lines().count(), 3);
    assert!(!fakes.path("ran").exists());
}

/// Test: with every display locked nothing is started
#[tokio::test]
async fn test_no_free_display() {
    let fakes = Fakes::new();
    for display in 99..=119 {
        fs::write(fakes.path("locks").join(format!(".X{}-lock", display)), "").unwrap();
    }
    let config = fakes.config(BROKEN_XVFB);
    let code = run_executable(&command("exit 0", &[]), fakes.env(), &config).await;
    assert_eq!(code, 1);
    assert!(!fakes.path("xvfb.runs").exists());
}

/// Test: --no-xvfb runs the command directly
#[tokio::test]
async fn test_no_xvfb_runs_directly() {
    let fakes = Fakes::new();
    let config = fakes.config(BROKEN_XVFB);
    let options = command(r#"test -z "$DISPLAY" && exit 5"#, &["--no-xvfb"]);
    assert!(!options.use_xvfb);

    assert_eq!(run_executable(&options, fakes.env(), &config).await, 5);
    assert!(!fakes.path("xvfb.runs").exists());
}

/// Test: without a Weston binary the command still runs
#[tokio::test]
async fn test_weston_missing_runs_directly() {
    let fakes = Fakes::new();
    let config = fakes.config(BROKEN_XVFB);
    let options = command(
        r#"test -z "$WAYLAND_DISPLAY" && exit 6"#,
        &["--no-xvfb", "--use-weston"],
    );
    assert!(options.use_weston);

    assert_eq!(run_executable(&options, fakes.env(), &config).await, 6);
}
