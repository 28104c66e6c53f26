//! Running the test command itself.

use crate::error::XvfbError;
use crate::helper::send_signal;
use crate::Result;
use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};

/// Variables every test sees: running non-interactively on a bot, in English.
pub const TEST_ENV: &[(&str, &str)] = &[("CHROME_HEADLESS", "1"), ("LANG", "en_US.UTF-8")];

/// Shell exit status for a process: its code, or 128 + signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}

/// Run `cmd` with `env` plus [`TEST_ENV`], forwarding SIGTERM and SIGINT to
/// it, and return its exit status.
pub async fn run_test_command(cmd: &[String], env: &BTreeMap<String, String>) -> Result<i32> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| XvfbError::Usage(crate::options::USAGE.to_string()))?;

    let mut env = env.clone();
    env.remove("CR_SOURCE_ROOT");
    let mut extra: Vec<(String, String)> = TEST_ENV
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for key in ["GTEST_SHARD_INDEX", "GTEST_TOTAL_SHARDS"] {
        if let Some(value) = env.get(key) {
            extra.push((key.to_string(), value.clone()));
        }
    }
    println!(
        "Additional test environment:\n{}\nCommand: {}\n",
        extra
            .iter()
            .map(|(k, v)| format!("    {}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n"),
        cmd.join(" ")
    );
    env.extend(extra);

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut child = Command::new(program)
        .args(args)
        .env_clear()
        .envs(&env)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| XvfbError::Spawn {
            name: program.clone(),
            source,
        })?;

    loop {
        let sig = tokio::select! {
            status = child.wait() => return Ok(exit_code(status?)),
            _ = terminate.recv() => libc::SIGTERM,
            _ = interrupt.recv() => libc::SIGINT,
        };
        if let Some(pid) = child.id() {
            println!("Forwarding signal({}) to process {}", sig, pid);
            send_signal(pid, sig);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn env() -> BTreeMap<String, String> {
        std::env::vars().collect()
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        assert_eq!(run_test_command(&sh("exit 0"), &env()).await.unwrap(), 0);
        assert_eq!(run_test_command(&sh("exit 7"), &env()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_test_environment() {
        let mut env = env();
        env.insert("CR_SOURCE_ROOT".to_string(), "/src".to_string());
        let code = run_test_command(
            &sh(r#"test "$CHROME_HEADLESS" = 1 && test "$LANG" = en_US.UTF-8 && test -z "$CR_SOURCE_ROOT""#),
            &env,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_killed_by_signal() {
        let code = run_test_command(&sh("kill -KILL $$"), &env()).await.unwrap();
        assert_eq!(code, 128 + libc::SIGKILL);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = run_test_command(&["/nonexistent/test".to_string()], &env())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
