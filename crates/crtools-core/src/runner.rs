//! External tool execution.
//!
//! Every driver in the workspace reaches its tool through [`ToolRunner`],
//! which captures stdout/stderr, enforces an optional timeout and reports a
//! [`ToolOutput`].

use crate::error::ToolError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Description of one external tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Human-readable name used in logs and errors.
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Working directory, inherited when unset.
    pub cwd: Option<PathBuf>,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,

    /// Bytes written to the child's stdin.
    pub stdin: Option<Vec<u8>>,

    /// Timeout in seconds (0 = no timeout).
    pub timeout_secs: u64,
}

impl ToolCommand {
    /// Create a command from a name and an argument vector.
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        ToolCommand {
            name: name.into(),
            command,
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout_secs: 0,
        }
    }

    /// Create a command from anything string-like.
    pub fn from_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, args.into_iter().map(Into::into).collect())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The executable, if any.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    fn build(&self) -> Result<Command> {
        let exe = self
            .program()
            .ok_or_else(|| ToolError::EmptyCommand(self.name.clone()))?;
        let mut cmd = Command::new(exe);
        cmd.args(&self.command[1..]);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        Ok(cmd)
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Tool name.
    pub name: String,

    /// Exit code (0 = success, -1 = killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl ToolOutput {
    /// Whether this tool passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Turn a failed run into [`ToolError::Failed`].
    pub fn into_checked(self) -> Result<ToolOutput> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ToolError::Failed {
                name: self.name,
                code: self.exit_code,
                stderr: self.stderr.trim_end().to_string(),
            })
        }
    }
}

/// Runner for external tools.
pub struct ToolRunner;

impl ToolRunner {
    /// Run a command to completion, capturing stdout and stderr.
    pub async fn run(config: &ToolCommand) -> Result<ToolOutput> {
        let start = Instant::now();
        let mut cmd = config.build()?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if config.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        debug!(name = %config.name, command = %shell_join(&config.command), "running tool");
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: config.command[0].clone(),
            source,
        })?;

        // Fed from its own task so a child that fills stdout before draining
        // stdin cannot stall the run.
        let writer = match (&config.stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.clone();
                Some(tokio::spawn(async move { pipe.write_all(&input).await }))
            }
            _ => None,
        };

        let waited = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ToolError::Timeout {
                name: config.name.clone(),
                secs: config.timeout_secs,
            })
            .and_then(|output| output.map_err(ToolError::from))
        } else {
            child.wait_with_output().await.map_err(ToolError::from)
        };
        let output = match waited {
            Ok(output) => output,
            Err(err) => {
                if let Some(writer) = &writer {
                    writer.abort();
                }
                return Err(err);
            }
        };

        if let Some(writer) = writer {
            match writer.await {
                // The child may exit without reading all of its input.
                Ok(Err(err)) if err.kind() != io::ErrorKind::BrokenPipe => {
                    return Err(err.into());
                }
                Err(err) => return Err(io::Error::other(err).into()),
                _ => {}
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(ToolOutput {
            name: config.name.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }

    /// Run a command and return its stdout, failing on a non-zero exit.
    pub async fn check_output(config: &ToolCommand) -> Result<String> {
        Ok(Self::run(config).await?.into_checked()?.stdout)
    }

    /// Run a command with inherited stdio and return its exit code.
    pub async fn status(config: &ToolCommand) -> Result<i32> {
        let mut cmd = config.build()?;
        debug!(name = %config.name, command = %shell_join(&config.command), "running tool");
        let status = cmd.status().await.map_err(|source| ToolError::Spawn {
            program: config.command[0].clone(),
            source,
        })?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Render an argument vector the way a shell user would type it.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() {
                "''".to_string()
            } else if arg
                .chars()
                .any(|c| c.is_whitespace() || "'\"$`\\|&;<>()*?!#".contains(c))
            {
                format!("'{}'", arg.replace('\'', "'\\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
