//! Integration tests for ToolRunner against real system binaries.

use crtools_core::{ToolCommand, ToolError, ToolRunner};
use tempfile::tempdir;

/// Test: stdin is delivered to the child and closed
#[tokio::test]
async fn test_stdin_is_piped() {
    let config = ToolCommand::from_args("cat", ["cat"]).stdin("SELECT 1;\n");
    let output = ToolRunner::check_output(&config).await.expect("cat failed");
    assert_eq!(output, "SELECT 1;\n");
}

/// Test: a child that writes a lot before reading stdin does not stall
#[tokio::test]
async fn test_large_stdin_and_stdout_together() {
    let input = vec![b'x'; 256 * 1024];
    let config = ToolCommand::from_args(
        "sh",
        ["sh", "-c", "yes | head -c 262144; echo; wc -c"],
    )
    .stdin(input)
    .timeout(30);
    let output = ToolRunner::check_output(&config).await.unwrap();
    assert!(output.starts_with("y\ny\n"));
    assert_eq!(output.lines().last().map(str::trim), Some("262144"));
}

/// Test: a child that exits without reading stdin is not an error
#[tokio::test]
async fn test_unread_stdin_is_ignored() {
    let config = ToolCommand::from_args("true", ["true"]).stdin(vec![b'x'; 1024 * 1024]);
    let output = ToolRunner::run(&config).await.unwrap();
    assert!(output.passed());
}

/// Test: timeouts surface as ToolError::Timeout
#[tokio::test]
async fn test_timeout_is_reported() {
    let config = ToolCommand::from_args("sleep", ["sleep", "5"]).timeout(1);
    let err = ToolRunner::run(&config).await.unwrap_err();
    assert!(matches!(err, ToolError::Timeout { secs: 1, .. }));
}

/// Test: check_output turns non-zero exits into errors carrying the code
#[tokio::test]
async fn test_check_output_failure() {
    let config = ToolCommand::from_args("sh", ["sh", "-c", "echo oops >&2; exit 7"]);
    let err = ToolRunner::check_output(&config).await.unwrap_err();
    match err {
        ToolError::Failed { code, stderr, .. } => {
            assert_eq!(code, 7);
            assert_eq!(stderr, "oops");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        ToolError::Failed {
            name: "x".into(),
            code: 7,
            stderr: String::new()
        }
        .exit_code(),
        7
    );
}

/// Test: env and working directory are applied
#[tokio::test]
async fn test_env_and_cwd() {
    let dir = tempdir().unwrap();
    let config = ToolCommand::from_args("sh", ["sh", "-c", "echo $CRTOOLS_VALUE; pwd"])
        .env("CRTOOLS_VALUE", "env-value")
        .current_dir(dir.path());
    let output = ToolRunner::check_output(&config).await.unwrap();
    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("env-value"));
    let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
}

/// Test: missing executables report a spawn error
#[tokio::test]
async fn test_missing_binary() {
    let config = ToolCommand::from_args("nope", ["/nonexistent/crtools-missing-binary"]);
    let err = ToolRunner::status(&config).await.unwrap_err();
    assert!(matches!(err, ToolError::Spawn { .. }));
}
