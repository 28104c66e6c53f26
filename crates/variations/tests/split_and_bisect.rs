//! Splitting variations files and bisecting them with a scripted user.

use async_trait::async_trait;
use crtools_core::ToolOutput;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::tempdir;
use variations::{
    bisect, ensure_command_line_length, split_variations_cmd_from_file, Answer, BisectOutcome,
    BrowserLauncher, Oracle, VariationsError,
};

const FOUR_TRIALS: &str = concat!(
    "--force-fieldtrials=\"*T1/G1/T2/G2/T3/G3/T4/G4/\"\n",
    "--force-fieldtrial-params=\"T1.G1:a/1,T3.G3:c/3/d/4\"\n",
    "--enable-features=\"F1<T1,F2\"\n",
    "--disable-features=\"F3\"\n"
);

#[derive(Default)]
struct RecordingLauncher {
    launches: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl BrowserLauncher for RecordingLauncher {
    async fn launch(&self, args: Vec<String>) -> variations::Result<ToolOutput> {
        self.launches.lock().unwrap().push(args);
        Ok(ToolOutput {
            name: "browser".into(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            success: true,
        })
    }
}

struct ScriptedOracle(VecDeque<Answer>);

impl ScriptedOracle {
    fn new(answers: &[Answer]) -> Self {
        ScriptedOracle(answers.iter().copied().collect())
    }
}

impl Oracle for ScriptedOracle {
    fn ask(&mut self, _output: &ToolOutput) -> variations::Result<Answer> {
        Ok(self.0.pop_front().unwrap_or(Answer::Quit))
    }
}

fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("variations.txt");
    std::fs::write(&path, FOUR_TRIALS).unwrap();
    path
}

/// Test: a file splits into two halves with params following their trials
#[test]
fn test_split_file_into_halves() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());
    let written = split_variations_cmd_from_file(&input, None).unwrap();
    assert_eq!(
        written,
        vec![
            dir.path().join("variations_1.txt"),
            dir.path().join("variations_2.txt")
        ]
    );
    assert_eq!(
        std::fs::read_to_string(&written[0]).unwrap(),
        "--force-fieldtrials=\"*T1/G1/T2/G2/\" \
         --force-fieldtrial-params=\"T1.G1:a/1\" \
         --enable-features=\"F1<T1\" \
         --disable-features=\"F3\""
    );
    assert_eq!(
        std::fs::read_to_string(&written[1]).unwrap(),
        "--force-fieldtrials=\"T3/G3/T4/G4/\" \
         --force-fieldtrial-params=\"T3.G3:c/3/d/4\" \
         --enable-features=\"F2\""
    );
}

/// Test: split files land in an explicit output directory
#[test]
fn test_split_file_to_output_dir() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());
    let out = dir.path().join("out");
    let written = split_variations_cmd_from_file(&input, Some(&out)).unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|path| path.starts_with(&out)));
}

/// Test: bisection narrows four trials down to the reproducing one
#[tokio::test]
async fn test_bisect_finds_culprit() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());
    let launcher = RecordingLauncher::default();
    let mut oracle = ScriptedOracle::new(&[Answer::Yes, Answer::No, Answer::Yes, Answer::Yes]);

    let outcome = bisect(
        &launcher,
        &mut oracle,
        &["--enable-logging".to_string()],
        vec![input],
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        BisectOutcome::Culprit(vec![
            "--force-fieldtrials=T3/G3/".to_string(),
            "--force-fieldtrial-params=T3.G3:c/3/d/4".to_string(),
            "--enable-features=F2".to_string(),
        ])
    );

    let launches = launcher.launches.lock().unwrap();
    assert_eq!(launches.len(), 4);
    for args in launches.iter() {
        assert_eq!(args[0], "--no-first-run");
        assert_eq!(args[1], "--no-default-browser-check");
        assert!(args[2].starts_with("--user-data-dir="));
        assert_eq!(args[3], "--enable-logging");
    }
    assert_eq!(launches[0][4], "--force-fieldtrials=*T1/G1/T2/G2/T3/G3/T4/G4/");
    assert_eq!(launches[1][4], "--force-fieldtrials=*T1/G1/T2/G2/");
    assert_eq!(launches[2][4], "--force-fieldtrials=T3/G3/T4/G4/");
}

/// Test: retrying reruns the same file
#[tokio::test]
async fn test_bisect_retry_reruns_file() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());
    let launcher = RecordingLauncher::default();
    let mut oracle = ScriptedOracle::new(&[Answer::Retry, Answer::Quit]);

    let outcome = bisect(&launcher, &mut oracle, &[], vec![input], dir.path())
        .await
        .unwrap();
    assert_eq!(outcome, BisectOutcome::Quit);

    let launches = launcher.launches.lock().unwrap();
    assert_eq!(launches.len(), 2);
    assert_eq!(launches[0][3..], launches[1][3..]);
}

/// Test: neither half reproducing is a failed bisection
#[tokio::test]
async fn test_bisect_fails_when_halves_do_not_reproduce() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());
    let launcher = RecordingLauncher::default();
    let mut oracle = ScriptedOracle::new(&[Answer::Yes, Answer::No, Answer::No]);

    let err = bisect(&launcher, &mut oracle, &[], vec![input], dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, VariationsError::BisectFailed(_)));
}

/// Test: long files are split until each fits the limit
#[test]
fn test_ensure_command_line_length() {
    let dir = tempdir().unwrap();
    let input = write_input(dir.path());

    let unchanged = ensure_command_line_length(&input, dir.path(), 32000).unwrap();
    assert_eq!(unchanged, vec![input.clone()]);

    let halves = ensure_command_line_length(&input, dir.path(), 120).unwrap();
    assert_eq!(
        halves,
        vec![
            dir.path().join("variations_1.txt"),
            dir.path().join("variations_2.txt")
        ]
    );

    let err = ensure_command_line_length(&input, dir.path(), 1).unwrap_err();
    assert!(matches!(err, VariationsError::CannotSplit(_)));
}
