//! Interactive bisection of a variations file.
//!
//! The browser is launched with the variations from a file; the user says
//! whether the issue reproduces. A reproducing file is split in two and the
//! halves are tried in turn until a file can be split no further.

use crate::cmd::{read_variations_file, split_variations_cmd_from_file};
use crate::error::VariationsError;
use crate::switches::parse_switches_string;
use crate::Result;
use async_trait::async_trait;
use crtools_core::{shell_join, ToolCommand, ToolOutput, ToolRunner};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Longest variations argument string Windows accepts on a command line.
pub const MAX_ARGS_LENGTH_WIN: usize = 32000;

#[cfg(target_os = "windows")]
const BROWSERS: &[(&str, &str)] = &[
    ("stable", r"Google\Chrome\Application\chrome.exe"),
    ("beta", r"Google\Chrome Beta\Application\chrome.exe"),
    ("dev", r"Google\Chrome Dev\Application\chrome.exe"),
    ("canary", r"Google\Chrome SxS\Application\chrome.exe"),
    ("chromium", r"Chromium\Application\chrome.exe"),
];

#[cfg(target_os = "macos")]
const BROWSERS: &[(&str, &str)] = &[
    (
        "stable",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ),
    (
        "beta",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ),
    (
        "dev",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ),
    (
        "canary",
        "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    ),
];

#[cfg(target_os = "linux")]
const BROWSERS: &[(&str, &str)] = &[
    ("stable", "/usr/bin/google-chrome"),
    ("beta", "/usr/bin/google-chrome-beta"),
    ("dev", "/usr/bin/google-chrome-unstable"),
    ("chromium", "/usr/bin/chromium"),
];

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
const BROWSERS: &[(&str, &str)] = &[];

/// Browser channels known on this platform.
pub fn supported_browser_types() -> Vec<&'static str> {
    BROWSERS.iter().map(|(name, _)| *name).collect()
}

/// Resolve a browser channel to its executable.
pub fn locate_browser(browser_type: &str) -> Result<PathBuf> {
    if BROWSERS.is_empty() {
        return Err(VariationsError::UnsupportedPlatform);
    }
    let Some((_, path)) = BROWSERS.iter().find(|(name, _)| *name == browser_type) else {
        return Err(VariationsError::UnsupportedBrowser(
            supported_browser_types().join(", "),
        ));
    };
    if cfg!(target_os = "windows") {
        // Side-by-side installs live in the user profile.
        let root_var = match browser_type {
            "canary" | "chromium" => "LOCALAPPDATA",
            _ => "ProgramFiles",
        };
        let root = std::env::var(root_var).unwrap_or_default();
        return Ok(Path::new(&root).join(path));
    }
    Ok(PathBuf::from(path))
}

/// Read a variations file as `--name=value` arguments.
pub fn load_variations(path: &Path) -> Result<Vec<String>> {
    let switches = parse_switches_string(&read_variations_file(path)?)?;
    Ok(switches
        .into_iter()
        .map(|(name, value)| format!("--{}={}", name, value))
        .collect())
}

/// Arguments for a fresh browser run that skips first-run setup.
pub fn build_browser_args(
    user_data_dir: &Path,
    extra_browser_args: &[String],
    variations_args: &[String],
) -> Vec<String> {
    let mut args = vec![
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        format!("--user-data-dir={}", user_data_dir.display()),
    ];
    args.extend(extra_browser_args.iter().cloned());
    args.extend(variations_args.iter().cloned());
    args
}

/// Split `filename` until every piece's variations fit in `max_len`
/// characters.
pub fn ensure_command_line_length(
    filename: &Path,
    output_dir: &Path,
    max_len: usize,
) -> Result<Vec<PathBuf>> {
    let mut to_process = vec![filename.to_path_buf()];
    let mut result = Vec::new();
    while !to_process.is_empty() {
        let mut next = Vec::new();
        for file in to_process {
            let args = load_variations(&file)?.join(" ");
            if args.len() <= max_len {
                result.push(file);
                continue;
            }
            let split = split_variations_cmd_from_file(&file, Some(output_dir))?;
            if split.len() == 1 {
                return Err(VariationsError::CannotSplit(args));
            }
            next.extend(split);
        }
        to_process = next;
    }
    Ok(result)
}

/// Runs the browser with a set of arguments.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, args: Vec<String>) -> Result<ToolOutput>;
}

/// Launches a real browser binary and waits for it to exit.
pub struct ProcessLauncher {
    pub browser_path: PathBuf,
    pub url: Option<String>,
}

#[async_trait]
impl BrowserLauncher for ProcessLauncher {
    async fn launch(&self, args: Vec<String>) -> Result<ToolOutput> {
        let browser = std::path::absolute(&self.browser_path)?;
        let mut command = vec![browser.display().to_string()];
        command.extend(self.url.iter().cloned());
        command.extend(args);
        debug!("{}", shell_join(&command));
        Ok(ToolRunner::run(&ToolCommand::new("browser", command)).await?)
    }
}

/// The user's verdict on one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Retry,
    Quit,
}

/// Decides whether a run reproduced the issue.
pub trait Oracle {
    fn ask(&mut self, output: &ToolOutput) -> Result<Answer>;
}

/// Asks on a terminal. `s` shows the browser output and asks again.
pub struct PromptOracle<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptOracle<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptOracle { input, output }
    }
}

impl<R: BufRead, W: Write> Oracle for PromptOracle<R, W> {
    fn ask(&mut self, run: &ToolOutput) -> Result<Answer> {
        loop {
            write!(
                self.output,
                "Can we reproduce with given variations file \
                 [(y)es/(n)o/(r)etry/(s)tdout/(q)uit]: "
            )?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Answer::Quit);
            }
            match line.trim().to_lowercase().as_str() {
                "y" => return Ok(Answer::Yes),
                "n" => return Ok(Answer::No),
                "r" => return Ok(Answer::Retry),
                "q" => return Ok(Answer::Quit),
                "s" => {
                    info!("{}", run.stdout);
                    info!("{}", run.stderr);
                }
                _ => {}
            }
        }
    }
}

/// How a bisection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectOutcome {
    /// The variations arguments that alone reproduce the issue.
    Culprit(Vec<String>),
    Quit,
}

/// Bisect `runs`, the variations files to try first (usually one).
pub async fn bisect(
    launcher: &dyn BrowserLauncher,
    oracle: &mut dyn Oracle,
    extra_browser_args: &[String],
    runs: Vec<PathBuf>,
    output_dir: &Path,
) -> Result<BisectOutcome> {
    let mut runs = runs;
    while let Some(run) = runs.first().cloned() {
        println!("Run Chrome with variations file {}", run.display());
        let variations_args = load_variations(&run)?;

        let user_data_dir = tempfile::Builder::new()
            .prefix("bisect_variations_tmp")
            .tempdir()?;
        let args = build_browser_args(user_data_dir.path(), extra_browser_args, &variations_args);
        let output = launcher.launch(args).await?;
        drop(user_data_dir);

        match oracle.ask(&output)? {
            Answer::Yes => {
                runs = split_variations_cmd_from_file(&run, Some(output_dir))?;
                if runs.len() == 1 {
                    println!("Bisecting succeeded: {}", variations_args.join(" "));
                    return Ok(BisectOutcome::Culprit(variations_args));
                }
            }
            Answer::No => {
                if runs.len() == 1 {
                    return Err(VariationsError::BisectFailed(variations_args.join(" ")));
                }
                runs.remove(0);
            }
            Answer::Retry => {}
            Answer::Quit => return Ok(BisectOutcome::Quit),
        }
    }
    Ok(BisectOutcome::Quit)
}
