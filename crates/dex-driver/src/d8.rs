//! Building and running the D8 command line.

use crate::error::DexError;
use crate::filter::StderrFilter;
use crate::options::DexOptions;
use crate::Result;
use async_trait::async_trait;
use crtools_core::{shell_join, ToolCommand, ToolOutput, ToolRunner};
use std::io::Write;
use std::path::Path;
use tracing::{debug, enabled, Level};

/// Heap for the dexer; raise when merging OOMs.
pub const DEX_XMX: &str = "2G";

/// Above this many arguments, flags move into a response file.
pub const MAX_ARGS: usize = 50;

/// Runs the dexer.
#[async_trait]
pub trait Dexer: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs D8 as a subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessDexer;

#[async_trait]
impl Dexer for ProcessDexer {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        Ok(ToolRunner::run(command).await?)
    }
}

/// `java` from the checked-in JDK with the dexer's heap size.
pub fn java_command(java_home: &Path, xmx: &str) -> Vec<String> {
    vec![
        java_home.join("bin").join("java").display().to_string(),
        format!("-Xmx{}", xmx),
    ]
}

/// The D8 invocation without inputs or output.
pub fn build_dex_command(options: &DexOptions, java_home: &Path) -> Vec<String> {
    let mut cmd = java_command(java_home, DEX_XMX);
    if options.dump_inputs {
        cmd.push("-Dcom.android.tools.r8.dumpinputtofile=d8inputs.zip".to_string());
    }
    if options.skip_custom_d8 {
        cmd.extend([
            "-cp".to_string(),
            options.r8_jar_path.clone(),
            "com.android.tools.r8.D8".to_string(),
        ]);
    } else {
        cmd.extend([
            "-cp".to_string(),
            format!("{}:{}", options.r8_jar_path, options.custom_d8_jar_path),
            "org.chromium.build.CustomD8".to_string(),
        ]);
    }

    if options.release {
        cmd.push("--release".to_string());
    }
    if let Some(min_api) = &options.min_api {
        cmd.extend(["--min-api".to_string(), min_api.clone()]);
    }

    if !options.desugar {
        cmd.push("--no-desugaring".to_string());
    } else if !options.classpath.is_empty() {
        if let Some(deps) = options.desugar_dependencies_file() {
            cmd.extend(["--desugar-dependencies".to_string(), deps.display().to_string()]);
        }
        // The whole classpath, so that new desugar dependencies are recorded.
        for path in &options.classpath {
            cmd.extend(["--classpath".to_string(), path.clone()]);
        }
    }

    if !options.classpath.is_empty() || !options.main_dex_rules_path.is_empty() {
        // --main-dex-rules needs the bootclasspath too.
        cmd.extend(["--lib".to_string(), java_home.display().to_string()]);
        for path in &options.bootclasspath {
            cmd.extend(["--lib".to_string(), path.clone()]);
        }
    }

    if let Some(json) = &options.desugar_jdk_libs_json {
        cmd.extend(["--desugared-lib".to_string(), json.clone()]);
    }
    if let Some(handler) = &options.assertion_handler {
        cmd.push(format!("--force-assertions-handler:{}", handler));
    }
    if options.force_enable_assertions {
        cmd.push("--force-enable-assertions".to_string());
    }
    cmd
}

/// Replace everything from the first `--` flag onward with `@<flag file>`
/// when the command is too long. Returns the new command and the flag file,
/// which must outlive the run.
pub fn spill_to_flag_file(
    cmd: Vec<String>,
) -> Result<(Vec<String>, Option<tempfile::NamedTempFile>)> {
    if cmd.len() <= MAX_ARGS {
        return Ok((cmd, None));
    }
    let Some(index) = cmd.iter().position(|arg| arg.starts_with("--")) else {
        return Ok((cmd, None));
    };
    let mut flag_file = tempfile::Builder::new()
        .prefix("d8_flags")
        .suffix(".txt")
        .tempfile()?;
    flag_file.write_all(cmd[index..].join("\n").as_bytes())?;
    flag_file.flush()?;

    let mut short = cmd[..index].to_vec();
    short.push(format!("@{}", flag_file.path().display()));
    Ok((short, Some(flag_file)))
}

/// Run D8 over `inputs`, writing into `output`.
///
/// Stderr is filtered; whatever survives is printed. A non-zero exit, or
/// any surviving output with `warnings_as_errors`, fails the run.
pub async fn run_d8(
    dexer: &dyn Dexer,
    dex_cmd: &[String],
    inputs: &[String],
    output: &Path,
    warnings_as_errors: bool,
    show_desugar_default_interface_warnings: bool,
) -> Result<()> {
    let mut full = dex_cmd.to_vec();
    full.extend(["--output".to_string(), output.display().to_string()]);
    full.extend(inputs.iter().cloned());

    let (cmd, flag_file) = spill_to_flag_file(full.clone())?;
    let spilled = flag_file.is_some();
    let result = dexer.run(&ToolCommand::new("d8", cmd)).await;

    // Keep the flag file around for inspection when debugging.
    if let Some(file) = flag_file {
        if enabled!(Level::DEBUG) {
            if let Ok((_, path)) = file.keep() {
                debug!(path = %path.display(), "kept D8 flag file");
            }
        }
    }

    let result = result?;
    let stderr = StderrFilter::new(show_desugar_default_interface_warnings).filter(&result.stderr);
    if !stderr.is_empty() {
        eprint!("{}", stderr);
    }
    let failure = if !result.passed() {
        Some(DexError::DexFailed {
            code: result.exit_code,
        })
    } else if warnings_as_errors && !stderr.trim().is_empty() {
        Some(DexError::WarningsAsErrors)
    } else {
        None
    };
    match failure {
        Some(err) => {
            if spilled {
                eprintln!("Full command: {}", shell_join(&full));
            }
            Err(err)
        }
        None => Ok(()),
    }
}
