//! Command-line options for the dex driver.

use crate::error::DexError;
use crate::Result;
use clap::Parser;
use crtools_core::parse_gn_lists;
use std::path::{Path, PathBuf};

/// Raw flags as the build passes them. GN-list valued flags may repeat and
/// accept either `["a", "b"]` or a plain path.
#[derive(Parser, Debug)]
#[command(name = "dex")]
#[command(about = "Dex Java class files with D8, incrementally when possible", long_about = None)]
#[command(version)]
pub struct DexArgs {
    /// Dex output path (.dex or .dex.jar)
    #[arg(long)]
    pub output: PathBuf,

    /// GN-list of .jars with .class files
    #[arg(long)]
    pub class_inputs: Vec<String>,

    /// GN-list of .jars with .class files (added to depfile)
    #[arg(long)]
    pub class_inputs_filearg: Vec<String>,

    /// GN-list of .jars with .dex files
    #[arg(long)]
    pub dex_inputs: Vec<String>,

    /// GN-list of .jars with .dex files (added to depfile)
    #[arg(long)]
    pub dex_inputs_filearg: Vec<String>,

    /// Directory for intermediate per-class dex files
    #[arg(long)]
    pub incremental_dir: Option<PathBuf>,

    /// Main dex rules for multidex
    #[arg(long)]
    pub main_dex_rules_path: Vec<String>,

    /// Allow multiple dex files within output
    #[arg(long)]
    pub multi_dex: bool,

    /// Allow numerous dex files within output
    #[arg(long)]
    pub library: bool,

    /// Path to the R8 jar
    #[arg(long)]
    pub r8_jar_path: String,

    /// Run stock D8 instead of CustomD8
    #[arg(long)]
    pub skip_custom_d8: bool,

    /// Path to the customized D8 jar
    #[arg(long)]
    pub custom_d8_jar_path: String,

    /// Where to store desugar dependencies
    #[arg(long)]
    pub desugar_dependencies: Option<PathBuf>,

    #[arg(long)]
    pub desugar: bool,

    /// GN-list of the bootclasspath
    #[arg(long)]
    pub bootclasspath: Vec<String>,

    /// Path to desugar_jdk_libs.json
    #[arg(long)]
    pub desugar_jdk_libs_json: Option<String>,

    /// Show desugaring warnings about default or static interface methods
    #[arg(long)]
    pub show_desugar_default_interface_warnings: bool,

    /// GN-list of the full classpath
    #[arg(long)]
    pub classpath: Vec<String>,

    /// Run D8 in release mode
    #[arg(long)]
    pub release: bool,

    /// Minimum Android API level
    #[arg(long)]
    pub min_api: Option<String>,

    /// Force-enable javac generated assertion code
    #[arg(long)]
    pub force_enable_assertions: bool,

    /// Class name of the assertion handler
    #[arg(long)]
    pub assertion_handler: Option<String>,

    /// Treat all warnings as errors
    #[arg(long)]
    pub warnings_as_errors: bool,

    /// Capture D8 inputs to d8inputs.zip for bug reports
    #[arg(long)]
    pub dump_inputs: bool,

    /// Write a Ninja depfile listing the depfile inputs
    #[arg(long)]
    pub depfile: Option<PathBuf>,

    /// Change-tracking stamp (defaults to <output>.changes.json)
    #[arg(long)]
    pub stamp: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Validated options with GN lists expanded.
#[derive(Debug, Clone, Default)]
pub struct DexOptions {
    pub output: PathBuf,
    /// Class jars, `--class-inputs-filearg` included.
    pub class_inputs: Vec<String>,
    /// Dex jars, `--dex-inputs-filearg` included.
    pub dex_inputs: Vec<String>,
    /// Inputs that go into the depfile.
    pub depfile_deps: Vec<String>,
    pub incremental_dir: Option<PathBuf>,
    pub main_dex_rules_path: Vec<String>,
    pub multi_dex: bool,
    pub library: bool,
    pub r8_jar_path: String,
    pub skip_custom_d8: bool,
    pub custom_d8_jar_path: String,
    pub desugar_dependencies: Option<PathBuf>,
    pub desugar: bool,
    pub bootclasspath: Vec<String>,
    pub desugar_jdk_libs_json: Option<String>,
    pub show_desugar_default_interface_warnings: bool,
    pub classpath: Vec<String>,
    pub release: bool,
    pub min_api: Option<String>,
    pub force_enable_assertions: bool,
    pub assertion_handler: Option<String>,
    pub warnings_as_errors: bool,
    pub dump_inputs: bool,
    pub depfile: Option<PathBuf>,
    pub stamp: Option<PathBuf>,
}

impl DexArgs {
    pub fn into_options(self) -> Result<DexOptions> {
        if !self.main_dex_rules_path.is_empty() && !self.multi_dex {
            return Err(DexError::InvalidArgs(
                "--main-dex-rules-path is unused if multidex is not enabled".to_string(),
            ));
        }
        if self.force_enable_assertions && self.assertion_handler.is_some() {
            return Err(DexError::InvalidArgs(
                "Cannot use both --force-enable-assertions and --assertion-handler".to_string(),
            ));
        }

        let class_inputs_filearg = parse_gn_lists(&self.class_inputs_filearg)?;
        let dex_inputs_filearg = parse_gn_lists(&self.dex_inputs_filearg)?;
        let mut class_inputs = parse_gn_lists(&self.class_inputs)?;
        class_inputs.extend(class_inputs_filearg.iter().cloned());
        let mut dex_inputs = parse_gn_lists(&self.dex_inputs)?;
        dex_inputs.extend(dex_inputs_filearg.iter().cloned());
        let mut depfile_deps = class_inputs_filearg;
        depfile_deps.extend(dex_inputs_filearg);

        Ok(DexOptions {
            output: self.output,
            class_inputs,
            dex_inputs,
            depfile_deps,
            incremental_dir: self.incremental_dir,
            main_dex_rules_path: self.main_dex_rules_path,
            multi_dex: self.multi_dex,
            library: self.library,
            r8_jar_path: self.r8_jar_path,
            skip_custom_d8: self.skip_custom_d8,
            custom_d8_jar_path: self.custom_d8_jar_path,
            desugar_dependencies: self.desugar_dependencies,
            desugar: self.desugar,
            bootclasspath: parse_gn_lists(&self.bootclasspath)?,
            desugar_jdk_libs_json: self.desugar_jdk_libs_json,
            show_desugar_default_interface_warnings: self.show_desugar_default_interface_warnings,
            classpath: parse_gn_lists(&self.classpath)?,
            release: self.release,
            min_api: self.min_api,
            force_enable_assertions: self.force_enable_assertions,
            assertion_handler: self.assertion_handler,
            warnings_as_errors: self.warnings_as_errors,
            dump_inputs: self.dump_inputs,
            depfile: self.depfile,
            stamp: self.stamp,
        })
    }
}

impl DexOptions {
    /// The desugar dependencies file, when CustomD8 maintains one.
    pub fn desugar_dependencies_file(&self) -> Option<&Path> {
        if self.skip_custom_d8 {
            return None;
        }
        self.desugar_dependencies.as_deref()
    }

    /// Whether classpath changes can be handled incrementally.
    pub fn tracks_classpath(&self) -> bool {
        self.incremental_dir.is_some()
            && self.desugar
            && !self.classpath.is_empty()
            && self.desugar_dependencies_file().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<DexOptions> {
        let mut argv = vec![
            "dex",
            "--output",
            "out/foo.dex.jar",
            "--r8-jar-path",
            "r8.jar",
            "--custom-d8-jar-path",
            "custom_d8.jar",
        ];
        argv.extend_from_slice(extra);
        DexArgs::try_parse_from(argv).unwrap().into_options()
    }

    #[test]
    fn test_gn_lists_are_expanded() {
        let options = parse(&[
            "--class-inputs",
            r#"["a.jar", "b.jar"]"#,
            "--class-inputs-filearg",
            "c.jar",
            "--dex-inputs-filearg",
            r#"["d.dex.jar"]"#,
            "--classpath",
            r#"["cp1.jar"]"#,
            "--classpath",
            "cp2.jar",
        ])
        .unwrap();
        assert_eq!(options.class_inputs, vec!["a.jar", "b.jar", "c.jar"]);
        assert_eq!(options.dex_inputs, vec!["d.dex.jar"]);
        assert_eq!(options.depfile_deps, vec!["c.jar", "d.dex.jar"]);
        assert_eq!(options.classpath, vec!["cp1.jar", "cp2.jar"]);
    }

    #[test]
    fn test_main_dex_rules_require_multidex() {
        let err = parse(&["--main-dex-rules-path", "rules.txt"]).unwrap_err();
        assert!(err.to_string().contains("multidex is not enabled"));
        assert!(parse(&["--main-dex-rules-path", "rules.txt", "--multi-dex"]).is_ok());
    }

    #[test]
    fn test_assertion_flags_are_exclusive() {
        let err = parse(&["--force-enable-assertions", "--assertion-handler", "Foo"]).unwrap_err();
        assert!(err.to_string().contains("Cannot use both"));
    }

    #[test]
    fn test_desugar_dependencies_need_custom_d8() {
        let options = parse(&["--desugar-dependencies", "deps.txt"]).unwrap();
        assert_eq!(options.desugar_dependencies_file(), Some(Path::new("deps.txt")));
        let options = parse(&["--desugar-dependencies", "deps.txt", "--skip-custom-d8"]).unwrap();
        assert_eq!(options.desugar_dependencies_file(), None);
    }
}
