//! Incremental dexing.
//!
//! With `--incremental-dir`, every class file is dexed on its own into
//! `<incremental-dir>/<class path>.dex`, and only the class files that
//! changed (or must be desugared again) are redone on the next build. The
//! intermediates and pre-dexed inputs are then merged into the output.

use crate::archive::{
    delete_stale_files, extract_matching, intermediate_dex_paths, is_class_file, move_file,
    zip_aligned,
};
use crate::changes::{stamp_path_for, Changes, Stamp};
use crate::d8::{build_dex_command, java_command, run_d8, Dexer};
use crate::desugar::{parse_desugar_deps, required_desugar_classes};
use crate::error::DexError;
use crate::options::DexOptions;
use crate::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, info};

/// One dex invocation: options, the D8 command, and the dexer to run it.
pub struct DexContext<'a> {
    pub options: DexOptions,
    pub dex_cmd: Vec<String>,
    dexer: &'a dyn Dexer,
}

impl<'a> DexContext<'a> {
    pub fn new(options: DexOptions, java_home: &Path, dexer: &'a dyn Dexer) -> Self {
        let dex_cmd = build_dex_command(&options, java_home);
        Self {
            options,
            dex_cmd,
            dexer,
        }
    }

    fn uses_classpath(&self) -> bool {
        self.options.desugar && !self.options.classpath.is_empty()
    }

    fn uses_bootclasspath(&self) -> bool {
        !self.options.classpath.is_empty() || !self.options.main_dex_rules_path.is_empty()
    }

    /// Every file whose content affects the output.
    pub fn input_paths(&self) -> Vec<String> {
        let options = &self.options;
        let mut inputs = options.class_inputs.clone();
        inputs.extend(options.dex_inputs.iter().cloned());
        inputs.push(options.r8_jar_path.clone());
        inputs.push(options.custom_d8_jar_path.clone());
        inputs.extend(options.main_dex_rules_path.iter().cloned());
        if self.uses_classpath() {
            inputs.extend(options.classpath.iter().cloned());
        }
        if self.uses_bootclasspath() {
            inputs.extend(options.bootclasspath.iter().cloned());
        }
        if let Some(json) = &options.desugar_jdk_libs_json {
            inputs.push(json.clone());
        }
        inputs
    }

    /// Inputs listed in the depfile.
    pub fn depfile_deps(&self) -> Vec<String> {
        let mut deps = self.options.depfile_deps.clone();
        if self.uses_classpath() {
            deps.extend(self.options.classpath.iter().cloned());
        }
        if self.uses_bootclasspath() {
            deps.extend(self.options.bootclasspath.iter().cloned());
        }
        deps
    }

    /// The command-line strings whose change forces a full rebuild.
    pub fn input_strings(&self) -> Vec<String> {
        let mut strings = self.dex_cmd.clone();
        strings.push(self.options.incremental_dir.is_some().to_string());
        strings
    }

    /// Jars whose entries are tracked one by one.
    pub fn tracked_jars(&self) -> Vec<String> {
        if self.options.incremental_dir.is_none() {
            return Vec::new();
        }
        let mut jars = self.options.class_inputs.clone();
        if self.options.tracks_classpath() {
            jars.extend(self.options.classpath.iter().cloned());
        }
        jars
    }

    /// What gets merged into the output.
    pub fn final_dex_inputs(&self) -> Result<Vec<String>> {
        let mut inputs = match &self.options.incremental_dir {
            Some(dir) => intermediate_dex_paths(&self.options.class_inputs, dir)?,
            None => self.options.class_inputs.clone(),
        };
        inputs.extend(self.options.dex_inputs.iter().cloned());
        Ok(inputs)
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.options
            .stamp
            .clone()
            .unwrap_or_else(|| stamp_path_for(&self.options.output))
    }

    /// Dex if anything changed since the last run. Returns whether any
    /// work was done.
    pub async fn run(&self) -> Result<bool> {
        let final_dex_inputs = self.final_dex_inputs()?;
        let mut outputs = vec![self.options.output.display().to_string()];
        if self.options.incremental_dir.is_some() {
            outputs.extend(final_dex_inputs.iter().cloned());
        }

        let stamp_path = self.stamp_path();
        let stamp = Stamp::compute(
            &self.input_paths(),
            &self.input_strings(),
            &self.tracked_jars(),
        )?;
        let changes = Changes::new(Stamp::load(&stamp_path), stamp, false);
        // Missing outputs make the build stale without forcing a full rebuild;
        // new classes have no intermediate yet.
        let missing = outputs.iter().find(|path| !Path::new(path).exists());
        if !changes.has_changes() && missing.is_none() {
            debug!(output = %self.options.output.display(), "dex output is up to date");
            return Ok(false);
        }
        let reason = match missing {
            Some(path) if !changes.has_changes() => format!("missing output {}", path),
            _ => changes.describe(),
        };
        info!(output = %self.options.output.display(), reason = %reason, "dexing");

        self.on_stale(&changes, &final_dex_inputs).await?;

        changes.new_stamp().save(&stamp_path)?;
        if let Some(depfile) = &self.options.depfile {
            write_depfile(depfile, &self.options.output, &self.depfile_deps())?;
        }
        Ok(true)
    }

    async fn on_stale(&self, changes: &Changes, final_dex_inputs: &[String]) -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        if let Some(incremental_dir) = &self.options.incremental_dir {
            std::fs::create_dir_all(incremental_dir)?;
            let removed = delete_stale_files(incremental_dir, final_dex_inputs)?;
            debug!("Stale files deleted: {}", removed);
            self.create_intermediate_dex_files(changes, tmp_dir.path(), incremental_dir)
                .await?;
        }
        create_final_dex(
            self.dexer,
            final_dex_inputs,
            &self.options.output,
            tmp_dir.path(),
            &self.dex_cmd,
            Some(&self.options),
        )
        .await
    }

    async fn create_intermediate_dex_files(
        &self,
        changes: &Changes,
        tmp_dir: &Path,
        incremental_dir: &Path,
    ) -> Result<()> {
        let options = &self.options;
        let extract_dir = tmp_dir.join("tmp_extract_dir");
        std::fs::create_dir(&extract_dir)?;

        // Anything changing besides the jars themselves means a full rebuild.
        let allowed: BTreeSet<&String> = options
            .class_inputs
            .iter()
            .chain(&options.dex_inputs)
            .chain(&options.classpath)
            .collect();
        let strings_changed = changes.has_string_changes();
        let changed_paths = changes.changed_paths();
        let other_changed = changed_paths.iter().find(|path| !allowed.contains(path));
        let incremental = if strings_changed || other_changed.is_some() {
            debug!(
                "Full dex required: strings_changed={} path_changed={:?}",
                strings_changed, other_changed
            );
            None
        } else {
            Some(changes)
        };

        let required = match incremental {
            Some(changes) => {
                let deps = parse_desugar_deps(options.desugar_dependencies.as_deref())?;
                let required =
                    required_desugar_classes(changes, &deps, &options.class_inputs, &options.classpath);
                debug!("Class files needing re-desugar: {}", required.len());
                required
            }
            None => BTreeSet::new(),
        };

        let mut class_files = Vec::new();
        for jar in &options.class_inputs {
            let extracted = match incremental {
                Some(changes) => {
                    let mut wanted: BTreeSet<String> =
                        changes.changed_subpaths(jar).into_iter().collect();
                    wanted.extend(required.iter().cloned());
                    extract_matching(jar, &extract_dir, |name| {
                        wanted.contains(name) && is_class_file(name)
                    })?
                }
                None => extract_matching(jar, &extract_dir, is_class_file)?,
            };
            class_files.extend(extracted.into_iter().map(|path| path.display().to_string()));
        }
        debug!("Extracted class files: {}", class_files.len());

        // Deleting a file is the only change when nothing was extracted.
        if class_files.is_empty() {
            return Ok(());
        }

        let mut dex_cmd = self.dex_cmd.clone();
        dex_cmd.extend(["--intermediate".to_string(), "--file-per-class-file".to_string()]);
        if let Some(deps_file) = options.desugar_dependencies_file() {
            dex_cmd.extend([
                "--file-tmp-prefix".to_string(),
                format!("{}{}", extract_dir.display(), MAIN_SEPARATOR),
            ]);
            // Incremental runs only ever add to the file.
            if incremental.is_none() && deps_file.exists() {
                std::fs::remove_file(deps_file)?;
            }
        }
        run_d8(
            self.dexer,
            &dex_cmd,
            &class_files,
            incremental_dir,
            options.warnings_as_errors,
            options.show_desugar_default_interface_warnings,
        )
        .await?;
        debug!("Dexed class files.");
        Ok(())
    }
}

/// Produce `output` from `d8_inputs`.
///
/// Inputs are dexed and merged unless they are all `.dex` files going into
/// a library `.dex.jar`, in which case they are zipped as they are.
pub async fn create_final_dex(
    dexer: &dyn Dexer,
    d8_inputs: &[String],
    output: &Path,
    tmp_dir: &Path,
    dex_cmd: &[String],
    options: Option<&DexOptions>,
) -> Result<()> {
    let output_is_dex = output.to_string_lossy().ends_with(".dex");
    let needs_dexing = !d8_inputs.iter().all(|input| input.ends_with(".dex"));
    let needs_merge = output_is_dex || !options.is_some_and(|options| options.library);

    let mut tmp_output = tmp_dir.join("tmp_dex_output.zip");
    if needs_dexing || needs_merge {
        let mut dex_cmd = dex_cmd.to_vec();
        if let Some(options) = options {
            for rules in &options.main_dex_rules_path {
                dex_cmd.extend(["--main-dex-rules".to_string(), rules.clone()]);
            }
        }
        let dex_dir = tmp_dir.join("tmp_dex_dir");
        std::fs::create_dir(&dex_dir)?;
        run_d8(
            dexer,
            &dex_cmd,
            d8_inputs,
            &dex_dir,
            options.map_or(true, |options| options.warnings_as_errors),
            options.is_some_and(|options| options.show_desugar_default_interface_warnings),
        )
        .await?;
        debug!("Performed dex merging");

        let mut dex_files: Vec<PathBuf> = std::fs::read_dir(&dex_dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<_>>()?;
        dex_files.sort();

        if output_is_dex {
            if dex_files.len() != 1 {
                return Err(DexError::UnexpectedDexCount(dex_files.len()));
            }
            tmp_output = dex_files.remove(0);
        } else {
            zip_aligned(&dex_files, &tmp_output)?;
        }
    } else {
        let mut inputs: Vec<PathBuf> = d8_inputs.iter().map(PathBuf::from).collect();
        inputs.sort();
        zip_aligned(&inputs, &tmp_output)?;
        debug!("Quick-zipped {} files", inputs.len());
    }

    move_file(&tmp_output, output)
}

/// Merge already-dexed `src_paths` into `dest` with stock D8, for
/// incremental install.
pub async fn merge_dex_for_incremental_install(
    dexer: &dyn Dexer,
    java_home: &Path,
    r8_jar_path: &str,
    src_paths: &[String],
    dest: &Path,
    min_api: &str,
) -> Result<()> {
    let mut dex_cmd = java_command(java_home, crate::d8::DEX_XMX);
    dex_cmd.extend([
        "-cp".to_string(),
        r8_jar_path.to_string(),
        "com.android.tools.r8.D8".to_string(),
        "--min-api".to_string(),
        min_api.to_string(),
    ]);
    let tmp_dir = tempfile::tempdir()?;
    create_final_dex(dexer, src_paths, dest, tmp_dir.path(), &dex_cmd, None).await
}

/// Write a Ninja depfile: `<output>: <deps...>`.
pub fn write_depfile(path: &Path, output: &Path, deps: &[String]) -> Result<()> {
    let escape = |value: &str| value.replace(' ', "\\ ");
    let mut line = format!("{}:", escape(&output.display().to_string()));
    for dep in deps {
        line.push(' ');
        line.push_str(&escape(dep));
    }
    line.push('\n');
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, line)?;
    Ok(())
}
