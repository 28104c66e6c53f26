//! A parsed variations command and its halves.

use crate::error::VariationsError;
use crate::switches::{
    build_feature_list, build_force_field_trial_params, build_force_field_trials,
    parse_feature_list, parse_force_field_trial_params, parse_force_field_trials,
    parse_switches_string, unquote, validate_trials_and_params, Feature, Trial, TrialParams,
    DISABLE_FEATURES, ENABLE_FEATURES, FORCE_FIELD_TRIALS, FORCE_FIELD_TRIAL_PARAMS,
};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The experiments a browser runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationsCmd {
    pub field_trials: Vec<Trial>,
    pub field_trial_params: Vec<TrialParams>,
    pub enable_features: Vec<Feature>,
    pub disable_features: Vec<Feature>,
}

impl VariationsCmd {
    /// Parse the switches printed by `chrome://version/?show-variations-cmd`.
    pub fn parse(input: &str) -> Result<VariationsCmd> {
        let mut cmd = VariationsCmd::default();
        for (name, value) in parse_switches_string(input)? {
            let rebuilt = match name.as_str() {
                FORCE_FIELD_TRIALS => {
                    cmd.field_trials = parse_force_field_trials(&value)?;
                    build_force_field_trials(&cmd.field_trials)
                }
                DISABLE_FEATURES => {
                    cmd.disable_features = parse_feature_list(&value, true)?;
                    build_feature_list(&cmd.disable_features)
                }
                ENABLE_FEATURES => {
                    cmd.enable_features = parse_feature_list(&value, false)?;
                    build_feature_list(&cmd.enable_features)
                }
                FORCE_FIELD_TRIAL_PARAMS => {
                    cmd.field_trial_params = parse_force_field_trial_params(&value)?;
                    build_force_field_trial_params(&cmd.field_trial_params)
                }
                _ => return Err(VariationsError::UnexpectedSwitch { name, value }),
            };
            if rebuilt != value {
                return Err(VariationsError::RoundTrip {
                    switch: name,
                    value,
                    rebuilt,
                });
            }
        }
        validate_trials_and_params(&cmd.field_trials, &cmd.field_trial_params)?;
        Ok(cmd)
    }

    /// Read and parse a variations file; newlines count as spaces.
    pub fn from_file(path: &Path) -> Result<VariationsCmd> {
        Self::parse(&read_variations_file(path)?)
    }

    pub fn is_empty(&self) -> bool {
        self.field_trials.is_empty()
            && self.field_trial_params.is_empty()
            && self.enable_features.is_empty()
            && self.disable_features.is_empty()
    }

    /// Render as `--switch="value"` strings, skipping empty switches.
    pub fn to_strings(&self) -> Vec<String> {
        let mut cmd_list = Vec::new();
        if !self.field_trials.is_empty() {
            cmd_list.push(format!(
                "--{}=\"{}\"",
                FORCE_FIELD_TRIALS,
                build_force_field_trials(&self.field_trials)
            ));
        }
        if !self.field_trial_params.is_empty() {
            cmd_list.push(format!(
                "--{}=\"{}\"",
                FORCE_FIELD_TRIAL_PARAMS,
                build_force_field_trial_params(&self.field_trial_params)
            ));
        }
        if !self.enable_features.is_empty() {
            cmd_list.push(format!(
                "--{}=\"{}\"",
                ENABLE_FEATURES,
                build_feature_list(&self.enable_features)
            ));
        }
        if !self.disable_features.is_empty() {
            cmd_list.push(format!(
                "--{}=\"{}\"",
                DISABLE_FEATURES,
                build_feature_list(&self.disable_features)
            ));
        }
        cmd_list
    }

    /// Split every list in half; the first half gets the extra element.
    /// Trial params follow their trial. Either half may be empty.
    pub fn split(&self) -> [VariationsCmd; 2] {
        let middle = self.field_trials.len().div_ceil(2);
        let (trials_first, trials_second) = self.field_trials.split_at(middle);
        let (enable_first, enable_second) = split_half(&self.enable_features);
        let (disable_first, disable_second) = split_half(&self.disable_features);
        [
            VariationsCmd {
                field_trials: trials_first.to_vec(),
                field_trial_params: self.params_for(trials_first),
                enable_features: enable_first.to_vec(),
                disable_features: disable_first.to_vec(),
            },
            VariationsCmd {
                field_trials: trials_second.to_vec(),
                field_trial_params: self.params_for(trials_second),
                enable_features: enable_second.to_vec(),
                disable_features: disable_second.to_vec(),
            },
        ]
    }

    fn params_for(&self, trials: &[Trial]) -> Vec<TrialParams> {
        trials
            .iter()
            .filter_map(|trial| {
                self.field_trial_params
                    .iter()
                    .rev()
                    .find(|params| unquote(&params.trial_name) == trial.trial_name)
                    .cloned()
            })
            .collect()
    }
}

fn split_half<T>(items: &[T]) -> (&[T], &[T]) {
    items.split_at(items.len().div_ceil(2))
}

pub(crate) fn read_variations_file(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?.replace('\n', " "))
}

/// Split a command string into at most two command strings. A command that
/// cannot be divided comes back as a single string.
pub fn split_variations_cmd_from_string(input: &str) -> Result<Vec<String>> {
    let cmd = VariationsCmd::parse(input)?;
    Ok(cmd
        .split()
        .iter()
        .map(VariationsCmd::to_strings)
        .filter(|cmd_list| !cmd_list.is_empty())
        .map(|cmd_list| cmd_list.join(" "))
        .collect())
}

/// Split `input` into `<base>_1<ext>` and `<base>_2<ext>` inside
/// `output_dir` (default: next to the input). Returns the files written.
pub fn split_variations_cmd_from_file(
    input: &Path,
    output_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let splits = split_variations_cmd_from_string(&read_variations_file(input)?)?;

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&output_dir)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut written = Vec::with_capacity(splits.len());
    for (index, split) in splits.iter().enumerate() {
        let path = output_dir.join(format!("{}_{}{}", stem, index + 1, ext));
        std::fs::write(&path, split)?;
        debug!(path = %path.display(), "wrote variations split");
        written.push(path);
    }
    Ok(written)
}
