//! The four variations switches and their value grammars.
//!
//! `chrome://version/?show-variations-cmd` prints the experiments a browser
//! runs with as:
//!
//! ```text
//! --force-fieldtrials="Trial1/Group1/*Trial2/Group2/"
//! --force-fieldtrial-params="Trial1.Group1:key/value/key2/value2"
//! --enable-features="Feature1<Trial1,*Feature2"
//! --disable-features="Feature3"
//! ```

use crate::error::VariationsError;
use crate::Result;
use percent_encoding::percent_decode_str;

pub const ENABLE_FEATURES: &str = "enable-features";
pub const DISABLE_FEATURES: &str = "disable-features";
pub const FORCE_FIELD_TRIALS: &str = "force-fieldtrials";
pub const FORCE_FIELD_TRIAL_PARAMS: &str = "force-fieldtrial-params";

/// One `Trial/Group` pair of `--force-fieldtrials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    /// `*` prefix: the trial is activated at startup.
    pub star: bool,
    pub trial_name: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: String,
    pub value: String,
}

/// One `Trial.Group:k/v/...` entry of `--force-fieldtrial-params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialParams {
    pub trial_name: String,
    pub group_name: String,
    pub params: Vec<Param>,
}

/// One entry of `--enable-features` or `--disable-features`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub star: bool,
    pub key: String,
    /// The trial after `<`, if any.
    pub value: Option<String>,
}

pub fn parse_force_field_trials(data: &str) -> Result<Vec<Trial>> {
    let items: Vec<&str> = data.trim_end_matches('/').split('/').collect();
    if items.len() % 2 != 0 {
        return Err(VariationsError::OddTrialList);
    }
    Ok(items
        .chunks(2)
        .map(|pair| {
            let (star, trial_name) = match pair[0].strip_prefix('*') {
                Some(rest) => (true, rest),
                None => (false, pair[0]),
            };
            Trial {
                star,
                trial_name: trial_name.to_string(),
                group_name: pair[1].to_string(),
            }
        })
        .collect())
}

pub fn build_force_field_trials(trials: &[Trial]) -> String {
    trials
        .iter()
        .map(|trial| {
            format!(
                "{}{}/{}/",
                if trial.star { "*" } else { "" },
                trial.trial_name,
                trial.group_name
            )
        })
        .collect()
}

pub fn parse_force_field_trial_params(data: &str) -> Result<Vec<TrialParams>> {
    data.split(',').map(parse_trial_params_item).collect()
}

fn parse_trial_params_item(item: &str) -> Result<TrialParams> {
    let tokens: Vec<&str> = item.split(':').collect();
    let [trial_group, params] = tokens.as_slice() else {
        return Err(VariationsError::InvalidTrialParams(format!(
            "Wrong format, expected trial_name.group_name:p0/v0/.../pN/vN, got {}",
            item
        )));
    };
    let names: Vec<&str> = trial_group.split('.').collect();
    let [trial_name, group_name] = names.as_slice() else {
        return Err(VariationsError::InvalidTrialParams(format!(
            "Wrong format, expected trial_name.group_name, got {}",
            trial_group
        )));
    };
    if trial_name.is_empty() || trial_name.starts_with('*') {
        return Err(VariationsError::InvalidTrialParams(format!(
            "Wrong field trail params format: {}",
            item
        )));
    }
    let values: Vec<&str> = params.split('/').collect();
    if values.len() < 2 || values.len() % 2 != 0 {
        return Err(VariationsError::InvalidTrialParams(format!(
            "Field trial params should be param/value pairs {}",
            params
        )));
    }
    Ok(TrialParams {
        trial_name: trial_name.to_string(),
        group_name: group_name.to_string(),
        params: values
            .chunks(2)
            .map(|pair| Param {
                key: pair[0].to_string(),
                value: pair[1].to_string(),
            })
            .collect(),
    })
}

pub fn build_force_field_trial_params(trials: &[TrialParams]) -> String {
    trials
        .iter()
        .map(|trial| {
            let params: Vec<String> = trial
                .params
                .iter()
                .map(|param| format!("{}/{}", param.key, param.value))
                .collect();
            format!(
                "{}.{}:{}",
                trial.trial_name,
                trial.group_name,
                params.join("/")
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a feature list; `*` is only meaningful for enabled features.
pub fn parse_feature_list(data: &str, is_disable: bool) -> Result<Vec<Feature>> {
    data.split(',')
        .map(|item| {
            let (feature, value) = match item.split_once('<') {
                Some((feature, value)) => (feature, Some(value.to_string())),
                None => (item, None),
            };
            let (star, key) = match feature.strip_prefix('*') {
                Some(_) if is_disable => return Err(VariationsError::StarredDisabledFeature),
                Some(rest) => (true, rest),
                None => (false, feature),
            };
            Ok(Feature {
                star,
                key: key.to_string(),
                value,
            })
        })
        .collect()
}

pub fn build_feature_list(features: &[Feature]) -> String {
    features
        .iter()
        .map(|feature| {
            format!(
                "{}{}{}",
                if feature.star { "*" } else { "" },
                feature.key,
                feature
                    .value
                    .as_ref()
                    .map(|v| format!("<{}", v))
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Check that every params entry names a forced trial with the same group.
pub fn validate_trials_and_params(trials: &[Trial], params: &[TrialParams]) -> Result<()> {
    if params.len() > trials.len() {
        return Err(VariationsError::TooManyParams {
            params: params.len(),
            trials: trials.len(),
        });
    }
    for param in params {
        let trial_name = unquote(&param.trial_name);
        let group_name = unquote(&param.group_name);
        // Later duplicates win, as in a name-keyed map.
        let Some(trial) = trials.iter().rev().find(|t| t.trial_name == trial_name) else {
            return Err(VariationsError::UnknownTrial(trial_name));
        };
        if group_name != trial.group_name {
            return Err(VariationsError::GroupMismatch {
                trial: trial_name,
                params_group: group_name,
                trial_group: trial.group_name.clone(),
            });
        }
    }
    Ok(())
}

/// Split `--name=value --name2="value2"` into ordered `(name, value)` pairs.
///
/// Surrounding quotes are dropped, and a `--force-fieldtrials` value always
/// ends with `/` (older browsers omit it).
pub fn parse_switches_string(data: &str) -> Result<Vec<(String, String)>> {
    let mut switches: Vec<(String, String)> = Vec::new();
    for switch in data.split("--").skip(1) {
        let switch = switch.trim();
        let Some((name, value)) = switch.split_once('=') else {
            return Err(VariationsError::MalformedSwitch(switch.to_string()));
        };
        let mut value = value;
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        let mut value = value.to_string();
        if name == FORCE_FIELD_TRIALS && !value.ends_with('/') {
            value.push('/');
        }
        match switches.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value,
            None => switches.push((name.to_string(), value)),
        }
    }
    Ok(switches)
}

pub(crate) fn unquote(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_force_field_trials() {
        let trials = parse_force_field_trials("Trial1/Group1/*Trial2/Group2/").unwrap();
        assert_eq!(
            trials,
            vec![
                Trial {
                    star: false,
                    trial_name: "Trial1".into(),
                    group_name: "Group1".into()
                },
                Trial {
                    star: true,
                    trial_name: "Trial2".into(),
                    group_name: "Group2".into()
                },
            ]
        );
        assert_eq!(
            build_force_field_trials(&trials),
            "Trial1/Group1/*Trial2/Group2/"
        );
    }

    #[test]
    fn test_odd_trial_list() {
        assert!(matches!(
            parse_force_field_trials("Trial1/Group1/Trial2/"),
            Err(VariationsError::OddTrialList)
        ));
    }

    #[test]
    fn test_parse_trial_params() {
        let value = "Trial1.Group1:k1/v1/k2/v2,Trial2.Group2:x/%2Fy";
        let params = parse_force_field_trial_params(value).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].params.len(), 2);
        assert_eq!(params[1].params[0].value, "%2Fy");
        assert_eq!(build_force_field_trial_params(&params), value);
    }

    #[test]
    fn test_invalid_trial_params() {
        for value in [
            "Trial1.Group1",
            "Trial1Group1:k/v",
            "*Trial1.Group1:k/v",
            ".Group1:k/v",
            "Trial1.Group1:k",
            "Trial1.Group1:k/v/x",
        ] {
            assert!(
                matches!(
                    parse_force_field_trial_params(value),
                    Err(VariationsError::InvalidTrialParams(_))
                ),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_feature_lists() {
        let features = parse_feature_list("Feature1<Trial1,*Feature2", false).unwrap();
        assert_eq!(features[0].value.as_deref(), Some("Trial1"));
        assert!(features[1].star);
        assert_eq!(build_feature_list(&features), "Feature1<Trial1,*Feature2");

        assert!(matches!(
            parse_feature_list("*Feature2", true),
            Err(VariationsError::StarredDisabledFeature)
        ));
    }

    #[test]
    fn test_validate_params_against_trials() {
        let trials = parse_force_field_trials("Trial%201/G1/").unwrap();
        let escaped = parse_force_field_trial_params("Trial%25201.G1:k/v").unwrap();
        assert!(validate_trials_and_params(&trials, &escaped).is_ok());
        let too_many = parse_force_field_trial_params("Trial%201.G1:k/v,X.Y:k/v").unwrap();
        assert!(matches!(
            validate_trials_and_params(&trials, &too_many),
            Err(VariationsError::TooManyParams { params: 2, trials: 1 })
        ));

        let trials = parse_force_field_trials("Trial1/G1/").unwrap();
        let mismatch = parse_force_field_trial_params("Trial1.G2:k/v").unwrap();
        assert!(matches!(
            validate_trials_and_params(&trials, &mismatch),
            Err(VariationsError::GroupMismatch { .. })
        ));
        let unknown = parse_force_field_trial_params("Trial9.G1:k/v").unwrap();
        assert!(matches!(
            validate_trials_and_params(&trials, &unknown),
            Err(VariationsError::UnknownTrial(_))
        ));
        let quoted = parse_force_field_trial_params("Trial%31.G1:k/v").unwrap();
        assert!(validate_trials_and_params(&trials, &quoted).is_ok());
    }

    #[test]
    fn test_parse_switches_string() {
        let switches = parse_switches_string(
            " --force-fieldtrials=\"A/B\" --enable-features=\"F1,F2\"\n",
        )
        .unwrap();
        assert_eq!(
            switches,
            vec![
                (FORCE_FIELD_TRIALS.to_string(), "A/B/".to_string()),
                (ENABLE_FEATURES.to_string(), "F1,F2".to_string()),
            ]
        );
        assert!(matches!(
            parse_switches_string("--no-value"),
            Err(VariationsError::MalformedSwitch(_))
        ));
    }
}
