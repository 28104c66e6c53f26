//! Desugar dependency tracking.
//!
//! D8 records, for each desugared class, the classes whose changes require
//! it to be desugared again:
//!
//! ```text
//! org/chromium/base/task/TaskRunnerImpl.class
//!   <-  org/chromium/base/task/TaskRunner.class
//! org/chromium/base/task/TaskRunnerImplJni$1.class
//!   <-  obj/base/jni_java.turbine.jar:org/chromium/base/JniStaticTestMocker.class
//! ```
//!
//! Dependencies that live on the classpath are written as `<jar>:<class>`.

use crate::changes::Changes;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const DEPENDENCY_PREFIX: &str = "  <-  ";

/// dependency -> classes that depend on it
pub type DesugarDeps = BTreeMap<String, BTreeSet<String>>;

/// Parse a desugar dependencies file into the reverse mapping. A missing
/// file has no dependencies.
pub fn parse_desugar_deps(path: Option<&Path>) -> Result<DesugarDeps> {
    let Some(path) = path.filter(|path| path.exists()) else {
        return Ok(DesugarDeps::new());
    };
    Ok(parse_desugar_deps_str(&std::fs::read_to_string(path)?))
}

pub fn parse_desugar_deps_str(content: &str) -> DesugarDeps {
    let mut dependents_from_dependency = DesugarDeps::new();
    let mut dependent: Option<&str> = None;
    for line in content.lines() {
        let line = line.trim_end();
        match line.strip_prefix(DEPENDENCY_PREFIX) {
            Some(dependency) => {
                if let Some(dependent) = dependent {
                    dependents_from_dependency
                        .entry(dependency.to_string())
                        .or_default()
                        .insert(dependent.to_string());
                }
            }
            None => dependent = Some(line),
        }
    }
    dependents_from_dependency
}

/// Classes that must be desugared again because something they depend on
/// changed, either on the classpath or in the class inputs.
pub fn required_desugar_classes(
    changes: &Changes,
    deps: &DesugarDeps,
    class_inputs: &[String],
    classpath: &[String],
) -> BTreeSet<String> {
    let mut required = BTreeSet::new();
    for jar in classpath {
        for subpath in changes.changed_subpaths(jar) {
            if let Some(dependents) = deps.get(&format!("{}:{}", jar, subpath)) {
                required.extend(dependents.iter().cloned());
            }
        }
    }
    for jar in class_inputs {
        for subpath in changes.changed_subpaths(jar) {
            if let Some(dependents) = deps.get(&subpath) {
                required.extend(dependents.iter().cloned());
            }
        }
    }
    required
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPS: &str = "\
org/chromium/base/task/SingleThreadTaskRunnerImpl.class
  <-  org/chromium/base/task/SingleThreadTaskRunner.class
  <-  org/chromium/base/task/TaskRunnerImpl.class
org/chromium/base/task/TaskRunnerImpl.class
  <-  org/chromium/base/task/TaskRunner.class
org/chromium/base/task/TaskRunnerImplJni$1.class
  <-  obj/base/jni_java.turbine.jar:org/chromium/base/JniStaticTestMocker.class
";

    #[test]
    fn test_parse_desugar_deps_reverses_mapping() {
        let deps = parse_desugar_deps_str(DEPS);
        assert_eq!(deps.len(), 4);
        assert_eq!(
            deps["org/chromium/base/task/TaskRunnerImpl.class"],
            BTreeSet::from(["org/chromium/base/task/SingleThreadTaskRunnerImpl.class".to_string()])
        );
        assert_eq!(
            deps["obj/base/jni_java.turbine.jar:org/chromium/base/JniStaticTestMocker.class"],
            BTreeSet::from(["org/chromium/base/task/TaskRunnerImplJni$1.class".to_string()])
        );
    }

    #[test]
    fn test_missing_file_has_no_deps() {
        assert!(parse_desugar_deps(None).unwrap().is_empty());
        assert!(parse_desugar_deps(Some(Path::new("/nonexistent/deps")))
            .unwrap()
            .is_empty());
    }
}
