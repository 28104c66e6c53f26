//! Filtering known-benign D8/R8 warnings out of stderr.

use lazy_static::lazy_static;
use regex::Regex;

/// Set to anything but `0` to see D8 output unfiltered.
pub const SHOW_ALL_OUTPUT_ENV: &str = "R8_SHOW_ALL_OUTPUT";

const IGNORE_WARNINGS: &[&str] = &[
    "Missing class org.chromium.build.NativeLibraries",
    "referenced from: com.google.protobuf.GeneratedMessageLite$GeneratedExtension",
    "Warning: Specification conversion: The following",
    "GeneratedExtensionRegistryLite.CONTAINING_TYPE_",
    "Ignoring -shrinkunusedprotofields since the protobuf-lite runtime is",
];

const DEFAULT_INTERFACE_WARNING: &str = "default or static interface methods";

fn combined_pattern(patterns: &[&str]) -> Regex {
    let joined = patterns
        .iter()
        .map(|pattern| regex::escape(pattern))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined).expect("valid regex pattern")
}

lazy_static! {
    static ref IGNORED: Regex = combined_pattern(IGNORE_WARNINGS);
    static ref IGNORED_WITH_DESUGAR: Regex = {
        let mut patterns = IGNORE_WARNINGS.to_vec();
        patterns.push(DEFAULT_INTERFACE_WARNING);
        combined_pattern(&patterns)
    };
}

/// Drops ignorable lines and warning blocks from D8 stderr.
#[derive(Debug, Clone, Copy)]
pub struct StderrFilter {
    show_desugar_default_interface_warnings: bool,
    show_all: bool,
}

impl StderrFilter {
    /// A filter honouring `R8_SHOW_ALL_OUTPUT`.
    pub fn new(show_desugar_default_interface_warnings: bool) -> Self {
        let show_all = std::env::var(SHOW_ALL_OUTPUT_ENV)
            .map(|value| value != "0")
            .unwrap_or(false);
        Self::with_show_all(show_desugar_default_interface_warnings, show_all)
    }

    pub fn with_show_all(show_desugar_default_interface_warnings: bool, show_all: bool) -> Self {
        Self {
            show_desugar_default_interface_warnings,
            show_all,
        }
    }

    fn pattern(&self) -> &'static Regex {
        if self.show_desugar_default_interface_warnings {
            &*IGNORED
        } else {
            &*IGNORED_WITH_DESUGAR
        }
    }

    /// Text before the first line starting with `Warning` is filtered line
    /// by line; each `Warning` block is kept or dropped whole.
    pub fn filter(&self, output: &str) -> String {
        if self.show_all {
            return output.to_string();
        }
        let pattern = self.pattern();
        let (preamble, warnings) = split_warnings(output);

        let mut filtered = preamble
            .split('\n')
            .filter(|line| !pattern.is_match(line))
            .collect::<Vec<_>>()
            .join("\n");
        for warning in warnings {
            if !pattern.is_match(warning) {
                filtered.push_str(warning);
            }
        }
        filtered
    }
}

/// Split `output` before every line that starts with `Warning`.
fn split_warnings(output: &str) -> (&str, Vec<&str>) {
    let mut starts: Vec<usize> = Vec::new();
    let mut line_start = 0;
    for line in output.split_inclusive('\n') {
        if line.starts_with("Warning") {
            starts.push(line_start);
        }
        line_start += line.len();
    }
    let Some(&first) = starts.first() else {
        return (output, Vec::new());
    };
    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(output.len());
        blocks.push(&output[start..end]);
    }
    (&output[..first], blocks)
}
