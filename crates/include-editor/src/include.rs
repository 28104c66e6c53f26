//! Locating and parsing the `#include` block of a C++ source file.

use crate::header::{classify, HeaderType};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::ops::Range;

lazy_static! {
    static ref EMPTY_LINE: Regex = Regex::new(r"^\s*$").expect("valid regex pattern");
    static ref COMMENT: Regex = Regex::new(r"^\s*//(.*)$").expect("valid regex pattern");
    static ref INCLUDE: Regex =
        Regex::new(r#"^\s*#(import|include)\s+([<"].+?[">])\s*?(?://(.*))?$"#)
            .expect("valid regex pattern");
}

/// `#include` or `#import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Include,
    Import,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Include => "include",
            Directive::Import => "import",
        }
    }

    fn parse(name: &str) -> Option<Directive> {
        match name {
            "include" => Some(Directive::Include),
            "import" => Some(Directive::Import),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `#include`/`#import` line plus the comments attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// Header name with its `<>` or `""` decoration.
    pub decorated_name: String,

    pub directive: Directive,

    /// Comment lines directly above the directive.
    pub preamble: Vec<String>,

    /// Text after `//` on the directive line, without the slashes.
    pub inline_comment: Option<String>,

    pub header_type: HeaderType,

    /// The header this implementation file implements or tests.
    pub is_primary_header: bool,
}

impl Include {
    /// Build an include, or `None` when `decorated_name` is not decorated.
    pub fn new(
        decorated_name: impl Into<String>,
        directive: Directive,
        preamble: Vec<String>,
        inline_comment: Option<String>,
    ) -> Option<Include> {
        let decorated_name = decorated_name.into();
        let header_type = classify(&decorated_name)?;
        Some(Include {
            decorated_name,
            directive,
            preamble,
            inline_comment,
            header_type,
            is_primary_header: false,
        })
    }

    /// A plain `#include` with no comments.
    pub fn plain(decorated_name: impl Into<String>) -> Option<Include> {
        Include::new(decorated_name, Directive::Include, Vec::new(), None)
    }

    /// Groups are separated by a blank line.
    pub fn starts_new_group(&self, previous: &Include) -> bool {
        self.is_primary_header != previous.is_primary_header
            || self.header_type != previous.header_type
    }

    /// Render back to source lines with trailing whitespace removed.
    pub fn to_source(&self) -> Vec<String> {
        let mut source: Vec<String> = self.preamble.clone();
        let mut line = format!("#{} {}", self.directive, self.decorated_name);
        if let Some(comment) = self.inline_comment.as_deref().filter(|c| !c.is_empty()) {
            line.push_str("  //");
            line.push_str(comment);
        }
        source.push(line);
        source
            .into_iter()
            .map(|line| line.trim_end().to_string())
            .collect()
    }
}

/// Find the line range holding the include block.
///
/// Leading comments and blank lines are skipped, as are non-include lines
/// before the first include (include guards). After the first include, the
/// first line that is neither blank, a comment, nor an include ends the block.
pub fn find_includes<S: AsRef<str>>(lines: &[S]) -> Option<Range<usize>> {
    let mut range: Option<Range<usize>> = None;
    for (idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if EMPTY_LINE.is_match(line) || COMMENT.is_match(line) {
            continue;
        }
        if !INCLUDE.is_match(line) {
            if range.is_none() {
                continue;
            }
            break;
        }
        match range.as_mut() {
            Some(r) => r.end = idx + 1,
            None => range = Some(idx..idx + 1),
        }
    }
    range
}

/// Parse an include block. Returns `None` when the block cannot be
/// represented faithfully: a comment separated from its directive by a blank
/// line, trailing comments with no directive, or no directives at all.
pub fn parse_includes<S: AsRef<str>>(lines: &[S]) -> Option<Vec<Include>> {
    let mut includes = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    for line in lines {
        let line = line.as_ref();
        if EMPTY_LINE.is_match(line) {
            if !preamble.is_empty() {
                return None;
            }
            continue;
        }
        let Some(caps) = INCLUDE.captures(line) else {
            preamble.push(line.to_string());
            continue;
        };
        let directive = Directive::parse(&caps[1])?;
        let include = Include::new(
            &caps[2],
            directive,
            std::mem::take(&mut preamble),
            caps.get(3).map(|m| m.as_str().to_string()),
        )?;
        includes.push(include);
    }
    if !preamble.is_empty() || includes.is_empty() {
        return None;
    }
    Some(includes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_includes_empty() {
        let lines: Vec<&str> = vec![];
        assert_eq!(find_includes(&lines), None);
        assert_eq!(find_includes(&["a"]), None);
    }

    #[test]
    fn test_find_one_include() {
        assert_eq!(find_includes(&["#include <algorithm>"]), Some(0..1));
        assert_eq!(
            find_includes(&["#include \"moo.h\"  // TODO: Add more sounds."]),
            Some(0..1)
        );
    }

    #[test]
    fn test_find_includes_spans_blank_and_comment_lines() {
        assert_eq!(
            find_includes(&["#include <utility>", "", "#include \"moo.h\""]),
            Some(0..3)
        );
        assert_eq!(
            find_includes(&[
                "#include <utility>",
                "// TODO: Add goat support.",
                "#include \"moo.h\""
            ]),
            Some(0..3)
        );
    }

    #[test]
    fn test_find_includes_trims_surrounding_lines() {
        assert_eq!(
            find_includes(&["", "#include <utility>", "", "#include \"moo.h\"", ""]),
            Some(1..4)
        );
        assert_eq!(
            find_includes(&[
                "// Cow module.",
                "#include <utility>",
                "// For cow speech synthesis.",
                "#include \"moo.h\"",
                "// TODO: Add Linux audio support."
            ]),
            Some(1..4)
        );
    }

    #[test]
    fn test_find_includes_skips_include_guard() {
        assert_eq!(
            find_includes(&["#ifndef COW_H_", "#define COW_H_", "#include \"moo.h\""]),
            Some(2..3)
        );
    }

    #[test]
    fn test_find_includes_stops_at_other_lines() {
        assert_eq!(
            find_includes(&[
                "#include \"moo.h\"",
                "#ifndef COW_MESSAGES_H_",
                "#define COW_MESSAGE_H_"
            ]),
            Some(0..1)
        );
    }

    #[test]
    fn test_to_source() {
        let include = Include::plain("<moo.h>").unwrap();
        assert_eq!(include.to_source(), vec!["#include <moo.h>"]);

        let include = Include::new(
            "\"moo.h\"",
            Directive::Include,
            vec!["// preamble with trailing space ".to_string()],
            Some(" inline comment with trailing space ".to_string()),
        )
        .unwrap();
        assert_eq!(
            include.to_source(),
            vec![
                "// preamble with trailing space",
                "#include \"moo.h\"  // inline comment with trailing space"
            ]
        );

        let import = Include::new("\"moo.h\"", Directive::Import, vec![], None).unwrap();
        assert_eq!(import.to_source(), vec!["#import \"moo.h\""]);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_includes(&["invalid"]), None);
        assert_eq!(
            parse_includes(&["// orphan comment", "", "#include \"moo.h\""]),
            None
        );
    }

    #[test]
    fn test_parse_include_surrounded_by_whitespace() {
        let includes = parse_includes(&[" #include \"moo.h\" "]).unwrap();
        assert_eq!(includes.len(), 1);
        assert_eq!(includes[0].decorated_name, "\"moo.h\"");
        assert_eq!(includes[0].directive, Directive::Include);
        assert!(includes[0].preamble.is_empty());
        assert_eq!(includes[0].inline_comment, None);
        assert_eq!(includes[0].header_type, HeaderType::User);
        assert!(!includes[0].is_primary_header);
    }

    #[test]
    fn test_parse_inline_comment() {
        let includes = parse_includes(&["#include \"moo.h\"// For SFX "]).unwrap();
        assert_eq!(includes[0].decorated_name, "\"moo.h\"");
        assert_eq!(includes[0].inline_comment.as_deref(), Some(" For SFX "));

        let includes =
            parse_includes(&["// preamble comment ", "#include \"moo.h\"  // For SFX "]).unwrap();
        assert_eq!(includes[0].preamble, vec!["// preamble comment "]);
        assert_eq!(includes[0].inline_comment.as_deref(), Some(" For SFX "));
    }

    #[test]
    fn test_parse_multiple_includes() {
        let includes = parse_includes(&[
            "#include <time.h>",
            "",
            "#include \"moo.h\"  // For SFX ",
            "// TODO: Implement death ray.",
            "#import \"goat.h\"",
        ])
        .unwrap();
        assert_eq!(includes.len(), 3);
        assert_eq!(includes[0].decorated_name, "<time.h>");
        assert_eq!(includes[0].header_type, HeaderType::CSystem);
        assert_eq!(includes[1].inline_comment.as_deref(), Some(" For SFX "));
        assert_eq!(includes[2].directive, Directive::Import);
        assert_eq!(
            includes[2].preamble,
            vec!["// TODO: Implement death ray."]
        );
    }
}
