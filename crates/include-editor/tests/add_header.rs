//! End-to-end include edits, on text and on files.

use include_editor::{edit_file, EditOutcome, FormatOptions, HeaderEdit, SkipReason};
use tempfile::tempdir;

fn join(lines: &[&str]) -> String {
    lines.join("\n")
}

/// Test: a C++ system header lands alphabetically in its group
#[test]
fn test_add_include() {
    let source = join(&[
        "// Copyright info here.",
        "",
        "#include <utility>",
        "// For cow speech synthesis.",
        "#include \"moo.h\"  // TODO: Add Linux audio support.",
        "#include <time.h>",
        "#include \"cow.h\"",
        "namespace bovine {",
        "",
        "// TODO: Implement.",
        "}  // namespace bovine",
    ]);
    let outcome = HeaderEdit::add("<memory>").unwrap().apply("cow.cc", &source);
    assert_eq!(
        outcome.source(),
        Some(
            join(&[
                "// Copyright info here.",
                "",
                "#include \"cow.h\"",
                "",
                "#include <time.h>",
                "",
                "#include <memory>",
                "#include <utility>",
                "",
                "// For cow speech synthesis.",
                "#include \"moo.h\"  // TODO: Add Linux audio support.",
                "namespace bovine {",
                "",
                "// TODO: Implement.",
                "}  // namespace bovine",
                "",
            ])
            .as_str()
        )
    );
}

/// Test: an already included header leaves the file alone, even unsorted
#[test]
fn test_already_included() {
    let source = join(&[
        "// Copyright info here.",
        "",
        "#include \"moo.h\"",
        "#include <utility>",
        "#include <memory>",
        "#include \"cow.h\"",
        "namespace bovine {",
        "",
        "// TODO: Implement.",
        "}  // namespace bovine",
    ]);
    assert_eq!(
        HeaderEdit::add("<memory>").unwrap().apply("cow.cc", &source),
        EditOutcome::Skipped(SkipReason::AlreadyPresent)
    );
}

/// Test: includes under #if stay outside the rewritten block
#[test]
fn test_conditional_includes_left_alone() {
    let source = join(&[
        "// Copyright info here.",
        "",
        "#include \"cow.h\"",
        "#include <utility>",
        "// For cow speech synthesis.",
        "#include \"moo.h\"  // TODO: Add Linux audio support.",
        "#if defined(USE_AURA)",
        "#include <memory>",
        "#endif  // defined(USE_AURA)",
    ]);
    let outcome = HeaderEdit::add("<memory>").unwrap().apply("cow.cc", &source);
    assert_eq!(
        outcome.source(),
        Some(
            join(&[
                "// Copyright info here.",
                "",
                "#include \"cow.h\"",
                "",
                "#include <memory>",
                "#include <utility>",
                "",
                "// For cow speech synthesis.",
                "#include \"moo.h\"  // TODO: Add Linux audio support.",
                "#if defined(USE_AURA)",
                "#include <memory>",
                "#endif  // defined(USE_AURA)",
                "",
            ])
            .as_str()
        )
    );
}

/// Test: removal regroups what remains
#[test]
fn test_remove_include() {
    let source = join(&[
        "// Copyright info here.",
        "",
        "#include <memory>",
        "#include <utility>",
        "// For cow speech synthesis.",
        "#include \"moo.h\"  // TODO: Add Linux audio support.",
        "#include <time.h>",
        "#include \"cow.h\"",
        "namespace bovine {",
        "",
        "// TODO: Implement.",
        "}  // namespace bovine",
    ]);
    let outcome = HeaderEdit::remove("<utility>")
        .unwrap()
        .apply("cow.cc", &source);
    assert_eq!(
        outcome.source(),
        Some(
            join(&[
                "// Copyright info here.",
                "",
                "#include \"cow.h\"",
                "",
                "#include <time.h>",
                "",
                "#include <memory>",
                "",
                "// For cow speech synthesis.",
                "#include \"moo.h\"  // TODO: Add Linux audio support.",
                "namespace bovine {",
                "",
                "// TODO: Implement.",
                "}  // namespace bovine",
                "",
            ])
            .as_str()
        )
    );
}

/// Test: removing a header that is not there is a skip
#[test]
fn test_remove_missing_include() {
    let source = "#include <memory>\n";
    assert_eq!(
        HeaderEdit::remove("<vector>").unwrap().apply("a.cc", source),
        EditOutcome::Skipped(SkipReason::NotFound("<vector>".to_string()))
    );
}

/// Test: applying the same addition twice equals applying it once
#[test]
fn test_add_is_idempotent() {
    let source = join(&[
        "#include \"foo/bar/baz.h\"",
        "#include <string>",
        "#include \"base/logging.h\"",
        "",
        "void f() {}",
    ]);
    let edit = HeaderEdit::add("<vector>").unwrap();
    let once = edit
        .apply("foo/bar/baz.cc", &source)
        .source()
        .unwrap()
        .to_string();
    assert_eq!(
        edit.apply("foo/bar/baz.cc", &once),
        EditOutcome::Skipped(SkipReason::AlreadyPresent)
    );
    assert!(once.starts_with("#include \"foo/bar/baz.h\"\n\n#include <string>\n#include <vector>\n"));
}

/// Test: files are rewritten in place when formatting is disabled
///
/// The temp path shares no directories with "cow.h", so no primary header.
#[tokio::test]
async fn test_edit_file_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cow.cc");
    std::fs::write(&path, "#include \"cow.h\"\n\nint moo();\n").unwrap();

    let options = FormatOptions { clang_format: None };
    let edit = HeaderEdit::add("<utility>").unwrap();
    assert!(edit_file(&path, &edit, &options).await.unwrap());
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "#include <utility>\n\n#include \"cow.h\"\n\nint moo();\n"
    );

    assert!(!edit_file(&path, &edit, &options).await.unwrap());
}

/// Test: a failing clang-format does not fail the edit
#[tokio::test]
async fn test_clang_format_failure_is_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cow.cc");
    std::fs::write(&path, "#include <map>\n").unwrap();

    let options = FormatOptions {
        clang_format: Some("false".to_string()),
    };
    let edit = HeaderEdit::add("<set>").unwrap();
    assert!(edit_file(&path, &edit, &options).await.unwrap());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "#include <map>\n#include <set>\n"
    );
}
