//! Primary header detection.
//!
//! If `moo.cc` exists to implement or test what `moo.h` declares, `moo.h` is
//! its primary header and sorts first in a group of its own. Matching is
//! exact first, then fuzzy: the basename may carry a platform or test suffix,
//! and the directory paths must be substantially similar.

use crate::header::{is_user_header, undecorated, HeaderType};
use crate::include::Include;
use regex::Regex;

const PLATFORM_SUFFIX: &str =
    r"(?:_(?:android|aura|chromeos|fuchsia|ios|linux|mac|ozone|posix|win|x11))?";
const TEST_SUFFIX: &str = r"(?:_(?:browser|interactive_ui|perf|ui|unit)?test)?";

/// Mark at most one include of `filename` as its primary header.
///
/// Header files never have a primary include. The includes may be reordered.
pub fn mark_primary_include(includes: &mut [Include], filename: &str) {
    if filename.ends_with(".h") {
        return;
    }

    let exact = format!("{}.h", strip_extension(filename));
    if let Some(include) = includes.iter_mut().find(|include| {
        is_user_header(&include.decorated_name) && undecorated(&include.decorated_name) == exact
    }) {
        include.is_primary_header = true;
        return;
    }

    let (basis_dirs, basis_name) = decompose_path(filename);

    // moo_posix.h takes precedence over moo.h when considering moo_posix.cc.
    includes.sort_by_key(|include| std::cmp::Reverse(include.decorated_name.len()));
    for include in includes.iter_mut() {
        if include.header_type != HeaderType::User {
            continue;
        }
        let (dirs, name) = decompose_path(undecorated(&include.decorated_name));

        // moo.cc never matches moo_posix.h.
        if name.len() > basis_name.len() {
            continue;
        }
        if !fuzzy_basename_match(name, basis_name) {
            continue;
        }

        // The topmost directory must match, and the rest of the path must be
        // at most two entries off with at least two entries in common.
        let mut first_matched = false;
        let mut total_matched = 0;
        for block in matching_blocks(&dirs, &basis_dirs) {
            if total_matched == 0 && block.a == 0 && block.b == 0 {
                first_matched = true;
            }
            total_matched += block.size;
        }
        if !first_matched {
            continue;
        }
        let total_differences =
            total_matched.abs_diff(dirs.len()) + total_matched.abs_diff(basis_dirs.len());
        if total_differences != 0 && (total_differences > 2 || total_matched < 2) {
            continue;
        }

        include.is_primary_header = true;
        return;
    }
}

fn fuzzy_basename_match(header_name: &str, basis_name: &str) -> bool {
    let escaped = regex::escape(header_name);
    [
        format!("^{}{}{}$", escaped, PLATFORM_SUFFIX, TEST_SUFFIX),
        format!("^{}{}{}$", escaped, TEST_SUFFIX, PLATFORM_SUFFIX),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .any(|re| re.is_match(basis_name))
}

/// Split a path into its directory entries and its extensionless basename.
fn decompose_path(path: &str) -> (Vec<&str>, &str) {
    let mut parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let basename = parts.pop().unwrap_or_default();
    (parts, strip_extension(basename))
}

/// Drop the final extension of the last path component, if there is one.
fn strip_extension(path: &str) -> &str {
    let base_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let basename = &path[base_start..];
    match basename.rfind('.') {
        Some(dot) if basename[..dot].chars().any(|c| c != '.') => &path[..base_start + dot],
        _ => path,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatchBlock {
    a: usize,
    b: usize,
    size: usize,
}

/// Maximal matching blocks between two sequences, in order, terminated by a
/// zero-sized block at `(a.len(), b.len())`.
///
/// Each step takes the longest common run (earliest on ties) and recurses on
/// both sides of it, then adjacent runs are coalesced.
fn matching_blocks<T: PartialEq>(a: &[T], b: &[T]) -> Vec<MatchBlock> {
    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut blocks = Vec::new();
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let block = longest_match(a, b, alo, ahi, blo, bhi);
        if block.size == 0 {
            continue;
        }
        if alo < block.a && blo < block.b {
            queue.push((alo, block.a, blo, block.b));
        }
        if block.a + block.size < ahi && block.b + block.size < bhi {
            queue.push((block.a + block.size, ahi, block.b + block.size, bhi));
        }
        blocks.push(block);
    }
    blocks.sort_by_key(|block| (block.a, block.b, block.size));

    let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len() + 1);
    for block in blocks {
        match merged.last_mut() {
            Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                last.size += block.size;
            }
            _ => merged.push(block),
        }
    }
    merged.push(MatchBlock {
        a: a.len(),
        b: b.len(),
        size: 0,
    });
    merged
}

fn longest_match<T: PartialEq>(
    a: &[T],
    b: &[T],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchBlock {
    let mut best = MatchBlock {
        a: alo,
        b: blo,
        size: 0,
    };
    // run[j] = length of the common run ending at a[i - 1], b[j - 1].
    let mut run = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut next = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = run[j - blo] + 1;
            next[j - blo + 1] = k;
            if k > best.size {
                best = MatchBlock {
                    a: i + 1 - k,
                    b: j + 1 - k,
                    size: k,
                };
            }
        }
        run = next;
    }
    best
}
