//! Sorting and rendering an include block.

use crate::include::Include;

/// Windows headers that must precede others in the C system group, in order.
const SPECIAL_HEADERS: &[&str] = &[
    // Before ws2tcpip.h.
    "<winsock2.h>",
    // Before shellapi.h, winbase.h, versionhelpers.h and many more.
    "<windows.h>",
    // Before iphlpapi.h.
    "<ws2tcpip.h>",
    // Before propkey.h.
    "<shobjidl.h>",
    // Before atlapp.h.
    "<atlbase.h>",
    // Before intshcut.h.
    "<ole2.h>",
    "<unknwn.h>",
    // Before uiautomation.h.
    "<objbase.h>",
    // Before tpcshrd.h.
    "<tchar.h>",
];

fn special_rank(include: &Include) -> usize {
    let lower = include.decorated_name.to_lowercase();
    SPECIAL_HEADERS
        .iter()
        .position(|special| *special == lower)
        .unwrap_or(SPECIAL_HEADERS.len())
}

/// Sort includes and render them back to source lines.
///
/// The primary header comes first, then one group per header type separated
/// by blank lines. Within a group the special Windows headers lead and the
/// rest sort lexicographically.
pub fn serialize_includes(includes: &mut [Include]) -> Vec<String> {
    includes.sort_by(|a, b| {
        (!a.is_primary_header, a.header_type, special_rank(a), &a.decorated_name).cmp(&(
            !b.is_primary_header,
            b.header_type,
            special_rank(b),
            &b.decorated_name,
        ))
    });

    let mut source = Vec::new();
    let mut previous: Option<&Include> = None;
    for include in includes.iter() {
        if previous.is_some_and(|prev| include.starts_new_group(prev)) {
            source.push(String::new());
        }
        source.extend(include.to_source());
        previous = Some(include);
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    fn includes(names: &[&str]) -> Vec<Include> {
        names
            .iter()
            .map(|name| Include::plain(*name).unwrap())
            .collect()
    }

    fn primary(name: &str) -> Include {
        let mut include = Include::plain(name).unwrap();
        include.is_primary_header = true;
        include
    }

    #[test]
    fn test_system_headers() {
        let mut list = includes(&["<stdlib.h>", "<map>"]);
        assert_eq!(
            serialize_includes(&mut list),
            vec!["#include <stdlib.h>", "", "#include <map>"]
        );
    }

    #[test]
    fn test_user_headers() {
        let mut list = includes(&["\"goat.h\"", "\"moo.h\""]);
        assert_eq!(
            serialize_includes(&mut list),
            vec!["#include \"goat.h\"", "#include \"moo.h\""]
        );
    }

    #[test]
    fn test_system_and_user_headers() {
        let mut list = includes(&["<stdlib.h>", "<map>", "\"moo.h\""]);
        assert_eq!(
            serialize_includes(&mut list),
            vec![
                "#include <stdlib.h>",
                "",
                "#include <map>",
                "",
                "#include \"moo.h\""
            ]
        );
    }

    #[test]
    fn test_primary_and_user_headers() {
        let mut list = vec![primary("\"cow.h\"")];
        list.extend(includes(&["\"moo.h\""]));
        assert_eq!(
            serialize_includes(&mut list),
            vec!["#include \"cow.h\"", "", "#include \"moo.h\""]
        );
    }

    #[test]
    fn test_primary_system_and_user_headers() {
        let mut list = includes(&["\"moo.h\"", "<map>", "<stdlib.h>"]);
        list.push(primary("\"cow.h\""));
        assert_eq!(
            serialize_includes(&mut list),
            vec![
                "#include \"cow.h\"",
                "",
                "#include <stdlib.h>",
                "",
                "#include <map>",
                "",
                "#include \"moo.h\""
            ]
        );
    }

    #[test]
    fn test_special_headers() {
        // Deliberately scrambled input order.
        let mut list = includes(&[
            "<stdio.h>",
            "<tchar.h>",
            "\"moo.h\"",
            "<ws2tcpip.h>",
            "<string.h>",
            "<objbase.h>",
            "<windows.h>",
            "<ole2.h>",
            "<stddef.h>",
            "<atlbase.h>",
            "<unknwn.h>",
            "<shobjidl.h>",
            "<winsock2.h>",
        ]);
        list.insert(5, primary("\"cow.h\""));
        assert_eq!(
            serialize_includes(&mut list),
            vec![
                "#include \"cow.h\"",
                "",
                "#include <winsock2.h>",
                "#include <windows.h>",
                "#include <ws2tcpip.h>",
                "#include <shobjidl.h>",
                "#include <atlbase.h>",
                "#include <ole2.h>",
                "#include <unknwn.h>",
                "#include <objbase.h>",
                "#include <tchar.h>",
                "#include <stddef.h>",
                "#include <stdio.h>",
                "#include <string.h>",
                "",
                "#include \"moo.h\""
            ]
        );
    }
}
