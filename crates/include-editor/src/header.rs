//! Decorated header names and their classification.

/// Header kind, in the order groups are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderType {
    /// `<foo.h>`
    CSystem,
    /// `<foo>`
    CxxSystem,
    /// `"foo/bar.h"`
    User,
}

/// Classify a decorated name, or `None` when it is not `<...>` or `"..."`.
pub fn classify(decorated_name: &str) -> Option<HeaderType> {
    if is_system_header(decorated_name) {
        if undecorated(decorated_name).ends_with(".h") {
            Some(HeaderType::CSystem)
        } else {
            Some(HeaderType::CxxSystem)
        }
    } else if is_user_header(decorated_name) {
        Some(HeaderType::User)
    } else {
        None
    }
}

pub fn is_system_header(decorated_name: &str) -> bool {
    decorated_name.len() >= 2 && decorated_name.starts_with('<') && decorated_name.ends_with('>')
}

pub fn is_user_header(decorated_name: &str) -> bool {
    decorated_name.len() >= 2 && decorated_name.starts_with('"') && decorated_name.ends_with('"')
}

/// Strip the surrounding `<>` or `""`.
pub fn undecorated(decorated_name: &str) -> &str {
    if decorated_name.len() >= 2 {
        &decorated_name[1..decorated_name.len() - 1]
    } else {
        decorated_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_header_classification() {
        assert_eq!(classify("<stdlib.h>"), Some(HeaderType::CSystem));
        assert_ne!(classify("<type_traits>"), Some(HeaderType::CSystem));
        assert_ne!(classify("\"moo.h\""), Some(HeaderType::CSystem));
    }

    #[test]
    fn test_cxx_header_classification() {
        assert_eq!(classify("<type_traits>"), Some(HeaderType::CxxSystem));
        assert_ne!(classify("<stdlib.h>"), Some(HeaderType::CxxSystem));
    }

    #[test]
    fn test_user_header_classification() {
        assert!(is_user_header("\"moo.h\""));
        assert!(!is_user_header("<stdlib.h>"));
        assert!(!is_user_header("<type_traits>"));
        assert_eq!(classify("\"moo.h\""), Some(HeaderType::User));
    }

    #[test]
    fn test_invalid_header() {
        assert_eq!(classify("invalid"), None);
        assert_eq!(classify("\""), None);
        assert_eq!(classify("<moo.h\""), None);
    }

    #[test]
    fn test_undecorated() {
        assert_eq!(undecorated("<utility>"), "utility");
        assert_eq!(undecorated("\"a/b.h\""), "a/b.h");
    }
}
