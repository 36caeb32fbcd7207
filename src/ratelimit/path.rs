//! Request path normalization and throttle rule path patterns.

use std::fmt;

/// Marker that turns a pattern into a prefix rule.
const WILDCARD: char = '*';

/// Collapse a request path to its canonical form.
///
/// Resolves `.` and `..` segments and collapses repeated separators. A rooted
/// path never climbs above `/`, a trailing separator is dropped, and an empty
/// path becomes `.`.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// A compiled throttle rule path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Empty pattern: matches every path
    Any,
    /// Wildcard pattern, stored with the `/*` suffix replaced by a trailing `/`
    Prefix(String),
    /// Plain pattern, stored in canonical form
    Exact(String),
}

impl PathPattern {
    /// Compile a pattern string.
    pub fn parse(pattern: &str) -> Self {
        if pattern.is_empty() {
            PathPattern::Any
        } else if pattern.contains(WILDCARD) {
            let prefix = pattern.strip_suffix("/*").unwrap_or(pattern);
            PathPattern::Prefix(format!("{}/", prefix))
        } else {
            PathPattern::Exact(clean_path(pattern))
        }
    }

    /// Check whether a raw request path satisfies this pattern.
    ///
    /// The path is normalized first so `/api/../admin` is matched as `/admin`.
    pub fn matches(&self, request_path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Prefix(prefix) => {
                let mut path = clean_path(request_path);
                path.push('/');
                path.starts_with(prefix.as_str())
            }
            PathPattern::Exact(exact) => clean_path(request_path) == *exact,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Any => write!(f, "<any>"),
            PathPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            PathPattern::Exact(exact) => write!(f, "{}", exact),
        }
    }
}

/// Check a pattern string against a request path without keeping the compiled form.
pub fn matches(pattern: &str, request_path: &str) -> bool {
    PathPattern::parse(pattern).matches(request_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("/api/"), "/api");
        assert_eq!(clean_path("//api///users"), "/api/users");
        assert_eq!(clean_path("/api/./users/../admin"), "/api/admin");
        assert_eq!(clean_path("/../../etc"), "/etc");
        assert_eq!(clean_path("a/../../b"), "../b");
        assert_eq!(clean_path("a/.."), ".");
    }

    #[test]
    fn test_wildcard_matches_prefix() {
        let pattern = PathPattern::parse("/api/*");

        assert!(pattern.matches("/api"));
        assert!(pattern.matches("/api/"));
        assert!(pattern.matches("/api/x"));
        assert!(pattern.matches("/api/x/y"));

        assert!(!pattern.matches("/apiextra"));
        assert!(!pattern.matches("/other"));
    }

    #[test]
    fn test_exact_match_is_normalized() {
        assert!(matches("/login", "/login"));
        assert!(matches("/login", "/login/"));
        assert!(matches("/login", "//login"));
        assert!(matches("/login/", "/login"));
        assert!(!matches("/login", "/login/extra"));
        assert!(!matches("/login", "/Login"));
    }

    #[test]
    fn test_traversal_does_not_bypass() {
        assert!(matches("/admin/*", "/public/../admin/settings"));
        assert!(matches("/login", "/static/./../login"));
        assert!(!matches("/api/*", "/api/../other"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(matches("", "/"));
        assert!(matches("", "/anything/at/all"));
        assert!(matches("", ""));
    }

    #[test]
    fn test_root_wildcard() {
        let pattern = PathPattern::parse("/*");
        assert_eq!(pattern, PathPattern::Prefix("/".to_string()));
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/deep/path"));
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(PathPattern::parse("").to_string(), "<any>");
        assert_eq!(PathPattern::parse("/api/*").to_string(), "/api/*");
        assert_eq!(PathPattern::parse("/login/").to_string(), "/login");
    }
}
