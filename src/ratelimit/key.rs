//! Counter key templates.

use std::fmt;

/// Placeholder replaced with the client IP.
pub const IP_PLACEHOLDER: &str = "%{ip}";
/// Placeholder replaced with the raw request path.
pub const PATH_PLACEHOLDER: &str = "%{path}";

/// A counter key template such as `ratelimit:%{ip}:%{path}`.
///
/// Only `%{ip}` and `%{path}` are recognized. Anything else, including other
/// `%{...}` sequences, is copied through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyTemplate(String);

impl KeyTemplate {
    /// Create a new key template.
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the counter key for a client IP and request path.
    ///
    /// Substitution is a single left-to-right pass: text inserted for one
    /// placeholder is never scanned again, so a path containing `%{ip}` stays
    /// literal.
    pub fn render(&self, ip: &str, path: &str) -> String {
        let mut rendered = String::with_capacity(self.0.len() + ip.len() + path.len());
        let mut rest = self.0.as_str();

        while let Some(start) = rest.find("%{") {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];

            if let Some(after) = tail.strip_prefix(IP_PLACEHOLDER) {
                rendered.push_str(ip);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(PATH_PLACEHOLDER) {
                rendered.push_str(path);
                rest = after;
            } else {
                rendered.push_str("%{");
                rest = &tail[2..];
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

impl fmt::Display for KeyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KeyTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for KeyTemplate {
    fn from(template: String) -> Self {
        Self(template)
    }
}
