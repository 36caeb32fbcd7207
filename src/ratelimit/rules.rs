//! Throttle rules and ordered rule matching.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use super::key::KeyTemplate;
use super::path::PathPattern;
use crate::error::{GatekeeperError, Result};

/// A rate limiting rule for a path pattern and HTTP method.
///
/// Rules are validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleRule {
    name: Option<String>,
    path_pattern: PathPattern,
    method: String,
    key: KeyTemplate,
    limit: u64,
    period: Duration,
}

impl ThrottleRule {
    /// Create a new throttle rule.
    ///
    /// An empty `path_pattern` matches every path and an empty `method`
    /// matches every method. Fails with [`GatekeeperError::InvalidRule`]
    /// if `limit` is zero or `period` is zero.
    pub fn new(
        path_pattern: &str,
        method: impl Into<String>,
        key: impl Into<KeyTemplate>,
        limit: u64,
        period: Duration,
    ) -> Result<Self> {
        if limit == 0 {
            return Err(GatekeeperError::InvalidRule(format!(
                "limit must be at least 1 (pattern '{}')",
                path_pattern
            )));
        }
        if period.is_zero() {
            return Err(GatekeeperError::InvalidRule(format!(
                "period must be greater than zero (pattern '{}')",
                path_pattern
            )));
        }

        Ok(Self {
            name: None,
            path_pattern: PathPattern::parse(path_pattern),
            method: method.into(),
            key: key.into(),
            limit,
            period,
        })
    }

    /// Attach a name used in logs and decisions.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Optional rule name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The compiled path pattern.
    pub fn path_pattern(&self) -> &PathPattern {
        &self.path_pattern
    }

    /// HTTP method this rule applies to; empty means all methods.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Counter key template.
    pub fn key(&self) -> &KeyTemplate {
        &self.key
    }

    /// Maximum increments permitted per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Check whether this rule applies to a request path and method.
    ///
    /// Method comparison is exact and case-sensitive.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        (self.method.is_empty() || self.method == method) && self.path_pattern.matches(path)
    }

    /// Label for logging: the name when set, otherwise the key template.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.key.as_str())
    }
}

/// Ordered collection of throttle rules.
///
/// Registration order is preserved and is the evaluation order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: RwLock<Vec<Arc<ThrottleRule>>>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn add(&self, rule: ThrottleRule) {
        info!(
            rule = %rule.label(),
            pattern = %rule.path_pattern(),
            method = %rule.method(),
            limit = rule.limit(),
            period = ?rule.period(),
            "Adding throttle rule"
        );
        self.rules.write().push(Arc::new(rule));
    }

    /// Rules applying to a request, in registration order.
    ///
    /// Returns a snapshot so no lock is held while the caller awaits the
    /// counter store.
    pub fn matching_rules(&self, path: &str, method: &str) -> Vec<Arc<ThrottleRule>> {
        self.rules
            .read()
            .iter()
            .filter(|rule| rule.matches(path, method))
            .cloned()
            .collect()
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}
