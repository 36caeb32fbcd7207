//! Shared admission policy: access lists plus throttle rules.

use super::access::AccessList;
use super::rules::{RuleSet, ThrottleRule};
use crate::error::Result;

/// Configuration object owned jointly by the engine and whoever configures it.
///
/// All mutators take `&self`, so a policy wrapped in an `Arc` can be extended
/// while engines are serving.
#[derive(Debug, Default)]
pub struct Policy {
    access: AccessList,
    rules: RuleSet,
}

impl Policy {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a throttle rule.
    pub fn add_throttle_rule(&self, rule: ThrottleRule) {
        self.rules.add(rule);
    }

    /// Safelist an IP.
    pub fn add_safelist_ip(&self, ip: impl Into<String>) {
        self.access.add_safelist(ip);
    }

    /// Blocklist an IP.
    pub fn add_blocklist_ip(&self, ip: impl Into<String>) {
        self.access.add_blocklist(ip);
    }

    /// Blocklist a CIDR range.
    pub fn add_blocklist_cidr(&self, cidr: &str) -> Result<()> {
        self.access.add_blocklist_range(cidr)
    }

    pub fn access(&self) -> &AccessList {
        &self.access
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}
