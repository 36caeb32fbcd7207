//! Safelist and blocklist membership.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{GatekeeperError, Result};

/// Exact-IP safelist, exact-IP blocklist and blocklisted CIDR ranges.
///
/// Entries may be added while other tasks are reading. Lookups never fail:
/// a client IP that does not parse simply matches no range.
#[derive(Debug, Default)]
pub struct AccessList {
    safelist: RwLock<HashSet<String>>,
    blocklist: RwLock<HashSet<String>>,
    blocklist_ranges: RwLock<Vec<IpNet>>,
}

impl AccessList {
    /// Create an empty access list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an IP that bypasses every block and throttle check.
    pub fn add_safelist(&self, ip: impl Into<String>) {
        self.safelist.write().insert(ip.into());
    }

    /// Add an IP that is always denied.
    pub fn add_blocklist(&self, ip: impl Into<String>) {
        self.blocklist.write().insert(ip.into());
    }

    /// Add a CIDR range whose addresses are always denied.
    ///
    /// A malformed range is rejected and leaves the list untouched.
    pub fn add_blocklist_range(&self, cidr: &str) -> Result<()> {
        let net: IpNet = cidr.parse().map_err(|source| GatekeeperError::InvalidCidr {
            cidr: cidr.to_string(),
            source,
        })?;

        debug!(cidr = %net, "Blocklisting CIDR range");
        self.blocklist_ranges.write().push(net.trunc());
        Ok(())
    }

    /// Check whether an IP is safelisted.
    pub fn is_safelisted(&self, ip: &str) -> bool {
        self.safelist.read().contains(ip)
    }

    /// Check whether an IP is blocked, either exactly or by a range.
    pub fn is_blocked(&self, ip: &str) -> bool {
        if self.blocklist.read().contains(ip) {
            return true;
        }

        let Ok(addr) = ip.parse::<IpAddr>() else {
            return false;
        };
        // IPv4-mapped IPv6 addresses are compared as IPv4.
        let addr = addr.to_canonical();

        self.blocklist_ranges
            .read()
            .iter()
            .any(|net| net.contains(&addr))
    }

    /// Number of safelisted IPs.
    pub fn safelist_len(&self) -> usize {
        self.safelist.read().len()
    }

    /// Number of blocklisted IPs.
    pub fn blocklist_len(&self) -> usize {
        self.blocklist.read().len()
    }

    /// Number of blocklisted ranges.
    pub fn blocklist_range_len(&self) -> usize {
        self.blocklist_ranges.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_safelist_membership() {
        let access = AccessList::new();
        access.add_safelist("192.168.1.100");

        assert!(access.is_safelisted("192.168.1.100"));
        assert!(!access.is_safelisted("192.168.1.101"));
        assert!(!access.is_blocked("192.168.1.100"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let access = AccessList::new();
        access.add_safelist("1.1.1.1");
        access.add_safelist("1.1.1.1");
        access.add_blocklist("2.2.2.2");
        access.add_blocklist("2.2.2.2");

        assert_eq!(access.safelist_len(), 1);
        assert_eq!(access.blocklist_len(), 1);
    }

    #[test]
    fn test_exact_blocklist() {
        let access = AccessList::new();
        access.add_blocklist("10.0.0.1");

        assert!(access.is_blocked("10.0.0.1"));
        assert!(!access.is_blocked("10.0.0.2"));
    }

    #[test]
    fn test_cidr_blocklist() {
        let access = AccessList::new();
        assert_ok!(access.add_blocklist_range("10.0.0.0/24"));

        assert!(access.is_blocked("10.0.0.5"));
        assert!(access.is_blocked("10.0.0.255"));
        assert!(!access.is_blocked("10.0.1.5"));
    }

    #[test]
    fn test_cidr_with_host_bits() {
        let access = AccessList::new();
        assert_ok!(access.add_blocklist_range("172.16.0.9/24"));

        assert!(access.is_blocked("172.16.0.5"));
    }

    #[test]
    fn test_ipv6_range_and_mapped_ipv4() {
        let access = AccessList::new();
        assert_ok!(access.add_blocklist_range("2001:db8::/32"));
        assert_ok!(access.add_blocklist_range("10.0.0.0/8"));

        assert!(access.is_blocked("2001:db8::1"));
        assert!(!access.is_blocked("2001:db9::1"));
        assert!(access.is_blocked("::ffff:10.1.2.3"));
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let access = AccessList::new();

        let err = assert_err!(access.add_blocklist_range("not-a-cidr"));
        assert!(matches!(err, GatekeeperError::InvalidCidr { ref cidr, .. } if cidr == "not-a-cidr"));
        assert_err!(access.add_blocklist_range("10.0.0.1"));
        assert_err!(access.add_blocklist_range("10.0.0.0/33"));

        assert_eq!(access.blocklist_range_len(), 0);
    }

    #[test]
    fn test_unparseable_ip_is_not_blocked() {
        let access = AccessList::new();
        assert_ok!(access.add_blocklist_range("0.0.0.0/0"));

        assert!(!access.is_blocked(""));
        assert!(!access.is_blocked("garbage"));
        assert!(!access.is_blocked(" 10.0.0.1"));
        assert!(access.is_blocked("10.0.0.1"));
    }
}
