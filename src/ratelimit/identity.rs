//! Client identity extraction.
//!
//! The client IP is taken from the first `X-Forwarded-For` entry when the
//! header is present and the immediate peer is trusted to set it, otherwise
//! from the host part of the transport remote address.
//!
//! # Security
//!
//! By default every peer is trusted, so any client able to set headers can
//! choose the IP its requests are judged by. Deployments not behind a
//! proxy that overwrites the header should configure [`TrustedProxies`].

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::warn;

/// Standard forwarded-for header name.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The parts of an HTTP request the admission filter needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// HTTP method as received (e.g. `POST`)
    pub method: String,
    /// Raw URL path
    pub path: String,
    /// Transport remote address, usually `host:port`
    pub remote_addr: String,
    /// Raw `X-Forwarded-For` header value
    pub forwarded_for: Option<String>,
}

impl RequestInfo {
    /// Create a request without a forwarded-for header.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            remote_addr: remote_addr.into(),
            forwarded_for: None,
        }
    }

    /// Set the forwarded-for header value.
    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    /// Build from an `http` request and the peer address of its connection.
    ///
    /// A forwarded-for header that is not valid visible ASCII is ignored.
    pub fn from_http<B>(request: &http::Request<B>, remote_addr: impl Into<String>) -> Self {
        let forwarded_for = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            remote_addr: remote_addr.into(),
            forwarded_for,
        }
    }
}

/// Extracts the client identity from a request.
pub trait IdentitySource: Send + Sync {
    /// The client IP string. Never fails; returns an empty string when
    /// nothing usable is found.
    fn client_ip(&self, request: &RequestInfo) -> String;
}

/// Which peers may supply the forwarded-for header.
#[derive(Debug, Clone, Default)]
pub enum TrustedProxies {
    /// Never honor the header
    None,
    /// Honor the header from any peer
    #[default]
    All,
    /// Honor the header only from these addresses
    List(Vec<IpNet>),
}

impl TrustedProxies {
    /// Build from configuration entries.
    ///
    /// An empty list trusts nobody, a single `*` trusts everybody, anything
    /// else is a list of IPs and CIDR ranges. Unparseable entries are logged
    /// and skipped.
    pub fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            return Self::None;
        }
        if proxies.len() == 1 && proxies[0] == "*" {
            return Self::All;
        }

        let entries = proxies
            .iter()
            .filter_map(|proxy| {
                if proxy.contains('/') {
                    match proxy.parse::<IpNet>() {
                        Ok(net) => Some(net.trunc()),
                        Err(e) => {
                            warn!(proxy = %proxy, error = %e, "Ignoring invalid trusted proxy CIDR");
                            None
                        }
                    }
                } else {
                    match proxy.parse::<IpAddr>() {
                        Ok(ip) => Some(IpNet::from(ip)),
                        Err(e) => {
                            warn!(proxy = %proxy, error = %e, "Ignoring invalid trusted proxy IP");
                            None
                        }
                    }
                }
            })
            .collect();

        Self::List(entries)
    }

    /// Check whether a peer host may supply the forwarded-for header.
    pub fn is_trusted(&self, peer: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::List(nets) => match peer.parse::<IpAddr>() {
                Ok(ip) => {
                    let ip = ip.to_canonical();
                    nets.iter().any(|net| net.contains(&ip))
                }
                Err(_) => false,
            },
        }
    }
}

/// Forwarded-for aware client IP extractor.
#[derive(Debug, Clone, Default)]
pub struct ClientIpExtractor {
    trusted_proxies: TrustedProxies,
}

impl ClientIpExtractor {
    /// Create an extractor honoring the header from the given peers.
    pub fn new(trusted_proxies: TrustedProxies) -> Self {
        Self { trusted_proxies }
    }
}

impl IdentitySource for ClientIpExtractor {
    fn client_ip(&self, request: &RequestInfo) -> String {
        let peer = split_host(&request.remote_addr);

        if let Some(header) = request.forwarded_for.as_deref().filter(|h| !h.is_empty()) {
            if self.trusted_proxies.is_trusted(peer) {
                let first = header.split(',').next().unwrap_or_default().trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }

        peer.to_string()
    }
}

/// Host part of a `host:port` or `[host]:port` address.
///
/// Anything else, including a bare IP without a port, yields an empty string.
pub fn split_host(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) if !port.contains(':') => host,
            _ => "",
        };
    }

    match addr.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host,
        _ => "",
    }
}
