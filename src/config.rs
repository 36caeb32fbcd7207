//! Configuration management for Gatekeeper.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatekeeperError, Result};
use crate::ratelimit::{ClientIpExtractor, Policy, ThrottleRule, TrustedProxies};

/// Prefix of environment variables overriding file values,
/// e.g. `GATEKEEPER__STORAGE__REDIS_URL`.
pub const ENV_PREFIX: &str = "GATEKEEPER";

/// Main configuration for the Gatekeeper filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Counter store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Client identity configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Safelist and blocklist entries
    #[serde(default)]
    pub access: AccessConfig,

    /// Throttle rules, in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Counter store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Host-local counters
    #[default]
    Memory,
    /// Counters shared through a Redis server
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Counter store call timeout in milliseconds; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis_url: default_redis_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StorageConfig {
    /// The storage timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_timeout_ms() -> u64 {
    250
}

/// Client identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Peers allowed to supply `X-Forwarded-For`: IPs, CIDRs, or `"*"` for all
    #[serde(default = "default_trusted_proxies")]
    pub trusted_proxies: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: default_trusted_proxies(),
        }
    }
}

impl IdentityConfig {
    /// Build the client IP extractor.
    pub fn extractor(&self) -> ClientIpExtractor {
        ClientIpExtractor::new(TrustedProxies::from_config(&self.trusted_proxies))
    }
}

fn default_trusted_proxies() -> Vec<String> {
    vec!["*".to_string()]
}

/// Safelist and blocklist entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub safelist: Vec<String>,

    #[serde(default)]
    pub blocklist: Vec<String>,

    #[serde(default)]
    pub blocklist_cidrs: Vec<String>,
}

/// A throttle rule as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Optional name for logs
    #[serde(default)]
    pub name: Option<String>,

    /// Path pattern; empty matches all paths, a trailing `/*` matches a prefix
    #[serde(default)]
    pub path: String,

    /// HTTP method; empty matches all methods
    #[serde(default)]
    pub method: String,

    /// Counter key template with `%{ip}` and `%{path}` placeholders
    pub key: String,

    /// Requests allowed per period
    pub limit: u64,

    /// Period length in seconds
    pub period_secs: u64,
}

impl RuleConfig {
    /// Validate and convert into a throttle rule.
    pub fn to_rule(&self) -> Result<ThrottleRule> {
        let rule = ThrottleRule::new(
            &self.path,
            self.method.clone(),
            self.key.as_str(),
            self.limit,
            Duration::from_secs(self.period_secs),
        )?;

        Ok(match &self.name {
            Some(name) => rule.with_name(name.clone()),
            None => rule,
        })
    }
}

impl GatekeeperConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional YAML file layered with
    /// `GATEKEEPER__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder
                .add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Validate every entry and build the policy.
    ///
    /// The first malformed CIDR or rule fails the whole build.
    pub fn build_policy(&self) -> Result<Policy> {
        let policy = Policy::new();

        for ip in &self.access.safelist {
            policy.add_safelist_ip(ip.clone());
        }
        for ip in &self.access.blocklist {
            policy.add_blocklist_ip(ip.clone());
        }
        for cidr in &self.access.blocklist_cidrs {
            policy.add_blocklist_cidr(cidr)?;
        }
        for rule in &self.rules {
            policy.add_throttle_rule(rule.to_rule()?);
        }

        info!(
            safelist = policy.access().safelist_len(),
            blocklist = policy.access().blocklist_len(),
            blocklist_cidrs = policy.access().blocklist_range_len(),
            rules = policy.rules().len(),
            "Policy built"
        );

        Ok(policy)
    }
}
