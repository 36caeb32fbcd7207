//! Error types for the Gatekeeper filter.

use thiserror::Error;

/// Main error type for Gatekeeper operations.
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Malformed CIDR notation passed to the blocklist range mutator
    #[error("Invalid CIDR '{cidr}': {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    /// Throttle rule violating `limit >= 1` or `period > 0`
    #[error("Invalid throttle rule: {0}")]
    InvalidRule(String),

    /// The counter store could not complete an increment or expire
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for GatekeeperError {
    fn from(err: redis::RedisError) -> Self {
        GatekeeperError::Storage(err.to_string())
    }
}

impl From<config::ConfigError> for GatekeeperError {
    fn from(err: config::ConfigError) -> Self {
        GatekeeperError::Config(err.to_string())
    }
}

/// Result type alias for Gatekeeper operations.
pub type Result<T> = std::result::Result<T, GatekeeperError>;
