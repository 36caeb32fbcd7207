//! Admission decision engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use super::backend::CounterStore;
use super::identity::{ClientIpExtractor, IdentitySource, RequestInfo};
use super::policy::Policy;
use super::rules::ThrottleRule;
use crate::error::{GatekeeperError, Result};

/// Outcome of evaluating a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No list entry or rule stopped the request
    Allowed,
    /// The client IP is safelisted; nothing else was checked
    Safelisted,
    /// The client IP is blocklisted, exactly or by range
    Blocked,
    /// A matching rule's counter went over its limit
    Throttled {
        /// The rule that was breached
        rule: Arc<ThrottleRule>,
        /// Rendered counter key
        key: String,
        /// Counter value after this request
        count: u64,
    },
}

impl Decision {
    /// Whether the request must be denied.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Decision::Blocked | Decision::Throttled { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => write!(f, "allowed"),
            Decision::Safelisted => write!(f, "safelisted"),
            Decision::Blocked => write!(f, "blocked"),
            Decision::Throttled { rule, count, .. } => write!(
                f,
                "throttled by '{}' ({}/{})",
                rule.label(),
                count,
                rule.limit()
            ),
        }
    }
}

/// The request admission engine.
///
/// Evaluation order is fixed: safelist, blocklist, then matching throttle
/// rules in registration order. The first rule whose counter exceeds its
/// limit throttles the request and later rules are neither evaluated nor
/// incremented. Rules before the breach have already been incremented.
///
/// The engine holds no per-decision state and is shared between tasks.
pub struct Engine<S: CounterStore> {
    policy: Arc<Policy>,
    store: Arc<S>,
    identity: Arc<dyn IdentitySource>,
    storage_timeout: Option<Duration>,
}

impl<S: CounterStore> Engine<S> {
    /// Create an engine using the forwarded-for aware IP extractor and no
    /// storage timeout.
    pub fn new(policy: Arc<Policy>, store: Arc<S>) -> Self {
        Self {
            policy,
            store,
            identity: Arc::new(ClientIpExtractor::default()),
            storage_timeout: None,
        }
    }

    /// Replace the identity source.
    pub fn with_identity_source(mut self, identity: impl IdentitySource + 'static) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    /// Bound every counter store call; an elapsed timeout is a storage failure.
    pub fn with_storage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// The policy this engine evaluates.
    pub fn policy(&self) -> &Arc<Policy> {
        &self.policy
    }

    /// The counter store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decide whether a request is admitted.
    ///
    /// A counter store failure is returned as an error immediately. No
    /// throttling decision is implied, so the caller chooses whether to fail
    /// open or closed.
    #[instrument(
        skip(self, request),
        fields(method = %request.method, path = %request.path)
    )]
    pub async fn decide(&self, request: &RequestInfo) -> Result<Decision> {
        let ip = self.identity.client_ip(request);
        let access = self.policy.access();

        if access.is_safelisted(&ip) {
            trace!(ip = %ip, "Client is safelisted");
            return Ok(Decision::Safelisted);
        }

        if access.is_blocked(&ip) {
            debug!(ip = %ip, "Client is blocklisted");
            return Ok(Decision::Blocked);
        }

        let rules = self
            .policy
            .rules()
            .matching_rules(&request.path, &request.method);

        for rule in rules {
            let key = rule.key().render(&ip, &request.path);
            let count = self.increment(&key, rule.period()).await?;

            trace!(
                rule = %rule.label(),
                key = %key,
                count = count,
                limit = rule.limit(),
                "Evaluated throttle rule"
            );

            if count > rule.limit() {
                debug!(
                    ip = %ip,
                    rule = %rule.label(),
                    key = %key,
                    count = count,
                    limit = rule.limit(),
                    "Throttle limit exceeded"
                );
                return Ok(Decision::Throttled { rule, key, count });
            }
        }

        Ok(Decision::Allowed)
    }

    /// Decide and reduce the outcome to "throttled or not".
    pub async fn is_throttled(&self, request: &RequestInfo) -> Result<bool> {
        Ok(self.decide(request).await?.is_throttled())
    }

    async fn increment(&self, key: &str, period: Duration) -> Result<u64> {
        let increment = self.store.increment_and_expire(key, period);

        let result = match self.storage_timeout {
            Some(timeout) => tokio::time::timeout(timeout, increment)
                .await
                .unwrap_or_else(|_| {
                    Err(GatekeeperError::Storage(format!(
                        "counter store timed out after {:?}",
                        timeout
                    )))
                }),
            None => increment.await,
        };

        result.inspect_err(|e| warn!(key = %key, error = %e, "Counter store failure"))
    }
}

impl<S: CounterStore> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            store: self.store.clone(),
            identity: self.identity.clone(),
            storage_timeout: self.storage_timeout,
        }
    }
}
