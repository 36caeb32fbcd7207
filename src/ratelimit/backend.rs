//! Counter store trait for abstracting in-memory and networked backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Atomic counter storage used by the fixed-window algorithm.
///
/// Implementations must make `incr` atomic for concurrent callers on the
/// same key; the whole rate limiting guarantee rests on it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one to the counter for `key` and return the new value.
    ///
    /// A missing or expired counter starts from zero.
    async fn incr(&self, key: &str) -> Result<u64>;

    /// Expire the counter for `key` after `period` from now.
    async fn expire(&self, key: &str, period: Duration) -> Result<()>;

    /// Increment the counter and start its window on the first hit.
    ///
    /// The default runs `incr` then, when the count is 1, `expire`. The two
    /// steps are separate calls; setting the expiry twice is harmless.
    /// Backends with a single round-trip primitive should override this.
    async fn increment_and_expire(&self, key: &str, period: Duration) -> Result<u64> {
        let count = self.incr(key).await?;
        if count == 1 {
            self.expire(key, period).await?;
        }
        Ok(count)
    }
}
