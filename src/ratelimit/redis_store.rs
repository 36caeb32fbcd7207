//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use tracing::{info, trace};

use super::backend::CounterStore;
use crate::error::Result;

/// INCR, plus PEXPIRE when the increment created the key.
const INCREMENT_AND_EXPIRE: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Counter store shared by every node pointed at the same Redis server.
///
/// Uses Redis' native atomic `INCR`. The combined increment-and-expire runs
/// as one Lua script, so the first hit and its expiry land in a single round trip.
pub struct RedisCounterStore {
    connection: MultiplexedConnection,
    script: Script,
}

impl RedisCounterStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        info!(url = %url, "Connected to Redis counter store");

        Ok(Self {
            connection,
            script: Script::new(INCREMENT_AND_EXPIRE),
        })
    }
}

/// Expiry in milliseconds, never below 1 so a key always gets a TTL.
fn period_millis(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, period: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(period_millis(period))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment_and_expire(&self, key: &str, period: Duration) -> Result<u64> {
        let mut conn = self.connection.clone();
        let count: u64 = self
            .script
            .key(key)
            .arg(period_millis(period))
            .invoke_async(&mut conn)
            .await?;

        trace!(key = %key, count = count, "Incremented Redis counter");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    const TEST_URL: &str = "redis://127.0.0.1:6379";

    #[test]
    fn test_period_millis() {
        assert_eq!(period_millis(Duration::from_secs(60)), 60_000);
        assert_eq!(period_millis(Duration::from_micros(10)), 1);
        assert_eq!(period_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    #[ignore = "requires a Redis server on localhost"]
    async fn test_redis_increment_and_expire() {
        let store = assert_ok!(RedisCounterStore::connect(TEST_URL).await);
        let key = "gatekeeper:test:increment_and_expire";

        let mut conn = store.connection.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await.unwrap();

        let period = Duration::from_secs(30);
        assert_eq!(assert_ok!(store.increment_and_expire(key, period).await), 1);
        assert_eq!(assert_ok!(store.increment_and_expire(key, period).await), 2);

        let ttl: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await.unwrap();
        assert!(ttl > 0 && ttl <= 30_000);
    }

    #[tokio::test]
    #[ignore = "requires a Redis server on localhost"]
    async fn test_redis_two_step_path() {
        let store = assert_ok!(RedisCounterStore::connect(TEST_URL).await);
        let key = "gatekeeper:test:two_step";

        let mut conn = store.connection.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await.unwrap();

        assert_eq!(assert_ok!(store.incr(key).await), 1);
        assert_ok!(store.expire(key, Duration::from_secs(5)).await);

        let ttl: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await.unwrap();
        assert!(ttl > 0 && ttl <= 5_000);
    }
}
