//! Redis coordination store.
//!
//! Layout per key namespace:
//! - `{rate_prefix}:{tier}:{client}` - sorted set of event timestamps (unix
//!   millis), expiring one window after the last event.
//! - `{lockout_prefix}:{id}:count` - failure counter with the lockout TTL.
//! - `{lockout_prefix}:{id}:locked_until` - unix millis, same TTL.
//!
//! Multi-step updates run as Lua scripts so concurrent callers never both
//! observe spare capacity or both cross the lockout threshold.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use bastion_core::domain::{FailureOutcome, LockoutPolicy, WindowDecision};
use bastion_core::ports::{GovernanceStore, StoreError};

const WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local window = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
local count = redis.call('ZCARD', key)
if count < limit then
    redis.call('ZADD', key, now, member)
    redis.call('PEXPIRE', key, window)
    return {1, count + 1}
end
return {0, count}
"#;

const LOCKOUT_SCRIPT: &str = r#"
local count_key = KEYS[1]
local lock_key = KEYS[2]
local max_attempts = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local count = redis.call('INCR', count_key)
redis.call('PEXPIRE', count_key, ttl)
if count >= max_attempts then
    redis.call('SET', lock_key, now + ttl, 'PX', ttl)
    redis.call('DEL', count_key)
    return {0, 1}
end
return {count, 0}
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Startup connection timeout
    pub connect_timeout: Duration,
    /// Key prefix for lockout entries
    pub lockout_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(2),
            lockout_prefix: "brute_force".to_string(),
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` when `REDIS_URL` is unset: the service then runs on
    /// in-process state only.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("REDIS_URL").ok()?;

        Some(Self {
            url,
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            lockout_prefix: std::env::var("LOCKOUT_KEY_PREFIX")
                .unwrap_or_else(|_| "brute_force".to_string()),
        })
    }
}

/// Redis-backed governance store shared by all instances.
pub struct RedisStore {
    conn: ConnectionManager,
    config: RedisConfig,
    window_script: Script,
    lockout_script: Script,
}

impl RedisStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis coordination store");

        Ok(Self {
            conn,
            config,
            window_script: Script::new(WINDOW_SCRIPT),
            lockout_script: Script::new(LOCKOUT_SCRIPT),
        })
    }

    /// Round-trip latency of a PING, bounded by `timeout`.
    pub async fn ping(&self, timeout: Duration) -> Result<Duration, StoreError> {
        let mut conn = self.conn.clone();
        let started = std::time::Instant::now();
        let reply: redis::RedisResult<String> =
            tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut conn))
                .await
                .map_err(|_| StoreError::Timeout(timeout))?;
        reply.map_err(|e| StoreError::Operation(e.to_string()))?;
        Ok(started.elapsed())
    }

    fn count_key(&self, identifier: &str) -> String {
        format!("{}:{}:count", self.config.lockout_prefix, identifier)
    }

    fn lock_key(&self, identifier: &str) -> String {
        format!("{}:{}:locked_until", self.config.lockout_prefix, identifier)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl GovernanceStore for RedisStore {
    async fn window_admit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<WindowDecision, StoreError> {
        let mut conn = self.conn.clone();
        let now = now_millis();
        // Unique member so events in the same millisecond are counted separately
        let member = format!("{}-{}", now, uuid::Uuid::new_v4());

        let result: Vec<i64> = self
            .window_script
            .key(key)
            .arg(limit)
            .arg(now)
            .arg(window.as_millis() as u64)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Script(e.to_string()))?;

        match result.as_slice() {
            [allowed, count] => Ok(WindowDecision {
                allowed: *allowed == 1,
                count: (*count).max(0) as u32,
            }),
            other => Err(StoreError::Script(format!(
                "unexpected window reply: {other:?}"
            ))),
        }
    }

    async fn lockout_check(&self, identifier: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let locked_until: Option<String> = conn
            .get(self.lock_key(identifier))
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(locked_until
            .and_then(|value| value.parse::<i64>().ok())
            .is_some_and(|until| now_millis() < until))
    }

    async fn lockout_record(
        &self,
        identifier: &str,
        policy: &LockoutPolicy,
    ) -> Result<FailureOutcome, StoreError> {
        let mut conn = self.conn.clone();

        let result: Vec<i64> = self
            .lockout_script
            .key(self.count_key(identifier))
            .key(self.lock_key(identifier))
            .arg(policy.max_attempts)
            .arg(policy.lockout_duration.as_millis() as u64)
            .arg(now_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Script(e.to_string()))?;

        match result.as_slice() {
            [_, 1] => Ok(FailureOutcome::locked()),
            [count, _] => Ok(FailureOutcome::counted((*count).max(0) as u32)),
            other => Err(StoreError::Script(format!(
                "unexpected lockout reply: {other:?}"
            ))),
        }
    }

    async fn lockout_clear(&self, identifier: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(vec![self.count_key(identifier), self.lock_key(identifier)])
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            lockout_prefix: format!("test_brute_force_{}", uuid::Uuid::new_v4()),
        };

        let store = RedisStore::new(config).await.ok()?;
        // ConnectionManager may connect lazily; make sure the server answers
        store.ping(Duration::from_secs(1)).await.ok()?;
        Some(store)
    }

    #[tokio::test]
    async fn test_redis_window() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = format!("test_rate_limit:auth:{}", uuid::Uuid::new_v4());
        let window = Duration::from_secs(1);

        let first = store.window_admit(&key, 2, window).await.unwrap();
        assert!(first.allowed);
        assert_eq!(first.count, 1);

        assert!(store.window_admit(&key, 2, window).await.unwrap().allowed);

        let third = store.window_admit(&key, 2, window).await.unwrap();
        assert!(!third.allowed);
        assert_eq!(third.count, 2);

        // Wait for the window to slide
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.window_admit(&key, 2, window).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_redis_concurrent_window() {
        let store = match get_test_store().await {
            Some(s) => std::sync::Arc::new(s),
            None => return,
        };

        let key = format!("test_rate_limit:write:{}", uuid::Uuid::new_v4());
        let handles: Vec<_> = (0..40)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .window_admit(&key, 30, Duration::from_secs(60))
                        .await
                        .map(|d| d.allowed)
                        .unwrap_or(false)
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 30);
    }

    #[tokio::test]
    async fn test_redis_lockout_cycle() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let policy = LockoutPolicy::default();
        let id = "locked@example.com";

        for n in 1..=4 {
            let outcome = store.lockout_record(id, &policy).await.unwrap();
            assert_eq!(outcome, FailureOutcome::counted(n));
        }
        assert!(!store.lockout_check(id).await.unwrap());

        let outcome = store.lockout_record(id, &policy).await.unwrap();
        assert!(outcome.locked);
        assert!(store.lockout_check(id).await.unwrap());

        store.lockout_clear(id).await.unwrap();
        assert!(!store.lockout_check(id).await.unwrap());
        let outcome = store.lockout_record(id, &policy).await.unwrap();
        assert_eq!(outcome, FailureOutcome::counted(1));

        store.lockout_clear(id).await.unwrap();
    }
}
