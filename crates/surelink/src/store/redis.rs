//! Redis-backed cache store.

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, RedisResult, Script};
use std::future::Future;
use std::time::Duration;

use surelink_common::{Result, SurelinkError};

use super::CacheStore;

/// Append only while the list is below capacity. Single key, so atomic.
const PUSH_BOUNDED: &str = r#"
if redis.call('LLEN', KEYS[1]) >= tonumber(ARGV[2]) then
    return 0
end
redis.call('RPUSH', KEYS[1], ARGV[1])
return 1
"#;

/// Per-operation limits
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Deadline for a single round trip
    pub op_timeout: Duration,
    /// Attempts per operation on transient failures
    pub max_attempts: u32,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_millis(500),
            max_attempts: 2,
        }
    }
}

/// [`CacheStore`] over a shared Redis instance
#[derive(Clone)]
pub struct RedisStore {
    /// Auto-reconnecting connection
    conn: ConnectionManager,
    config: RedisStoreConfig,
    push_bounded: Script,
}

impl RedisStore {
    /// Connect to Redis with connection manager (handles reconnection)
    pub async fn connect(redis_url: &str, config: RedisStoreConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            conn,
            config,
            push_bounded: Script::new(PUSH_BOUNDED),
        })
    }

    /// Run `f` with a deadline, retrying transient failures within this call only
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = SurelinkError::Store(format!("{op}: no attempt made"));

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.op_timeout, f(self.conn.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if is_transient(&e) => {
                    tracing::warn!(op, attempt, error = %e, "Transient Redis error");
                    last_error = SurelinkError::Store(format!("{op}: {e}"));
                }
                Ok(Err(e)) => return Err(SurelinkError::Store(format!("{op}: {e}"))),
                Err(_) => {
                    tracing::warn!(op, attempt, timeout = ?self.config.op_timeout, "Redis operation timed out");
                    last_error = SurelinkError::Timeout(op.to_string());
                }
            }
        }

        Err(last_error)
    }
}

fn is_transient(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("get", |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let secs = ttl.as_secs().max(1);
        self.run("set_ex", |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, secs).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: i64 = self
            .run("del", |mut conn| async move { conn.del::<_, i64>(key).await })
            .await?;
        Ok(removed > 0)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        // GETDEL (Redis 6.2+) keeps read-and-delete atomic
        self.run("getdel", |mut conn| async move {
            let value: RedisResult<Option<String>> =
                redis::cmd("GETDEL").arg(key).query_async(&mut conn).await;
            value
        })
        .await
    }

    async fn push_bounded(&self, key: &str, value: &str, capacity: usize) -> Result<bool> {
        let script = &self.push_bounded;
        let pushed: i64 = self
            .run("push_bounded", |mut conn| async move {
                let pushed: RedisResult<i64> = script
                    .key(key)
                    .arg(value)
                    .arg(capacity)
                    .invoke_async(&mut conn)
                    .await;
                pushed
            })
            .await?;
        Ok(pushed == 1)
    }

    async fn pop_front(&self, key: &str) -> Result<Option<String>> {
        self.run("lpop", |mut conn| async move {
            conn.lpop::<_, Option<String>>(key, None).await
        })
        .await
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        self.run("llen", |mut conn| async move {
            conn.llen::<_, usize>(key).await
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        let _: String = self
            .run("ping", |mut conn| async move {
                let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                pong
            })
            .await?;
        Ok(())
    }
}
