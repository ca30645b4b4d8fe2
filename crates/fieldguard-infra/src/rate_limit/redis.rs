//! Redis window store using an atomic increment-and-expire script.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tokio::sync::RwLock;

use fieldguard_core::domain::{RateLimitKey, RateLimitPolicy, WindowStatus};
use fieldguard_core::ports::{Clock, RateLimitError, StoreConnector, WindowStore};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// INCR, then set the expiry only when this call created the counter
/// (or a previous expiry was lost). Returns `{count, pttl_ms}`.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if current == 1 or ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

/// Redis-backed window store shared by every process pointing at the same server.
pub struct RedisWindowStore {
    conn: RwLock<Option<ConnectionManager>>,
    script: Script,
    clock: Arc<dyn Clock>,
}

impl RedisWindowStore {
    pub async fn new(config: &RedisConfig, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RateLimitError::Connection(e.to_string()))?;
        let addr = client.get_connection_info().addr.to_string();

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| RateLimitError::Timeout(config.connect_timeout))?
            .map_err(|e| RateLimitError::Connection(e.to_string()))?;

        tracing::info!(addr = %addr, "Connected to Redis rate limit store");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            script: Script::new(INCREMENT_SCRIPT),
            clock,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, RateLimitError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| RateLimitError::Connection("connection closed".to_string()))
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<WindowStatus, RateLimitError> {
        let mut conn = self.connection().await?;
        let window_ms = policy.window_millis();

        let result: Vec<i64> = self
            .script
            .key(key.as_str())
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Operation(e.to_string()))?;

        let (count, ttl_ms) = match result.as_slice() {
            [count, ttl] => (*count, *ttl),
            other => {
                return Err(RateLimitError::Operation(format!(
                    "unexpected script reply: {other:?}"
                )));
            }
        };

        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        let ttl_ms = ttl_ms.clamp(0, window_ms);

        Ok(WindowStatus {
            count,
            exceeded: count > policy.max_requests(),
            reset_at: deadline(self.clock.now(), ttl_ms),
        })
    }

    async fn remaining(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<u32, RateLimitError> {
        let mut conn = self.connection().await?;

        let count: Option<i64> = conn
            .get(key.as_str())
            .await
            .map_err(|e| RateLimitError::Operation(e.to_string()))?;

        let count = u32::try_from(count.unwrap_or(0).max(0)).unwrap_or(u32::MAX);
        Ok(policy.max_requests().saturating_sub(count))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key.as_str())
            .await
            .map_err(|e| RateLimitError::Operation(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        // In-flight calls keep their clones; new calls see a closed store
        self.conn.write().await.take();
    }
}

/// `now + ttl_ms`, saturating at the latest representable instant.
fn deadline(now: DateTime<Utc>, ttl_ms: i64) -> DateTime<Utc> {
    TimeDelta::try_milliseconds(ttl_ms)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Lazily opens a [`RedisWindowStore`].
pub struct RedisConnector {
    config: RedisConfig,
    clock: Arc<dyn Clock>,
}

impl RedisConnector {
    pub fn new(config: RedisConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn WindowStore>, RateLimitError> {
        let store = RedisWindowStore::new(&self.config, self.clock.clone()).await?;
        Ok(Arc::new(store))
    }
}
