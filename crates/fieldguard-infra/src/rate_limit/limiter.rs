//! Fallback-aware rate limiter.
//!
//! Prefers the distributed store while it is healthy and serves every other
//! call from the in-process store. A failed distributed call never denies or
//! admits on its own: the local store decides that call instead.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use fieldguard_core::domain::{Backend, RateLimitDecision, RateLimitPolicy, WindowStatus};
use fieldguard_core::ports::{Clock, RateLimitError, RateLimiter, StoreConnector, WindowStore};

use super::config::{RateLimitSettings, RetryPolicy};
use super::health::StoreHealth;
use super::memory::LocalWindowStore;

/// Observable state of the distributed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributedState {
    /// No distributed store configured.
    Disabled,
    /// Configured, not connected yet.
    Pending,
    Connected,
    /// Latched unhealthy.
    Unavailable,
    /// Closed at shutdown.
    Closed,
}

impl DistributedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Pending => "pending",
            Self::Connected => "connected",
            Self::Unavailable => "unavailable",
            Self::Closed => "closed",
        }
    }
}

struct Distributed {
    connector: Arc<dyn StoreConnector>,
    store: OnceCell<Arc<dyn WindowStore>>,
    retry: RetryPolicy,
    operation_timeout: Duration,
}

/// Process-wide limiter state: local store, distributed handle, and health latch.
///
/// Construct one at startup and share it behind an `Arc`.
pub struct RateLimiterContext {
    local: LocalWindowStore,
    distributed: Option<Distributed>,
    health: StoreHealth,
    shut_down: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl RateLimiterContext {
    /// Limiter backed by the local store only.
    pub fn local(clock: Arc<dyn Clock>) -> Self {
        Self {
            local: LocalWindowStore::new(clock.clone()),
            distributed: None,
            health: StoreHealth::new(1),
            shut_down: AtomicBool::new(false),
            clock,
        }
    }

    /// Limiter preferring a lazily connected distributed store.
    pub fn with_distributed(
        clock: Arc<dyn Clock>,
        connector: Arc<dyn StoreConnector>,
        retry: RetryPolicy,
        operation_timeout: Duration,
    ) -> Self {
        let health = StoreHealth::new(retry.max_attempts);
        Self {
            local: LocalWindowStore::new(clock.clone()),
            distributed: Some(Distributed {
                connector,
                store: OnceCell::new(),
                retry,
                operation_timeout,
            }),
            health,
            shut_down: AtomicBool::new(false),
            clock,
        }
    }

    /// Build from settings; uses Redis when a URL is configured.
    pub fn from_settings(settings: &RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        #[cfg(feature = "redis")]
        {
            if let Some(url) = &settings.redis_url {
                let config = super::RedisConfig {
                    url: url.clone(),
                    connect_timeout: settings.connect_timeout,
                };
                let connector = Arc::new(super::RedisConnector::new(config, clock.clone()));
                tracing::info!("Rate limiter will use Redis with local fallback");
                return Self::with_distributed(
                    clock,
                    connector,
                    settings.retry.clone(),
                    settings.operation_timeout,
                );
            }
        }

        #[cfg(not(feature = "redis"))]
        {
            if settings.redis_url.is_some() {
                tracing::warn!("REDIS_URL set but the redis feature is disabled");
            }
        }

        tracing::info!("Rate limiter running on the local store only");
        Self::local(clock)
    }

    pub fn health(&self) -> &StoreHealth {
        &self.health
    }

    pub fn local_store(&self) -> &LocalWindowStore {
        &self.local
    }

    pub fn distributed_state(&self) -> DistributedState {
        let Some(distributed) = &self.distributed else {
            return DistributedState::Disabled;
        };
        if self.shut_down.load(Ordering::Acquire) {
            DistributedState::Closed
        } else if !self.health.is_healthy() {
            DistributedState::Unavailable
        } else if distributed.store.initialized() {
            DistributedState::Connected
        } else {
            DistributedState::Pending
        }
    }

    /// Sweep expired local windows. Returns the number removed.
    pub fn collect_garbage(&self) -> usize {
        let purged = self.local.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.local.len(), "Swept expired rate limit windows");
        }
        purged
    }

    /// Close the distributed connection. Later calls are served locally.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(store) = self.distributed.as_ref().and_then(|d| d.store.get()) {
            store.close().await;
            tracing::info!("Distributed rate limit store closed");
        }
    }

    /// The distributed store, connecting on first use. `None` means use the local store.
    async fn distributed_store(&self) -> Option<(&Arc<dyn WindowStore>, Duration)> {
        let distributed = self.distributed.as_ref()?;
        if self.shut_down.load(Ordering::Acquire) || !self.health.is_healthy() {
            return None;
        }

        let store = distributed
            .store
            .get_or_try_init(|| self.connect_with_retry(distributed))
            .await
            .ok()?;

        Some((store, distributed.operation_timeout))
    }

    async fn connect_with_retry(
        &self,
        distributed: &Distributed,
    ) -> Result<Arc<dyn WindowStore>, RateLimitError> {
        // A waiter may reach here after another caller already latched the store
        if !self.health.is_healthy() {
            return Err(RateLimitError::Connection("store marked unhealthy".to_string()));
        }

        let mut attempt = 0;
        loop {
            match distributed.connector.connect().await {
                Ok(store) => {
                    self.health.record_connected();
                    tracing::info!(attempt = attempt + 1, "Connected to distributed rate limit store");
                    return Ok(store);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = distributed.retry.max_attempts,
                        error = %e,
                        "Distributed rate limit store connection failed"
                    );
                    if self.health.record_connection_failure() {
                        tracing::error!(
                            "Distributed rate limit store marked unhealthy, using local store for the rest of the process"
                        );
                        return Err(e);
                    }
                }
            }

            tokio::time::sleep(distributed.retry.backoff(attempt)).await;
            attempt += 1;
        }
    }

    fn decide(
        &self,
        status: &WindowStatus,
        policy: &RateLimitPolicy,
        backend: Backend,
    ) -> RateLimitDecision {
        RateLimitDecision::from_status(status, policy, self.clock.now(), backend)
    }
}

async fn bounded<T>(
    timeout: Duration,
    op: impl Future<Output = Result<T, RateLimitError>>,
) -> Result<T, RateLimitError> {
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| RateLimitError::Timeout(timeout))?
}

#[async_trait]
impl RateLimiter for RateLimiterContext {
    async fn check(&self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let key = policy.key_for(identifier);

        if let Some((store, timeout)) = self.distributed_store().await {
            match bounded(timeout, store.increment_and_check(&key, policy)).await {
                Ok(status) => return self.decide(&status, policy, Backend::Distributed),
                Err(e) => tracing::warn!(
                    policy = policy.key_prefix(),
                    error = %e,
                    "Distributed rate limit check failed, falling back to local store"
                ),
            }
        }

        let status = self.local.increment(&key, policy);
        self.decide(&status, policy, Backend::Local)
    }

    async fn remaining_requests(&self, identifier: &str, policy: &RateLimitPolicy) -> u32 {
        let key = policy.key_for(identifier);

        if let Some((store, timeout)) = self.distributed_store().await {
            match bounded(timeout, store.remaining(&key, policy)).await {
                Ok(remaining) => return remaining,
                Err(e) => tracing::warn!(
                    policy = policy.key_prefix(),
                    error = %e,
                    "Distributed remaining lookup failed, falling back to local store"
                ),
            }
        }

        self.local.remaining_for(&key, policy)
    }

    async fn reset(&self, identifier: &str, policy: &RateLimitPolicy) {
        let key = policy.key_for(identifier);

        if let Some((store, timeout)) = self.distributed_store().await {
            if let Err(e) = bounded(timeout, store.reset(&key)).await {
                tracing::warn!(
                    policy = policy.key_prefix(),
                    error = %e,
                    "Distributed rate limit reset failed"
                );
            }
        }

        // The local copy may hold counts from an earlier outage.
        self.local.remove(&key);
    }
}
