//! Rate limiting ports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{RateLimitDecision, RateLimitKey, RateLimitPolicy, WindowStatus};

/// Fixed-window counter storage - abstraction over local and distributed backends.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Count one request against `key` and report whether the quota is exceeded.
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<WindowStatus, RateLimitError>;

    /// Requests still admitted in the current window.
    async fn remaining(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<u32, RateLimitError>;

    /// Drop the window for `key`.
    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError>;

    /// Release any connection held by the store.
    async fn close(&self) {}
}

/// Factory for the distributed store, invoked lazily on first use.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn WindowStore>, RateLimitError>;
}

/// Rate limiter - the admission gate request handlers depend on.
///
/// Methods are infallible: store failures are recovered inside the limiter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count this call and decide admit/deny.
    async fn check(&self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision;

    /// Shorthand for `check(..).limited`.
    async fn is_limited(&self, identifier: &str, policy: &RateLimitPolicy) -> bool {
        self.check(identifier, policy).await.limited
    }

    async fn remaining_requests(&self, identifier: &str, policy: &RateLimitPolicy) -> u32;

    async fn reset(&self, identifier: &str, policy: &RateLimitPolicy);
}

/// Window store errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
