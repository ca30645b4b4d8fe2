//! # FieldGuard Infrastructure
//!
//! Concrete implementations of the ports defined in `fieldguard-core`:
//! the in-process window store, the Redis window store, and the
//! fallback-aware rate limiter that composes them.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, local store only
//! - `redis` - Redis-backed distributed window store

pub mod rate_limit;

// Re-exports - In-Memory
pub use rate_limit::{
    CompositePolicy, DistributedState, LocalWindowStore, PolicySet, RateLimitSettings,
    RateLimiterContext, RetryPolicy, StoreHealth,
};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisConnector, RedisWindowStore};
