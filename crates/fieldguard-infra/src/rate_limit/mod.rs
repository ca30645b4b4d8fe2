//! Rate limiting implementations.

mod composite;
mod config;
mod health;
mod limiter;
mod memory;

pub use composite::CompositePolicy;
pub use config::{PolicySet, RateLimitSettings, RetryPolicy};
pub use health::StoreHealth;
pub use limiter::{DistributedState, RateLimiterContext};
pub use memory::LocalWindowStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisConnector, RedisWindowStore};
