//! Application state - shared across all handlers.

use std::sync::Arc;

use fieldguard_core::ports::{Clock, SystemClock};
use fieldguard_infra::{CompositePolicy, PolicySet, RateLimiterContext};

use crate::config::AppConfig;
use crate::middleware::error::AppResult;
use crate::upstream::UpstreamClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiterContext>,
    pub policies: PolicySet,
    /// Address + email protection for the login route.
    pub login: CompositePolicy,
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Build the application state. The distributed store connects lazily.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let limiter = Arc::new(RateLimiterContext::from_settings(&config.rate_limit, clock));
        let upstream = UpstreamClient::new(config.upstream_url.clone(), config.upstream_timeout)?;

        tracing::info!(upstream = %config.upstream_url, "Application state initialized");

        Ok(Self::from_parts(
            limiter,
            config.rate_limit.policies.clone(),
            upstream,
        ))
    }

    pub fn from_parts(
        limiter: Arc<RateLimiterContext>,
        policies: PolicySet,
        upstream: UpstreamClient,
    ) -> Self {
        let login = CompositePolicy::login(limiter.clone(), &policies);
        Self {
            limiter,
            policies,
            login,
            upstream,
        }
    }
}
