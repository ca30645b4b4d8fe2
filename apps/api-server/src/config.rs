//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use fieldguard_infra::RateLimitSettings;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the service that owns credentials and tokens.
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub rate_limit: RateLimitSettings,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            upstream_url: env::var("UPSTREAM_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            upstream_timeout: Duration::from_secs(
                env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            rate_limit: RateLimitSettings::from_env(),
        }
    }
}
