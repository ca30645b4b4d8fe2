//! Rate limiter configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use fieldguard_core::domain::RateLimitPolicy;

/// Connection retry policy for the distributed store.
///
/// Delays grow as `base_delay * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection attempts before the store is latched unhealthy.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_or("REDIS_MAX_CONNECT_ATTEMPTS", defaults.max_attempts).max(1),
            base_delay: Duration::from_millis(env_or(
                "REDIS_BACKOFF_BASE_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(env_or(
                "REDIS_BACKOFF_CAP_MS",
                defaults.max_delay.as_millis() as u64,
            )),
        }
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Policies for every protected endpoint family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    pub login_by_address: RateLimitPolicy,
    pub login_by_identity: RateLimitPolicy,
    pub token_issuance: RateLimitPolicy,
    pub csp_report: RateLimitPolicy,
    pub error_report: RateLimitPolicy,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            login_by_address: RateLimitPolicy::login_by_address(),
            login_by_identity: RateLimitPolicy::login_by_identity(),
            token_issuance: RateLimitPolicy::token_issuance(),
            csp_report: RateLimitPolicy::csp_report(),
            error_report: RateLimitPolicy::error_report(),
        }
    }
}

impl PolicySet {
    /// Presets with `RATE_LIMIT_<NAME>_MAX_REQUESTS` / `RATE_LIMIT_<NAME>_WINDOW_SECS` overrides.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            login_by_address: policy_from_env("LOGIN_IP", defaults.login_by_address),
            login_by_identity: policy_from_env("LOGIN_EMAIL", defaults.login_by_identity),
            token_issuance: policy_from_env("TOKEN", defaults.token_issuance),
            csp_report: policy_from_env("CSP_REPORT", defaults.csp_report),
            error_report: policy_from_env("ERROR_REPORT", defaults.error_report),
        }
    }
}

fn policy_from_env(name: &str, preset: RateLimitPolicy) -> RateLimitPolicy {
    let max_requests = env_or(
        &format!("RATE_LIMIT_{name}_MAX_REQUESTS"),
        preset.max_requests(),
    );
    let window = Duration::from_secs(env_or(
        &format!("RATE_LIMIT_{name}_WINDOW_SECS"),
        preset.window().as_secs(),
    ));

    match RateLimitPolicy::new(preset.key_prefix(), max_requests, window) {
        Ok(policy) => policy,
        Err(e) => {
            tracing::warn!(policy = name, error = %e, "Invalid rate limit override, using preset");
            preset
        }
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Redis URL. `None` runs on the local store only.
    pub redis_url: Option<String>,
    /// Per-attempt connection timeout.
    pub connect_timeout: Duration,
    /// Per-operation timeout on the distributed store.
    pub operation_timeout: Duration,
    pub retry: RetryPolicy,
    /// Interval of the local store sweep.
    pub gc_interval: Duration,
    pub policies: PolicySet,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            connect_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            gc_interval: Duration::from_secs(60),
            policies: PolicySet::default(),
        }
    }
}

impl RateLimitSettings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            connect_timeout: Duration::from_secs(env_or(
                "REDIS_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            operation_timeout: Duration::from_millis(env_or(
                "REDIS_OPERATION_TIMEOUT_MS",
                defaults.operation_timeout.as_millis() as u64,
            )),
            retry: RetryPolicy::from_env(),
            gc_interval: Duration::from_secs(
                env_or("RATE_LIMIT_GC_INTERVAL_SECS", defaults.gc_interval.as_secs()).max(1),
            ),
            policies: PolicySet::from_env(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped_exponential() {
        let retry = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };

        assert_eq!(retry.backoff(0), Duration::from_millis(100));
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(800));
        assert_eq!(retry.backoff(4), Duration::from_millis(1_000));
        assert_eq!(retry.backoff(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_default_settings_are_local_only() {
        let settings = RateLimitSettings::default();
        assert!(settings.redis_url.is_none());
        assert_eq!(settings.policies.login_by_address.max_requests(), 5);
    }

    #[test]
    fn test_policy_override_falls_back_on_invalid_values() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("RATE_LIMIT_TEST_ZERO_MAX_REQUESTS", "0");
        }
        let policy = policy_from_env("TEST_ZERO", RateLimitPolicy::csp_report());
        assert_eq!(policy, RateLimitPolicy::csp_report());
    }

    #[test]
    fn test_oversized_window_override_keeps_preset() {
        // SAFETY: the variable name is unique to this test.
        unsafe {
            std::env::set_var("RATE_LIMIT_TEST_HUGE_WINDOW_SECS", u64::MAX.to_string());
        }
        let policy = policy_from_env("TEST_HUGE", RateLimitPolicy::login_by_address());
        assert_eq!(policy, RateLimitPolicy::login_by_address());
    }

    #[test]
    fn test_policy_override_applies() {
        // SAFETY: the variable names are unique to this test.
        unsafe {
            std::env::set_var("RATE_LIMIT_TEST_OVERRIDE_MAX_REQUESTS", "3");
            std::env::set_var("RATE_LIMIT_TEST_OVERRIDE_WINDOW_SECS", "30");
        }
        let policy = policy_from_env("TEST_OVERRIDE", RateLimitPolicy::token_issuance());
        assert_eq!(policy.key_prefix(), "token");
        assert_eq!(policy.max_requests(), 3);
        assert_eq!(policy.window(), Duration::from_secs(30));
    }
}
