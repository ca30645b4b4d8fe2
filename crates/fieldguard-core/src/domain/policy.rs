//! Rate limit policies and the keys they count.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::PolicyError;

/// Longest accepted window: one leap year.
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Immutable fixed-window policy.
///
/// A policy is one quota for one endpoint purpose. Keys produced by different
/// prefixes never share a counter, so the same request can be evaluated
/// against several policies independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    key_prefix: String,
    max_requests: u32,
    window: Duration,
}

impl RateLimitPolicy {
    /// Build a validated policy.
    pub fn new(
        key_prefix: impl Into<String>,
        max_requests: u32,
        window: Duration,
    ) -> Result<Self, PolicyError> {
        let key_prefix = key_prefix.into();

        if key_prefix.trim().is_empty() {
            return Err(PolicyError::EmptyPrefix);
        }
        if key_prefix.contains(':') {
            return Err(PolicyError::InvalidPrefix(key_prefix));
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroQuota);
        }
        if window.as_millis() == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if window > MAX_WINDOW {
            return Err(PolicyError::WindowTooLong(window));
        }

        Ok(Self {
            key_prefix,
            max_requests,
            window,
        })
    }

    fn preset(key_prefix: &str, max_requests: u32, window_secs: u64) -> Self {
        Self {
            key_prefix: key_prefix.to_string(),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Login attempts per source address: 5 per 15 minutes.
    pub fn login_by_address() -> Self {
        Self::preset("login-ip", 5, 15 * 60)
    }

    /// Login attempts per claimed identity: 10 per 15 minutes.
    pub fn login_by_identity() -> Self {
        Self::preset("login-email", 10, 15 * 60)
    }

    /// Token issuance per source address: 10 per minute.
    pub fn token_issuance() -> Self {
        Self::preset("token", 10, 60)
    }

    /// CSP violation reports per source address: 100 per minute.
    pub fn csp_report() -> Self {
        Self::preset("csp-report", 100, 60)
    }

    /// Client error reports per source address: 30 per minute.
    pub fn error_report() -> Self {
        Self::preset("error-report", 30, 60)
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds.
    pub fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Reset instant of a window opened at `opened_at`. Saturates at the
    /// latest representable instant.
    pub fn window_end(&self, opened_at: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.window)
            .ok()
            .and_then(|window| opened_at.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Compose the counter key for an identifier under this policy.
    pub fn key_for(&self, identifier: &str) -> RateLimitKey {
        RateLimitKey(format!("{}:{}", self.key_prefix, identifier))
    }
}

/// `{policy-prefix}:{identifier}` - one countable subject within one policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_composition() {
        let policy = RateLimitPolicy::new("login-ip", 5, Duration::from_secs(900)).unwrap();
        assert_eq!(policy.key_for("203.0.113.7").as_str(), "login-ip:203.0.113.7");
    }

    #[test]
    fn test_prefixes_isolate_keys() {
        let by_ip = RateLimitPolicy::login_by_address();
        let by_email = RateLimitPolicy::login_by_identity();
        assert_ne!(by_ip.key_for("same"), by_email.key_for("same"));
    }

    #[test]
    fn test_validation() {
        let window = Duration::from_secs(60);
        assert_eq!(
            RateLimitPolicy::new("  ", 5, window),
            Err(PolicyError::EmptyPrefix)
        );
        assert_eq!(
            RateLimitPolicy::new("a:b", 5, window),
            Err(PolicyError::InvalidPrefix("a:b".to_string()))
        );
        assert_eq!(
            RateLimitPolicy::new("csp", 0, window),
            Err(PolicyError::ZeroQuota)
        );
        assert_eq!(
            RateLimitPolicy::new("csp", 1, Duration::from_micros(10)),
            Err(PolicyError::ZeroWindow)
        );
    }

    #[test]
    fn test_rejects_oversized_windows() {
        assert_eq!(
            RateLimitPolicy::new("p", 1, Duration::from_secs(u64::MAX)),
            Err(PolicyError::WindowTooLong(Duration::from_secs(u64::MAX)))
        );
        assert!(RateLimitPolicy::new("p", 1, Duration::from_secs(10_000_000_000_000)).is_err());
        assert!(RateLimitPolicy::new("p", 1, MAX_WINDOW + Duration::from_millis(1)).is_err());

        let longest = RateLimitPolicy::new("p", 1, MAX_WINDOW).unwrap();
        assert_eq!(longest.window_millis(), 366 * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_window_end_saturates() {
        let policy = RateLimitPolicy::new("p", 1, MAX_WINDOW).unwrap();
        let near_end = DateTime::<Utc>::MAX_UTC - TimeDelta::days(1);
        assert_eq!(policy.window_end(near_end), DateTime::<Utc>::MAX_UTC);

        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            RateLimitPolicy::login_by_address().window_end(now),
            now + TimeDelta::seconds(900)
        );
    }

    #[test]
    fn test_presets() {
        let login = RateLimitPolicy::login_by_address();
        assert_eq!(login.key_prefix(), "login-ip");
        assert_eq!(login.max_requests(), 5);
        assert_eq!(login.window(), Duration::from_millis(900_000));
    }
}
