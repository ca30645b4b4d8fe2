//! Multi-key limiting: one request counted by source address and by claimed identity.

use std::sync::Arc;

use fieldguard_core::domain::{RateLimitDecision, RateLimitPolicy, normalize_identity};
use fieldguard_core::ports::RateLimiter;

use super::config::PolicySet;

/// Address quota and identity quota applied to the same logical request.
///
/// Any exceeded quota denies. The address is checked first since it is known
/// before the body is parsed; the identity is only counted once the address
/// admits.
#[derive(Clone)]
pub struct CompositePolicy {
    limiter: Arc<dyn RateLimiter>,
    address: RateLimitPolicy,
    identity: RateLimitPolicy,
}

impl CompositePolicy {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        address: RateLimitPolicy,
        identity: RateLimitPolicy,
    ) -> Self {
        Self {
            limiter,
            address,
            identity,
        }
    }

    /// Login protection: by source address, then by account email.
    pub fn login(limiter: Arc<dyn RateLimiter>, policies: &PolicySet) -> Self {
        Self::new(
            limiter,
            policies.login_by_address.clone(),
            policies.login_by_identity.clone(),
        )
    }

    pub fn address_policy(&self) -> &RateLimitPolicy {
        &self.address
    }

    pub fn identity_policy(&self) -> &RateLimitPolicy {
        &self.identity
    }

    pub async fn check_address(&self, address: &str) -> RateLimitDecision {
        self.limiter.check(address, &self.address).await
    }

    /// Count a claimed identity. The value is trimmed and case-folded first.
    pub async fn check_identity(&self, identity: &str) -> RateLimitDecision {
        self.limiter
            .check(&normalize_identity(identity), &self.identity)
            .await
    }

    /// Evaluate both dimensions.
    ///
    /// Returns the binding denial, or when everything admits, the most
    /// restrictive admitted decision.
    pub async fn check(&self, address: &str, identity: &str) -> RateLimitDecision {
        let by_address = self.check_address(address).await;
        if by_address.limited {
            return by_address;
        }

        let by_identity = self.check_identity(identity).await;
        by_address.tighter(by_identity)
    }

    /// Clear the identity window, e.g. after a successful login.
    pub async fn reset_identity(&self, identity: &str) {
        self.limiter
            .reset(&normalize_identity(identity), &self.identity)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiterContext;
    use chrono::{TimeZone, Utc};
    use fieldguard_core::ports::ManualClock;
    use std::time::Duration;

    fn composite() -> (Arc<RateLimiterContext>, CompositePolicy) {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let limiter = Arc::new(RateLimiterContext::local(clock));
        let policy = CompositePolicy::new(
            limiter.clone(),
            RateLimitPolicy::new("login-ip", 5, Duration::from_secs(900)).unwrap(),
            RateLimitPolicy::new("login-email", 8, Duration::from_secs(900)).unwrap(),
        );
        (limiter, policy)
    }

    #[tokio::test]
    async fn test_address_quota_denies_every_identity() {
        let (_limiter, policy) = composite();

        for i in 0..5 {
            let decision = policy
                .check("203.0.113.7", &format!("farmer{i}@example.com"))
                .await;
            assert!(!decision.limited);
        }

        let denied = policy.check("203.0.113.7", "someone-new@example.com").await;
        assert!(denied.limited);
        assert_eq!(denied.limit, 5);
    }

    #[tokio::test]
    async fn test_identity_quota_spans_addresses() {
        let (_limiter, policy) = composite();

        // Eight distinct addresses, one identity
        for i in 0..8 {
            let decision = policy
                .check(&format!("198.51.100.{i}"), "farmer@example.com")
                .await;
            assert!(!decision.limited, "attempt {i}");
        }

        let denied = policy.check("198.51.100.200", "farmer@example.com").await;
        assert!(denied.limited);
        assert_eq!(denied.limit, 8);
        assert_eq!(denied.retry_after_secs, 900);

        // Another identity from a fresh address is unaffected
        assert!(!policy.check("198.51.100.201", "other@example.com").await.limited);
    }

    #[tokio::test]
    async fn test_exhausted_address_leaves_other_addresses_admitted() {
        let (_limiter, policy) = composite();

        for _ in 0..6 {
            policy.check("203.0.113.7", "farmer@example.com").await;
        }
        assert!(policy.check("203.0.113.7", "farmer@example.com").await.limited);

        // Same identity from a different address is admitted until its own quota runs out
        assert!(!policy.check("203.0.113.8", "farmer@example.com").await.limited);
    }

    #[tokio::test]
    async fn test_identity_normalization_shares_counter() {
        let (limiter, policy) = composite();

        policy.check_identity("  Farmer@Example.COM ").await;
        policy.check_identity("farmer@example.com").await;

        let remaining = limiter
            .remaining_requests("farmer@example.com", policy.identity_policy())
            .await;
        assert_eq!(remaining, 6);
    }

    #[tokio::test]
    async fn test_denied_address_does_not_count_identity() {
        let (limiter, policy) = composite();

        for _ in 0..5 {
            policy.check_address("203.0.113.7").await;
        }
        assert!(policy.check("203.0.113.7", "farmer@example.com").await.limited);

        let remaining = limiter
            .remaining_requests("farmer@example.com", policy.identity_policy())
            .await;
        assert_eq!(remaining, 8);
    }

    #[tokio::test]
    async fn test_admitted_reports_most_restrictive() {
        let (_limiter, policy) = composite();

        let decision = policy.check("203.0.113.7", "farmer@example.com").await;
        // Address: 4 of 5 left; identity: 7 of 8 left
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.limit, 5);
    }

    #[tokio::test]
    async fn test_reset_identity() {
        let (limiter, policy) = composite();

        for _ in 0..3 {
            policy.check_identity("Farmer@Example.com").await;
        }
        policy.reset_identity("farmer@example.com ").await;

        let remaining = limiter
            .remaining_requests("farmer@example.com", policy.identity_policy())
            .await;
        assert_eq!(remaining, 8);
    }
}
