//! Window state and the admit/deny decision handed to callers.

use chrono::{DateTime, Utc};

use super::RateLimitPolicy;

/// Which store decided a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Distributed,
    Local,
}

/// Result of one increment against a window store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatus {
    /// Requests observed in the current window.
    pub count: u32,
    pub exceeded: bool,
    /// Instant at which the window resets.
    pub reset_at: DateTime<Utc>,
}

/// Admission decision for one call against one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// Configured quota.
    pub limit: u32,
    /// Requests left in this window, 0 on denial.
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Whole seconds until `reset_at`, rounded up.
    pub retry_after_secs: u64,
    pub backend: Backend,
}

impl RateLimitDecision {
    pub fn from_status(
        status: &WindowStatus,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
        backend: Backend,
    ) -> Self {
        let limit = policy.max_requests();
        let remaining = if status.exceeded {
            0
        } else {
            limit.saturating_sub(status.count)
        };

        Self {
            limited: status.exceeded,
            limit,
            remaining,
            reset_at: status.reset_at,
            retry_after_secs: retry_after_secs(status.reset_at, now),
            backend,
        }
    }

    /// The more restrictive of two decisions: a denial wins, otherwise fewest remaining.
    pub fn tighter(self, other: Self) -> Self {
        match (self.limited, other.limited) {
            (true, _) => self,
            (false, true) => other,
            (false, false) if other.remaining < self.remaining => other,
            _ => self,
        }
    }

    /// Reset instant as Unix epoch seconds, for `X-RateLimit-Reset`.
    pub fn reset_epoch_secs(&self) -> i64 {
        self.reset_at.timestamp()
    }
}

fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy::new("login-ip", 5, Duration::from_secs(900)).unwrap()
    }

    #[test]
    fn test_admitted_decision_reports_remaining() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let status = WindowStatus {
            count: 2,
            exceeded: false,
            reset_at: now + chrono::Duration::seconds(900),
        };

        let decision = RateLimitDecision::from_status(&status, &policy(), now, Backend::Local);
        assert!(!decision.limited);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 3);
        assert_eq!(decision.reset_epoch_secs(), 1_700_000_900);
    }

    #[test]
    fn test_denied_decision_rounds_retry_after_up() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let status = WindowStatus {
            count: 5,
            exceeded: true,
            reset_at: now + chrono::Duration::milliseconds(1_001),
        };

        let decision =
            RateLimitDecision::from_status(&status, &policy(), now, Backend::Distributed);
        assert!(decision.limited);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after_secs, 2);
    }

    #[test]
    fn test_tighter_prefers_denial_then_fewest_remaining() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let reset_at = now + chrono::Duration::seconds(60);
        let status = |count, exceeded| WindowStatus {
            count,
            exceeded,
            reset_at,
        };

        let loose = RateLimitDecision::from_status(&status(1, false), &policy(), now, Backend::Local);
        let tight = RateLimitDecision::from_status(&status(4, false), &policy(), now, Backend::Local);
        let denied = RateLimitDecision::from_status(&status(5, true), &policy(), now, Backend::Local);

        assert_eq!(loose.clone().tighter(tight.clone()), tight);
        assert_eq!(tight.clone().tighter(loose.clone()), tight);
        assert_eq!(loose.tighter(denied.clone()), denied);
    }

    #[test]
    fn test_retry_after_never_negative() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(retry_after_secs(now - chrono::Duration::seconds(3), now), 0);
    }
}
