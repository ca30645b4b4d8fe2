//! In-process window store - used as fallback when Redis is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use fieldguard_core::domain::{RateLimitKey, RateLimitPolicy, WindowStatus};
use fieldguard_core::ports::{Clock, RateLimitError, WindowStore};

struct WindowRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

impl WindowRecord {
    fn open(now: DateTime<Utc>, policy: &RateLimitPolicy) -> Self {
        Self {
            count: 1,
            reset_at: policy.window_end(now),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }

    fn status(&self, exceeded: bool) -> WindowStatus {
        WindowStatus {
            count: self.count,
            exceeded,
            reset_at: self.reset_at,
        }
    }
}

/// Fixed-window counters in a sharded concurrent map.
///
/// Note: Limits are per-process, not distributed across instances.
/// Expired records are treated as absent on read and physically removed by
/// [`LocalWindowStore::purge_expired`].
pub struct LocalWindowStore {
    windows: DashMap<RateLimitKey, WindowRecord>,
    clock: Arc<dyn Clock>,
}

impl LocalWindowStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Count one request. A denied call does not advance the counter.
    pub fn increment(&self, key: &RateLimitKey, policy: &RateLimitPolicy) -> WindowStatus {
        let now = self.clock.now();

        match self.windows.entry(key.clone()) {
            Entry::Vacant(slot) => {
                let record = WindowRecord::open(now, policy);
                let status = record.status(false);
                slot.insert(record);
                status
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if record.is_expired(now) {
                    *record = WindowRecord::open(now, policy);
                    return record.status(false);
                }
                if record.count >= policy.max_requests() {
                    return record.status(true);
                }
                record.count += 1;
                record.status(false)
            }
        }
    }

    pub fn remaining_for(&self, key: &RateLimitKey, policy: &RateLimitPolicy) -> u32 {
        let now = self.clock.now();
        match self.windows.get(key) {
            Some(record) if !record.is_expired(now) => {
                policy.max_requests().saturating_sub(record.count)
            }
            _ => policy.max_requests(),
        }
    }

    pub fn remove(&self, key: &RateLimitKey) {
        self.windows.remove(key);
    }

    /// Remove every record whose window has passed. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    /// Number of physically stored records, expired or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl WindowStore for LocalWindowStore {
    async fn increment_and_check(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<WindowStatus, RateLimitError> {
        Ok(self.increment(key, policy))
    }

    async fn remaining(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<u32, RateLimitError> {
        Ok(self.remaining_for(key, policy))
    }

    async fn reset(&self, key: &RateLimitKey) -> Result<(), RateLimitError> {
        self.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fieldguard_core::ports::ManualClock;
    use std::time::Duration;

    fn store() -> (Arc<ManualClock>, LocalWindowStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let store = LocalWindowStore::new(clock.clone());
        (clock, store)
    }

    fn login_policy() -> RateLimitPolicy {
        RateLimitPolicy::new("login-ip", 5, Duration::from_millis(900_000)).unwrap()
    }

    #[test]
    fn test_quota_enforced() {
        let (_clock, store) = store();
        let policy = login_policy();
        let key = policy.key_for("203.0.113.7");

        for i in 1..=5 {
            let status = store.increment(&key, &policy);
            assert!(!status.exceeded, "call {i} should be admitted");
            assert_eq!(status.count, i);
        }

        let status = store.increment(&key, &policy);
        assert!(status.exceeded);
        // Denials do not advance the counter
        assert_eq!(status.count, 5);
    }

    #[test]
    fn test_longest_window_still_denies() {
        let (_clock, store) = store();
        let policy = RateLimitPolicy::new("p", 1, fieldguard_core::domain::MAX_WINDOW).unwrap();
        let key = policy.key_for("a");

        assert!(!store.increment(&key, &policy).exceeded);
        let denied = (0..9)
            .filter(|_| store.increment(&key, &policy).exceeded)
            .count();
        assert_eq!(denied, 9);
    }

    #[test]
    fn test_window_near_end_of_time_does_not_overflow() {
        let near_end = DateTime::<Utc>::MAX_UTC - chrono::TimeDelta::days(1);
        let store = LocalWindowStore::new(Arc::new(ManualClock::new(near_end)));
        let policy = RateLimitPolicy::new("p", 1, fieldguard_core::domain::MAX_WINDOW).unwrap();
        let key = policy.key_for("a");

        let status = store.increment(&key, &policy);
        assert!(!status.exceeded);
        assert_eq!(status.reset_at, DateTime::<Utc>::MAX_UTC);
        assert!(store.increment(&key, &policy).exceeded);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let (clock, store) = store();
        let policy = login_policy();
        let key = policy.key_for("203.0.113.7");

        for _ in 0..8 {
            store.increment(&key, &policy);
        }
        assert!(store.increment(&key, &policy).exceeded);

        clock.advance(Duration::from_secs(901));

        let status = store.increment(&key, &policy);
        assert!(!status.exceeded);
        assert_eq!(status.count, 1);
    }

    #[test]
    fn test_remaining_and_reset() {
        let (_clock, store) = store();
        let policy = login_policy();
        let key = policy.key_for("198.51.100.4");

        assert_eq!(store.remaining_for(&key, &policy), 5);
        store.increment(&key, &policy);
        store.increment(&key, &policy);
        assert_eq!(store.remaining_for(&key, &policy), 3);

        store.remove(&key);
        assert_eq!(store.remaining_for(&key, &policy), 5);
    }

    #[test]
    fn test_expired_record_reads_as_absent() {
        let (clock, store) = store();
        let policy = login_policy();
        let key = policy.key_for("198.51.100.4");

        for _ in 0..5 {
            store.increment(&key, &policy);
        }
        assert_eq!(store.remaining_for(&key, &policy), 0);

        clock.advance(Duration::from_secs(901));
        assert_eq!(store.remaining_for(&key, &policy), 5);
        // Still physically present until the sweep
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let (clock, store) = store();
        let short = RateLimitPolicy::new("csp-report", 10, Duration::from_secs(60)).unwrap();
        let long = login_policy();

        store.increment(&short.key_for("a"), &short);
        store.increment(&short.key_for("b"), &short);
        store.increment(&long.key_for("a"), &long);

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_concurrent_increments_admit_exactly_quota() {
        let (_clock, store) = store();
        let policy = RateLimitPolicy::new("token", 10, Duration::from_secs(60)).unwrap();
        let key = policy.key_for("203.0.113.7");

        let admitted = std::sync::atomic::AtomicU32::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        if !store.increment(&key, &policy).exceeded {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 10);
    }

    #[tokio::test]
    async fn test_window_store_port() {
        let (_clock, store) = store();
        let policy = login_policy();
        let key = policy.key_for("203.0.113.7");

        let status = store.increment_and_check(&key, &policy).await.unwrap();
        assert!(!status.exceeded);
        assert_eq!(store.remaining(&key, &policy).await.unwrap(), 4);
        WindowStore::reset(&store, &key).await.unwrap();
        assert!(store.is_empty());
    }
}
