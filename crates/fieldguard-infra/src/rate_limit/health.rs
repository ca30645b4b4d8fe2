//! Distributed store health latch.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Tracks whether the distributed store may be used.
///
/// Latched unhealthy after `failure_threshold` consecutive connection
/// failures. Only [`StoreHealth::record_connected`] clears the latch; nothing
/// probes the store again on its own.
#[derive(Debug)]
pub struct StoreHealth {
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    failure_threshold: u32,
}

impl StoreHealth {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Record a failed connection attempt. Returns `true` once the latch is set.
    pub fn record_connection_failure(&self) -> bool {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold {
            self.healthy.store(false, Ordering::Release);
            return true;
        }
        false
    }

    pub fn record_connected(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.healthy.store(true, Ordering::Release);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }
}
