//! Clock abstraction for origin timestamps and deterministic tests.
//!
//! Every record in the pipeline carries an origin timestamp taken from a
//! process-scoped monotonic source, never wall clock (spec.md §3). Tests that
//! exercise timeout and backoff logic need to advance time without sleeping;
//! `TestClock` provides that without coupling stage code to a concrete type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source used throughout the pipeline for origin timestamps and deadlines.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests. Holds an offset from a fixed epoch rather
/// than a mutable `Instant` so it stays `Send + Sync` without interior
/// `Mutex` poisoning concerns on panic.
pub struct TestClock {
    epoch: Instant,
    offset_ms: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn real_clock() -> SharedClock {
    Arc::new(RealClock)
}

pub fn test_clock() -> Arc<TestClock> {
    Arc::new(TestClock::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(250));
        let t1 = clock.now();
        assert_eq!(t1 - t0, Duration::from_millis(250));
    }
}
