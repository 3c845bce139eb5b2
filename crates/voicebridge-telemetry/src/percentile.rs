//! Bounded sliding-window latency reservoir (SPEC_FULL.md §10.2).
//!
//! Plain `VecDeque` plus sort-on-read rather than an external metrics crate:
//! at the pipeline's event rate (one sample per stage per utterance) a
//! streaming quantile sketch buys nothing.

use std::collections::VecDeque;
use std::time::Duration;

const DEFAULT_WINDOW: usize = 512;

pub struct PercentileTracker {
    window: VecDeque<u64>,
    capacity: usize,
}

impl Default for PercentileTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PercentileTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample.as_millis() as u64);
    }

    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.window.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(Duration::from_millis(sorted[rank.min(sorted.len() - 1)]))
    }

    pub fn p50(&self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> Option<Duration> {
        self.percentile(99.0)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_of_uniform_samples() {
        let mut tracker = PercentileTracker::new(100);
        for ms in 1..=100u64 {
            tracker.record(Duration::from_millis(ms));
        }
        assert_eq!(tracker.p50(), Some(Duration::from_millis(50)));
        assert_eq!(tracker.p99(), Some(Duration::from_millis(99)));
    }

    #[test]
    fn window_evicts_oldest() {
        let mut tracker = PercentileTracker::new(3);
        tracker.record(Duration::from_millis(10));
        tracker.record(Duration::from_millis(20));
        tracker.record(Duration::from_millis(30));
        tracker.record(Duration::from_millis(1000));
        assert_eq!(tracker.len(), 3);
        assert!(tracker.p99().unwrap() <= Duration::from_millis(1000));
        assert!(tracker.p50().unwrap() >= Duration::from_millis(20));
    }

    #[test]
    fn empty_tracker_returns_none() {
        let tracker = PercentileTracker::new(10);
        assert_eq!(tracker.p50(), None);
    }
}
