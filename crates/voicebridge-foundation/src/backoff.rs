//! Exponential backoff with jitter, shared by STT, Translator, and TTS
//! reconnection logic (spec.md §4.3–§4.5, SPEC_FULL.md §10.3).
//!
//! A plain iterator rather than a sleeping loop, so callers stay in control
//! of cancellation: `for delay in Backoff::new(params) { select! { ... } }`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffParams {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl BackoffParams {
    /// base 0.5s, factor 2, cap 30s, jitter ±25%, 5 attempts — the policy
    /// spec.md specifies for STT reconnection.
    pub const fn stt_default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(30),
            jitter: 0.25,
            max_attempts: 5,
        }
    }

    /// Translator retries up to 3 attempts with the same shape of backoff.
    pub const fn translator_default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(30),
            jitter: 0.25,
            max_attempts: 3,
        }
    }

    /// TTS fallback tier 1, "retry streaming subsession (3 attempts,
    /// exponential backoff as STT)" (spec.md §4.5): same shape as
    /// `stt_default`, capped to 3 attempts.
    pub const fn tts_stream_retry() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(30),
            jitter: 0.25,
            max_attempts: 3,
        }
    }
}

pub struct Backoff {
    params: BackoffParams,
    attempt: u32,
}

impl Backoff {
    pub fn new(params: BackoffParams) -> Self {
        Self { params, attempt: 0 }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.params.max_attempts
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.params.max_attempts {
            return None;
        }

        let unjittered_ms = (self.params.base.as_millis() as f64)
            * self.params.factor.powi(self.attempt as i32);
        let capped_ms = unjittered_ms.min(self.params.cap.as_millis() as f64);

        let jitter_span = capped_ms * self.params.jitter;
        let jittered_ms = rand::thread_rng().gen_range((capped_ms - jitter_span)..=(capped_ms + jitter_span));

        self.attempt += 1;
        Some(Duration::from_millis(jittered_ms.max(0.0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_max_attempts() {
        let backoff = Backoff::new(BackoffParams::stt_default());
        let delays: Vec<_> = backoff.collect();
        assert_eq!(delays.len(), 5);
    }

    #[test]
    fn delays_respect_cap_with_jitter() {
        let params = BackoffParams {
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(30),
            jitter: 0.25,
            max_attempts: 10,
        };
        for delay in Backoff::new(params) {
            assert!(delay <= Duration::from_millis(30_000 + 30_000 / 4));
        }
    }

    #[test]
    fn first_delay_is_near_base() {
        let mut backoff = Backoff::new(BackoffParams::stt_default());
        let first = backoff.next().unwrap();
        assert!(first >= Duration::from_millis(375));
        assert!(first <= Duration::from_millis(625));
    }
}
