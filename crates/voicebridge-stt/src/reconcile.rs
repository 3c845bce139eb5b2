//! Interim/final reconciliation (spec.md §4.3.2, §9 Open Question).
//!
//! Isolated from the stage's I/O loop so the stabilization timing rule can
//! be unit-tested with synthetic `Instant`s instead of real sleeps.

use std::time::{Duration, Instant};

use crate::types::{is_discardable_interim, normalize_whitespace};

pub struct InterimReconciler {
    last_text: Option<String>,
    last_change: Instant,
    stabilize_after: Duration,
    forwarded_stable_text: Option<String>,
}

impl InterimReconciler {
    pub fn new(stabilize_after: Duration, now: Instant) -> Self {
        Self {
            last_text: None,
            last_change: now,
            stabilize_after,
            forwarded_stable_text: None,
        }
    }

    /// Feeds one interim result. Returns `Some(text)` the moment identical
    /// text has been held for `stabilize_after` without the final having
    /// arrived yet — spec.md §4.3.2's "guard against late finalization".
    pub fn observe_interim(&mut self, text: &str, now: Instant) -> Option<String> {
        if is_discardable_interim(text) {
            return None;
        }
        let normalized = normalize_whitespace(text);

        if self.last_text.as_deref() == Some(normalized.as_str()) {
            if self.forwarded_stable_text.is_none()
                && now.saturating_duration_since(self.last_change) >= self.stabilize_after
            {
                self.forwarded_stable_text = Some(normalized.clone());
                return Some(normalized);
            }
        } else {
            self.last_text = Some(normalized);
            self.last_change = now;
        }
        None
    }

    /// The text already forwarded to downstream as a stabilized interim,
    /// if any. When the real final later arrives, the stage compares it
    /// against this rather than re-emitting a second Transcript.
    pub fn already_forwarded(&self) -> Option<&str> {
        self.forwarded_stable_text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_text_forwards_after_threshold() {
        let t0 = Instant::now();
        let mut r = InterimReconciler::new(Duration::from_millis(500), t0);
        assert_eq!(r.observe_interim("hola", t0), None);
        assert_eq!(r.observe_interim("hola", t0 + Duration::from_millis(200)), None);
        assert_eq!(
            r.observe_interim("hola", t0 + Duration::from_millis(600)),
            Some("hola".to_string())
        );
    }

    #[test]
    fn changing_text_resets_the_clock() {
        let t0 = Instant::now();
        let mut r = InterimReconciler::new(Duration::from_millis(500), t0);
        r.observe_interim("hola", t0);
        r.observe_interim("hola como", t0 + Duration::from_millis(400));
        // Only 400ms since the text last changed — should not stabilize yet.
        assert_eq!(
            r.observe_interim("hola como", t0 + Duration::from_millis(700)),
            None
        );
        assert_eq!(
            r.observe_interim("hola como", t0 + Duration::from_millis(950)),
            Some("hola como".to_string())
        );
    }

    #[test]
    fn punctuation_only_interim_is_ignored() {
        let t0 = Instant::now();
        let mut r = InterimReconciler::new(Duration::from_millis(500), t0);
        assert_eq!(r.observe_interim("...", t0 + Duration::from_secs(1)), None);
        assert_eq!(r.already_forwarded(), None);
    }

    #[test]
    fn forwards_only_once() {
        let t0 = Instant::now();
        let mut r = InterimReconciler::new(Duration::from_millis(500), t0);
        r.observe_interim("hola", t0);
        assert!(r.observe_interim("hola", t0 + Duration::from_millis(600)).is_some());
        assert_eq!(
            r.observe_interim("hola", t0 + Duration::from_millis(900)),
            None
        );
    }
}
