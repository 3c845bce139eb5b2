//! Root cancellation signal (spec.md §5 "Cancellation").
//!
//! Grounded on the teacher's `app::foundation::shutdown::ShutdownHandler`:
//! an `AtomicBool` flag plus a `Notify` so every stage can both poll
//! (`is_cancelled`) at a suspension point and await (`cancelled`) without
//! busy-looping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone)]
pub struct CancelSignal {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves immediately if already cancelled; otherwise waits for the
    /// next `cancel()` call. Safe to race against other branches in
    /// `tokio::select!` at every suspension point (spec.md §5b).
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        signal.cancel();
        handle.await.unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_if_already_set() {
        let signal = CancelSignal::new();
        signal.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), signal.cancelled())
            .await
            .expect("cancelled() should resolve immediately");
    }
}
