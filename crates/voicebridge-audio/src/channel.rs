//! Bounded drop-oldest channel (spec.md §5 backpressure table).
//!
//! Neither `tokio::sync::mpsc` nor `broadcast` expose a "push displaces the
//! oldest queued item" policy, so Capture→VAD and TTS→Output need a small
//! purpose-built channel rather than a block-on-full one. Shaped like the
//! teacher's ring-buffer producer/consumer split (`coldvox-audio::ring_buffer`)
//! but holding typed records instead of raw samples, and waking waiters with
//! `tokio::sync::Notify` instead of a spin-polled watchdog.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    dropped: std::sync::atomic::AtomicU64,
    closed: std::sync::atomic::AtomicBool,
}

pub fn drop_oldest_channel<T: Send + 'static>(capacity: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        capacity,
        notify: Notify::new(),
        dropped: std::sync::atomic::AtomicU64::new(0),
        closed: std::sync::atomic::AtomicBool::new(false),
    });
    (
        DropOldestSender {
            shared: shared.clone(),
        },
        DropOldestReceiver { shared },
    )
}

pub struct DropOldestSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for DropOldestSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send> DropOldestSender<T> {
    /// Pushes a record, evicting the oldest queued one if the channel is at
    /// capacity. Returns the number of records dropped so far (0 if this
    /// push did not evict).
    pub fn push(&self, item: T) -> u64 {
        use std::sync::atomic::Ordering;
        let mut dropped_this_push = 0;
        {
            let mut queue = self.shared.queue.lock();
            if queue.len() >= self.shared.capacity {
                queue.pop_front();
                dropped_this_push = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            }
            queue.push_back(item);
        }
        self.shared.notify.notify_one();
        dropped_this_push
    }

    pub fn close(&self) {
        self.shared
            .closed
            .store(true, std::sync::atomic::Ordering::Relaxed);
        self.shared.notify.notify_waiters();
    }

    pub fn total_dropped(&self) -> u64 {
        self.shared.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}

pub struct DropOldestReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> DropOldestReceiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut queue = self.shared.queue.lock();
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
                if self.shared.closed.load(std::sync::atomic::Ordering::Relaxed) {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_when_full() {
        let (tx, mut rx) = drop_oldest_channel::<i32>(2);
        tx.push(1);
        tx.push(2);
        tx.push(3);
        assert_eq!(tx.total_dropped(), 1);
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn recv_returns_none_after_close_and_drain() {
        let (tx, mut rx) = drop_oldest_channel::<i32>(4);
        tx.push(1);
        tx.close();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, None);
    }
}
