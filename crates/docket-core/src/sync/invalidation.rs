//! Coalescing refetch trigger.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Requests for a full document refetch.
///
/// Any number of requests made before the consumer wakes collapse into one
/// refetch.
#[derive(Debug, Default)]
pub struct InvalidationQueue {
    pending: AtomicUsize,
    notify: Notify,
}

impl InvalidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Take every pending request, returning how many there were.
    pub fn take(&self) -> usize {
        self.pending.swap(0, Ordering::SeqCst)
    }

    /// Wait until at least one request is pending, then take them all.
    ///
    /// Cancel-safe: dropping the future loses no requests.
    pub async fn wait(&self) -> usize {
        loop {
            let pending = self.take();
            if pending > 0 {
                return pending;
            }
            self.notify.notified().await;
        }
    }
}
