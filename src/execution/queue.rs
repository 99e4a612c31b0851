//! Ready queue holding serialized messages

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Backing store for queued messages
///
/// Messages enter as text, so any queue able to carry strings can back
/// the scheduler.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Add a serialized message
    async fn push(&self, priority: u32, payload: String);

    /// Take the next message, waiting up to `timeout` for one to arrive
    ///
    /// Returns `None` if the queue stayed empty for the whole window.
    async fn pop(&self, timeout: Duration) -> Option<String>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory queue: lowest priority value first, FIFO among equals
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<Reverse<(u32, u64, String)>>>,
    next_seq: AtomicU64,
    notify: Notify,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    async fn try_pop(&self) -> Option<String> {
        let mut heap = self.heap.lock().await;
        heap.pop().map(|Reverse((_, _, payload))| payload)
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for PriorityQueue {
    async fn push(&self, priority: u32, payload: String) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.heap.lock().await.push(Reverse((priority, seq, payload)));
        self.notify.notify_one();
    }

    async fn pop(&self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(payload) = self.try_pop().await {
                return Some(payload);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop().await;
            }
        }
    }

    async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }
}
