use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Duration, Instant};

/// Fixed-capacity FIFO shared between log producers and the batch writer.
///
/// `enqueue` never blocks: when the queue is full the oldest item is
/// evicted to admit the new one. The writer side waits with a timeout so
/// it can drive time-based flushes.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    capacity: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Result of an [`BoundedQueue::enqueue`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Enqueued<T> {
    Accepted,
    /// The queue was full; the oldest item was dropped.
    Evicted(T),
    /// The queue is closed; the item was discarded.
    Rejected(T),
}

impl<T> BoundedQueue<T> {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        BoundedQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn enqueue(&self, item: T) -> Enqueued<T> {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Enqueued::Rejected(item);
            }
            let evicted = if inner.items.len() >= self.capacity {
                inner.items.pop_front()
            } else {
                None
            };
            inner.items.push_back(item);
            match evicted {
                Some(old) => Enqueued::Evicted(old),
                None => Enqueued::Accepted,
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Pop the front item without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Wait until an item is available or `timeout` elapses.
    ///
    /// Returns `None` on timeout, or immediately once the queue is closed
    /// and empty.
    pub async fn dequeue_or_wait(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return self.try_dequeue();
            }
        }
    }

    /// Stop accepting items and wake any waiting consumer. Items already
    /// queued stay available to `try_dequeue`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the queued items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().items.iter().cloned().collect()
    }
}
