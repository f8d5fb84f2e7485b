//! Bounded priority queue feeding the worker pool.
//!
//! Lower priority values are served first; jobs with equal priority come
//! out in submission order, enforced with a monotonic sequence number. The
//! queue is the single synchronization point between submitters and
//! workers: producers push without blocking (a full queue is rejected) and
//! consumers block on a condvar until work or shutdown arrives.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::{PlanforgeError, Result};

// ---------------------------------------------------------------------------
// QueuedJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedJob {
    priority: i64,
    seq: u64,
    job_id: String,
}

// BinaryHeap is a max-heap; reverse both keys so the smallest (priority,
// seq) pair surfaces first.
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// JobQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    closed: bool,
}

#[derive(Debug)]
pub struct JobQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a job id. Never blocks; a full or closed queue rejects the
    /// push with [`PlanforgeError::QueueFull`].
    pub fn push(&self, priority: i64, job_id: String) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed || inner.heap.len() >= self.capacity {
            return Err(PlanforgeError::QueueFull);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(QueuedJob {
            priority,
            seq,
            job_id,
        });
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Block until a job is available or the queue is closed and drained.
    /// Returns `None` only on shutdown.
    pub fn pop(&self) -> Option<String> {
        let mut inner = self.lock();
        loop {
            if let Some(job) = inner.heap.pop() {
                return Some(job.job_id);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove and return every queued job id (discard path of shutdown).
    pub fn take_pending(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.heap.drain().map(|job| job.job_id).collect()
    }

    /// Close the queue and wake all blocked consumers. Already-queued jobs
    /// are still served before `pop` starts returning `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lowest_priority_first_fifo_within_ties() {
        let queue = JobQueue::new(16);
        queue.push(2, "low-a".into()).unwrap();
        queue.push(1, "hi-a".into()).unwrap();
        queue.push(2, "low-b".into()).unwrap();
        queue.push(1, "hi-b".into()).unwrap();
        queue.close();
        assert_eq!(queue.pop().as_deref(), Some("hi-a"));
        assert_eq!(queue.pop().as_deref(), Some("hi-b"));
        assert_eq!(queue.pop().as_deref(), Some("low-a"));
        assert_eq!(queue.pop().as_deref(), Some("low-b"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn full_queue_rejects_push() {
        let queue = JobQueue::new(2);
        queue.push(1, "a".into()).unwrap();
        queue.push(1, "b".into()).unwrap();
        let err = queue.push(1, "c".into()).unwrap_err();
        assert!(matches!(err, PlanforgeError::QueueFull));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn closed_queue_rejects_push_and_drains() {
        let queue = JobQueue::new(4);
        queue.push(1, "a".into()).unwrap();
        queue.close();
        assert!(queue.push(1, "b".into()).is_err());
        assert_eq!(queue.pop().as_deref(), Some("a"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn take_pending_empties_the_queue() {
        let queue = JobQueue::new(4);
        queue.push(1, "a".into()).unwrap();
        queue.push(1, "b".into()).unwrap();
        let mut pending = queue.take_pending();
        pending.sort();
        assert_eq!(pending, ["a", "b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn blocked_consumer_wakes_on_push() {
        let queue = Arc::new(JobQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        queue.push(1, "wake".into()).unwrap();
        assert_eq!(consumer.join().unwrap().as_deref(), Some("wake"));
    }

    #[test]
    fn blocked_consumer_wakes_on_close() {
        let queue = Arc::new(JobQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }
}
