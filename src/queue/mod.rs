//! The bounded producer/consumer queue that feeds the writer thread.
//!
//! `crossbeam_channel`'s bounded channel would give us the `Block` policy
//! for free, but it can't implement `DropOldest` (you cannot peek-and-pop
//! the channel's head without racing the writer that's also draining it),
//! and the spec needs both policies behind one type with live
//! `pending()`/`dropped()` counters. So the queue is a `parking_lot`
//! `Mutex<VecDeque<QueueItem>>` plus two condition variables, matching the
//! lock-based style the teacher crate uses throughout `state.rs`.

use crate::record::QueueItem;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Behavior when `write()` is called against a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// The producer suspends until capacity frees. No message is ever
    /// dropped; FIFO fairness across producers is not guaranteed.
    Block,
    /// The oldest queued item is discarded to make room for the new one.
    /// `dropped()` increments atomically on every discard.
    DropOldest,
}

struct Inner {
    items: std::collections::VecDeque<QueueItem>,
    stopped: bool,
}

/// A bounded FIFO of at most `capacity` `QueueItem`s.
///
/// Items enqueued by the same thread retain their relative order; ordering
/// across threads is unspecified (enforced by the caller's own lock
/// acquisition order, not by this type).
pub struct WriteQueue {
    capacity: usize,
    policy: OverflowPolicy,
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    dropped: AtomicU64,
    report_interval: u64,
    /// Guards against the synthetic overflow record re-entering `push` and
    /// recursively triggering another overflow report while it is itself
    /// being enqueued.
    reporting_overflow: std::sync::atomic::AtomicBool,
}

/// Outcome of a single `push` call, used by the logger to decide whether to
/// synthesize an overflow-warning record.
pub enum PushOutcome {
    Enqueued,
    /// An item was dropped to make room. Carries the drop count observed
    /// immediately after this push, so the caller can decide whether this
    /// drop lands on a `report_interval` boundary.
    EnqueuedAfterDrop { drops_so_far: u64 },
}

impl WriteQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy, report_interval: u64) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        WriteQueue {
            capacity,
            policy,
            inner: Mutex::new(Inner { items: std::collections::VecDeque::with_capacity(capacity), stopped: false }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            dropped: AtomicU64::new(0),
            report_interval: report_interval.max(1),
            reporting_overflow: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Enqueues `item`, applying the configured overflow policy if the
    /// queue is already at capacity.
    pub fn push(&self, item: QueueItem) -> PushOutcome {
        let mut guard = self.inner.lock();
        match self.policy {
            OverflowPolicy::Block => {
                while guard.items.len() >= self.capacity && !guard.stopped {
                    self.not_full.wait(&mut guard);
                }
                guard.items.push_back(item);
                self.not_empty.notify_one();
                PushOutcome::Enqueued
            }
            OverflowPolicy::DropOldest => {
                if guard.items.len() >= self.capacity {
                    guard.items.pop_front();
                    let drops_so_far = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    guard.items.push_back(item);
                    self.not_empty.notify_one();
                    PushOutcome::EnqueuedAfterDrop { drops_so_far }
                } else {
                    guard.items.push_back(item);
                    self.not_empty.notify_one();
                    PushOutcome::Enqueued
                }
            }
        }
    }

    /// Blocks until an item is available or the queue is stopped, then
    /// pops it. Returns `None` only once stopped and drained.
    pub fn pop_wait(&self) -> Option<QueueItem> {
        let mut guard = self.inner.lock();
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.stopped {
                return None;
            }
            self.not_empty.wait(&mut guard);
        }
    }

    /// Pops with a timeout, used by workers that also need to observe a
    /// stop flag promptly without an unbounded wait.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueueItem> {
        let mut guard = self.inner.lock();
        if let Some(item) = guard.items.pop_front() {
            self.not_full.notify_one();
            return Some(item);
        }
        if guard.stopped {
            return None;
        }
        let result = self.not_empty.wait_for(&mut guard, timeout);
        if result.timed_out() {
            return None;
        }
        let item = guard.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn stop(&self) {
        let mut guard = self.inner.lock();
        guard.stopped = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn report_interval(&self) -> u64 {
        self.report_interval
    }

    /// True if the synthetic-overflow re-entrancy guard is already held by
    /// another in-flight overflow report.
    pub fn try_enter_overflow_report(&self) -> bool {
        self.reporting_overflow
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn exit_overflow_report(&self) {
        self.reporting_overflow.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::record::LogRecord;
    use std::sync::Arc;

    fn item(msg: &str) -> QueueItem {
        QueueItem::new(LogRecord::new(Severity::Info, msg), "default")
    }

    #[test]
    fn drop_oldest_keeps_newest_and_counts_drops() {
        let q = WriteQueue::new(4, OverflowPolicy::DropOldest, 2);
        for c in ["A", "B", "C", "D", "E", "F"] {
            q.push(item(c));
        }
        assert_eq!(q.dropped(), 2);
        let mut remaining = Vec::new();
        while let Some(i) = q.pop_timeout(Duration::from_millis(1)) {
            remaining.push(i.record.message);
        }
        assert_eq!(remaining, vec!["C", "D", "E", "F"]);
    }

    #[test]
    fn block_policy_never_drops() {
        let q = Arc::new(WriteQueue::new(2, OverflowPolicy::Block, 10));
        q.push(item("A"));
        q.push(item("B"));

        let q2 = q.clone();
        let handle = std::thread::spawn(move || {
            q2.push(item("C"));
        });

        // give the blocked producer a moment to actually be waiting
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pending(), 2);
        let popped = q.pop_wait().unwrap();
        assert_eq!(popped.record.message, "A");
        handle.join().unwrap();
        assert_eq!(q.dropped(), 0);
        assert_eq!(q.pending(), 2);
    }

    #[test]
    fn same_thread_order_preserved() {
        let q = WriteQueue::new(10, OverflowPolicy::Block, 10);
        for c in ["A", "B", "C"] {
            q.push(item(c));
        }
        let mut out = Vec::new();
        while let Some(i) = q.pop_timeout(Duration::from_millis(1)) {
            out.push(i.record.message);
        }
        assert_eq!(out, vec!["A", "B", "C"]);
    }

    #[test]
    fn stop_wakes_waiting_consumer() {
        let q = Arc::new(WriteQueue::new(4, OverflowPolicy::Block, 10));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.pop_wait());
        std::thread::sleep(Duration::from_millis(20));
        q.stop();
        assert!(handle.join().unwrap().is_none());
    }
}
