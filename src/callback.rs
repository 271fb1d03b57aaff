//! Observability hook: a registry of closures that get a synchronous,
//! caller-thread preview of every record that passes the level gate,
//! before it reaches the output manager or the write queue.

use crate::level::Severity;
use crate::record::LogRecord;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type HandlerId = usize;
pub type Callback = Box<dyn Fn(&LogRecord) + Send + Sync>;

struct Subscription {
    handle: HandlerId,
    callback: Callback,
    min_level: Severity,
}

/// Thread-safe registry of subscribed callbacks, keyed by a monotonic
/// handle so a caller can unsubscribe precisely the closure it registered.
#[derive(Default)]
pub struct CallbackRegistry {
    subscriptions: Mutex<Vec<Subscription>>,
    next_handle: AtomicUsize,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry { subscriptions: Mutex::new(Vec::new()), next_handle: AtomicUsize::new(1) }
    }

    pub fn subscribe(&self, min_level: Severity, callback: Callback) -> HandlerId {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.lock().push(Subscription { handle, callback, min_level });
        handle
    }

    /// Removes the subscription with `handle`. Once this returns, no
    /// in-progress or future `broadcast` call will invoke that callback
    /// for a record whose enqueue began after this call returns — the
    /// registry lock serializes `broadcast` against `unsubscribe`, so a
    /// `broadcast` already holding the lock finishes with the old list,
    /// and every later `broadcast` acquires the lock after the removal.
    pub fn unsubscribe(&self, handle: HandlerId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.handle != handle);
        subs.len() != before
    }

    pub fn clear(&self) {
        self.subscriptions.lock().clear();
    }

    /// Invokes every callback whose `min_level <= record.level`, on the
    /// calling thread, swallowing panics so one bad callback can't poison
    /// a producer's logging call.
    pub fn broadcast(&self, record: &LogRecord) {
        let subs = self.subscriptions.lock();
        for sub in subs.iter() {
            if record.level >= sub.min_level {
                let callback = &sub.callback;
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(record);
                }));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convenience alias used by the rotation/compression subsystems, which
/// broadcast their own completion events to a single optional listener
/// rather than a full registry.
pub type SharedCallback<T> = Option<Arc<dyn Fn(&T) + Send + Sync>>;

pub fn fire<T>(callback: &SharedCallback<T>, value: &T) {
    if let Some(cb) = callback {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn broadcast_respects_min_level() {
        let reg = CallbackRegistry::new();
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        reg.subscribe(Severity::Warning, Box::new(move |_| {
            hits2.fetch_add(1, Ordering::Relaxed);
        }));

        reg.broadcast(&LogRecord::new(Severity::Info, "x"));
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        reg.broadcast(&LogRecord::new(Severity::Error, "y"));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unsubscribe_stops_future_invocations() {
        let reg = CallbackRegistry::new();
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        let handle = reg.subscribe(Severity::Trace, Box::new(move |_| {
            hits2.fetch_add(1, Ordering::Relaxed);
        }));
        reg.broadcast(&LogRecord::new(Severity::Info, "x"));
        assert!(reg.unsubscribe(handle));
        reg.broadcast(&LogRecord::new(Severity::Info, "y"));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(!reg.unsubscribe(handle));
    }

    #[test]
    fn panicking_callback_does_not_block_others() {
        let reg = CallbackRegistry::new();
        reg.subscribe(Severity::Trace, Box::new(|_| panic!("boom")));
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        reg.subscribe(Severity::Trace, Box::new(move |_| {
            hits2.fetch_add(1, Ordering::Relaxed);
        }));
        reg.broadcast(&LogRecord::new(Severity::Info, "x"));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
