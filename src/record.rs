//! The immutable record that flows from producers through filters, sinks,
//! and finally the write queue.

use crate::level::Severity;
use chrono::{DateTime, Utc};
use std::thread::ThreadId;

/// Where in the caller's source a record was produced, when capture is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// A single log event. Immutable once constructed; cloned freely between
/// sinks since each sink needs its own formatted view of the same event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub thread: ThreadIdent,
    pub message: String,
    pub formatted_level: Option<String>,
    pub source: Option<SourceLocation>,
}

/// A thread id that can be cloned, compared, and displayed without holding
/// onto the original `std::thread::Thread` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadIdent(u64);

impl ThreadIdent {
    pub fn current() -> Self {
        // `ThreadId` has no stable numeric accessor; hash it into a u64 so
        // records stay `Copy` and comparable without borrowing the thread.
        use std::hash::{Hash, Hasher};
        let id = std::thread::current().id();
        let mut hasher = ahash::AHasher::default();
        id.hash(&mut hasher);
        ThreadIdent(hasher.finish())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Reconstructs an opaque identity from a previously-observed
    /// `as_u64()` value, e.g. when deserializing a `ThreadFilter`.
    pub fn from_u64(id: u64) -> Self {
        ThreadIdent(id)
    }
}

impl std::fmt::Display for ThreadIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// Keep the real ThreadId reachable for callers that want it (e.g. debugging)
// without making it part of LogRecord's storage, since ThreadId is neither
// Hash nor convertible to an integer on stable Rust.
#[allow(dead_code)]
fn _assert_thread_id_type(_: ThreadId) {}

impl LogRecord {
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            thread: ThreadIdent::current(),
            message: message.into(),
            formatted_level: None,
            source: None,
        }
    }

    pub fn with_source(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source = Some(SourceLocation { file: file.into(), line });
        self
    }
}

/// A `LogRecord` tagged with its category, owned by the write queue and
/// moved (not cloned) into the writer thread.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub record: LogRecord,
    pub tag: String,
}

impl QueueItem {
    pub fn new(record: LogRecord, tag: impl Into<String>) -> Self {
        QueueItem { record, tag: tag.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_level_and_message() {
        let r = LogRecord::new(Severity::Warning, "disk nearly full");
        assert_eq!(r.level, Severity::Warning);
        assert_eq!(r.message, "disk nearly full");
        assert!(r.source.is_none());
    }

    #[test]
    fn thread_ident_stable_within_thread() {
        let a = ThreadIdent::current();
        let b = ThreadIdent::current();
        assert_eq!(a, b);
    }
}
