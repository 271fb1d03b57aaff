//! Output fan-out manager: an ordered list of uniquely-named sinks, three
//! write modes (Sequential/Parallel/Async), and aggregate statistics.
//!
//! Grounded on spec §4.4 for the contract; the Parallel mode dispatches via
//! `rayon`'s data-parallel iterators (already a teacher-pack dependency
//! used elsewhere in this crate for fan-out work), and Async mode follows
//! the same condvar-guarded worker-pool shape already used by
//! `rotation::async_pool` and `compression::pool`.

use super::sink::{dispatch, Sink, WriteOutcome};
use crate::record::LogRecord;
use parking_lot::{Condvar, Mutex, RwLock};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Sequential,
    Parallel,
    Async,
}

#[derive(Debug)]
pub enum OutputError {
    DuplicateName(String),
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::DuplicateName(name) => write!(f, "a sink named '{}' is already registered", name),
        }
    }
}

impl std::error::Error for OutputError {}

#[derive(Debug, Clone, Default)]
pub struct ManagerStats {
    pub total_writes: u64,
    pub successful: u64,
    pub failed: u64,
    pub active_outputs: usize,
    pub queued_items: usize,
}

struct AsyncQueue {
    records: Mutex<std::collections::VecDeque<LogRecord>>,
    not_empty: Condvar,
    stopped: AtomicBool,
    len: AtomicUsize,
}

pub struct OutputManager {
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    mode: RwLock<WriteMode>,
    fail_fast: AtomicBool,
    totals: Mutex<(u64, u64, u64)>, // (total_writes, successful, failed)
    async_queue: Option<AsyncQueue>,
}

impl OutputManager {
    /// Builds a manager in `mode`. When `mode` is `Async`, spawns
    /// `async_workers.max(1)` detached dispatcher threads sharing this
    /// manager; otherwise no background threads are created.
    pub fn new(mode: WriteMode, async_workers: usize) -> Arc<Self> {
        let async_queue = matches!(mode, WriteMode::Async).then(|| AsyncQueue {
            records: Mutex::new(std::collections::VecDeque::new()),
            not_empty: Condvar::new(),
            stopped: AtomicBool::new(false),
            len: AtomicUsize::new(0),
        });
        let manager = Arc::new(OutputManager {
            sinks: RwLock::new(Vec::new()),
            mode: RwLock::new(mode),
            fail_fast: AtomicBool::new(false),
            totals: Mutex::new((0, 0, 0)),
            async_queue,
        });
        if manager.async_queue.is_some() {
            for _ in 0..async_workers.max(1) {
                let manager = manager.clone();
                std::thread::spawn(move || manager.async_worker_loop());
            }
        }
        manager
    }

    pub fn set_fail_fast(&self, fail_fast: bool) {
        self.fail_fast.store(fail_fast, Ordering::Release);
    }

    pub fn set_mode(&self, mode: WriteMode) {
        *self.mode.write() = mode;
    }

    pub fn mode(&self) -> WriteMode {
        *self.mode.read()
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> Result<(), OutputError> {
        let mut sinks = self.sinks.write();
        if sinks.iter().any(|s| s.name() == sink.name()) {
            return Err(OutputError::DuplicateName(sink.name().to_string()));
        }
        sinks.push(sink);
        Ok(())
    }

    pub fn remove_sink(&self, name: &str) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|s| s.name() != name);
        sinks.len() != before
    }

    pub fn get_sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.sinks.read().iter().find(|s| s.name() == name).cloned()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.read().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn clear(&self) {
        self.sinks.write().clear();
    }

    /// Dispatches `record` to every sink according to the configured mode.
    pub fn write(&self, record: &LogRecord) {
        match self.mode() {
            WriteMode::Sequential => self.dispatch_sequential(record),
            WriteMode::Parallel => self.dispatch_parallel(record),
            WriteMode::Async => self.enqueue_async(record.clone()),
        }
    }

    fn dispatch_sequential(&self, record: &LogRecord) {
        let sinks = self.sinks.read();
        let fail_fast = self.fail_fast.load(Ordering::Acquire);
        for sink in sinks.iter() {
            let outcome = dispatch(sink.as_ref(), record);
            let stop = matches!(outcome, WriteOutcome::Error(_)) && fail_fast;
            self.record_outcome(&outcome);
            if stop {
                break;
            }
        }
    }

    fn dispatch_parallel(&self, record: &LogRecord) {
        let sinks = self.sinks.read();
        let outcomes: Vec<WriteOutcome> = sinks.par_iter().map(|sink| dispatch(sink.as_ref(), record)).collect();
        for outcome in &outcomes {
            self.record_outcome(outcome);
        }
    }

    fn enqueue_async(&self, record: LogRecord) {
        let queue = self.async_queue.as_ref().expect("Async mode requires an async_queue");
        let mut records = queue.records.lock();
        records.push_back(record);
        queue.len.fetch_add(1, Ordering::Release);
        queue.not_empty.notify_one();
    }

    fn async_worker_loop(self: Arc<Self>) {
        let queue = self.async_queue.as_ref().expect("worker only runs when async_queue exists");
        loop {
            let record = {
                let mut records = queue.records.lock();
                loop {
                    if let Some(record) = records.pop_front() {
                        queue.len.fetch_sub(1, Ordering::Release);
                        break Some(record);
                    }
                    if queue.stopped.load(Ordering::Acquire) {
                        break None;
                    }
                    queue.not_empty.wait(&mut records);
                }
            };
            let Some(record) = record else { break };
            self.dispatch_sequential(&record);
        }
    }

    fn record_outcome(&self, outcome: &WriteOutcome) {
        let mut totals = self.totals.lock();
        totals.0 += 1;
        if outcome.is_success() {
            totals.1 += 1;
        } else if matches!(outcome, WriteOutcome::Error(_) | WriteOutcome::Unavailable) {
            totals.2 += 1;
        }
    }

    pub fn stats(&self) -> ManagerStats {
        let totals = *self.totals.lock();
        let sinks = self.sinks.read();
        ManagerStats {
            total_writes: totals.0,
            successful: totals.1,
            failed: totals.2,
            active_outputs: sinks.iter().filter(|s| s.core().enabled()).count(),
            queued_items: self.async_queue.as_ref().map(|q| q.len.load(Ordering::Acquire)).unwrap_or(0),
        }
    }

    /// Stops the async dispatcher threads (no-op outside `Async` mode).
    pub fn stop(&self) {
        if let Some(queue) = &self.async_queue {
            queue.stopped.store(true, Ordering::Release);
            queue.not_empty.notify_all();
        }
    }

    pub fn wait_for_async_drain(&self, timeout: Duration) -> bool {
        let Some(queue) = &self.async_queue else { return true };
        let deadline = if timeout.is_zero() { None } else { Some(std::time::Instant::now() + timeout) };
        loop {
            if queue.len.load(Ordering::Acquire) == 0 {
                return true;
            }
            if let Some(deadline) = deadline {
                if std::time::Instant::now() >= deadline {
                    return false;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::output::file::FileSink;
    use tempfile::tempdir;

    #[test]
    fn rejects_duplicate_sink_names() {
        let manager = OutputManager::new(WriteMode::Sequential, 0);
        let dir = tempdir().unwrap();
        let a = Arc::new(FileSink::new("primary", dir.path().join("a.log")));
        let b = Arc::new(FileSink::new("primary", dir.path().join("b.log")));
        assert!(manager.add_sink(a).is_ok());
        assert!(manager.add_sink(b).is_err());
    }

    #[test]
    fn sequential_mode_writes_to_all_sinks() {
        let manager = OutputManager::new(WriteMode::Sequential, 0);
        let dir = tempdir().unwrap();
        let a = Arc::new(FileSink::new("a", dir.path().join("a.log")));
        let b = Arc::new(FileSink::new("b", dir.path().join("b.log")));
        manager.add_sink(a).unwrap();
        manager.add_sink(b).unwrap();
        manager.write(&LogRecord::new(Severity::Info, "hi"));
        let stats = manager.stats();
        assert_eq!(stats.total_writes, 2);
        assert_eq!(stats.successful, 2);
    }

    #[test]
    fn parallel_mode_writes_to_all_sinks() {
        let manager = OutputManager::new(WriteMode::Parallel, 0);
        let dir = tempdir().unwrap();
        let a = Arc::new(FileSink::new("a", dir.path().join("a.log")));
        let b = Arc::new(FileSink::new("b", dir.path().join("b.log")));
        manager.add_sink(a).unwrap();
        manager.add_sink(b).unwrap();
        manager.write(&LogRecord::new(Severity::Info, "hi"));
        assert_eq!(manager.stats().successful, 2);
    }

    #[test]
    fn async_mode_eventually_drains_queue() {
        let manager = OutputManager::new(WriteMode::Async, 1);
        let dir = tempdir().unwrap();
        let sink = Arc::new(FileSink::new("a", dir.path().join("a.log")));
        manager.add_sink(sink).unwrap();
        manager.write(&LogRecord::new(Severity::Info, "hi"));
        assert!(manager.wait_for_async_drain(Duration::from_secs(2)));
        manager.stop();
        assert_eq!(manager.stats().successful, 1);
    }
}
