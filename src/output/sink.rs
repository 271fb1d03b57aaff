//! The `Sink` capability and the per-sink write pipeline shared by every
//! concrete output (console, file, ...), grounded on the teacher's
//! `backend::file` module for the "lazily opened, mutex-serialized write"
//! idiom and on spec §4.4's five-step per-sink write contract.

use crate::error::LogError;
use crate::filter::{Filter, Verdict};
use crate::format::Formatter;
use crate::level::Severity;
use crate::record::LogRecord;
use parking_lot::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Outcome of writing one record to one sink.
#[derive(Debug)]
pub enum WriteOutcome {
    Success { bytes: usize },
    Filtered,
    Unavailable,
    Error(LogError),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    pub total_logs: u64,
    pub successful: u64,
    pub failed: u64,
    pub filtered: u64,
    pub bytes_written: u64,
    pub total_write_time: Duration,
    pub last_write_time: Option<Instant>,
}

impl SinkStats {
    pub fn average_write_time(&self) -> Duration {
        if self.total_logs == 0 {
            Duration::ZERO
        } else {
            self.total_write_time / self.total_logs as u32
        }
    }
}

struct StatsCell(Mutex<SinkStats>);

impl StatsCell {
    fn new() -> Self {
        StatsCell(Mutex::new(SinkStats::default()))
    }

    fn record(&self, outcome: &WriteOutcome, elapsed: Duration) {
        let mut s = self.0.lock();
        s.total_logs += 1;
        s.total_write_time += elapsed;
        s.last_write_time = Some(Instant::now());
        match outcome {
            WriteOutcome::Success { bytes } => {
                s.successful += 1;
                s.bytes_written += *bytes as u64;
            }
            WriteOutcome::Filtered => s.filtered += 1,
            WriteOutcome::Unavailable | WriteOutcome::Error(_) => s.failed += 1,
        }
    }

    fn snapshot(&self) -> SinkStats {
        self.0.lock().clone()
    }

    fn reset(&self) {
        *self.0.lock() = SinkStats::default();
    }
}

/// Shared state every concrete sink embeds: name, enable flag, level gate,
/// optional filter/formatter, and statistics. Concrete sinks only need to
/// implement the actual byte-level write.
pub struct SinkCore {
    name: String,
    enabled: std::sync::atomic::AtomicBool,
    min_level: RwLock<Severity>,
    filter: RwLock<Option<Box<dyn Filter>>>,
    formatter: RwLock<Option<Box<dyn Formatter>>>,
    stats: StatsCell,
}

impl SinkCore {
    pub fn new(name: impl Into<String>) -> Self {
        SinkCore {
            name: name.into(),
            enabled: std::sync::atomic::AtomicBool::new(true),
            min_level: RwLock::new(Severity::Trace),
            filter: RwLock::new(None),
            formatter: RwLock::new(None),
            stats: StatsCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::Release);
    }

    pub fn min_level(&self) -> Severity {
        *self.min_level.read()
    }

    pub fn set_min_level(&self, level: Severity) {
        *self.min_level.write() = level;
    }

    pub fn set_filter(&self, filter: Option<Box<dyn Filter>>) {
        *self.filter.write() = filter;
    }

    pub fn set_formatter(&self, formatter: Option<Box<dyn Formatter>>) {
        *self.formatter.write() = formatter;
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// A terminal delivery endpoint for formatted records. Concrete sinks own a
/// `SinkCore` and implement `write_raw`, which runs under whatever
/// serialization the sink itself needs (an internal mutex for a file, the
/// process stdio locks for console).
pub trait Sink: Send + Sync {
    fn core(&self) -> &SinkCore;

    /// Writes the already-filtered, already-formatted text. Returns the
    /// number of bytes written.
    fn write_raw(&self, record: &LogRecord, formatted: &str) -> std::io::Result<usize>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn stats(&self) -> SinkStats {
        self.core().stats()
    }
}

/// Runs the five-step per-sink write contract from spec §4.4 against any
/// `Sink` implementation.
pub fn dispatch(sink: &dyn Sink, record: &LogRecord) -> WriteOutcome {
    let start = Instant::now();
    let outcome = dispatch_inner(sink, record);
    sink.core().stats.record(&outcome, start.elapsed());
    outcome
}

fn dispatch_inner(sink: &dyn Sink, record: &LogRecord) -> WriteOutcome {
    let core = sink.core();
    if !core.enabled() {
        return WriteOutcome::Unavailable;
    }
    if record.level < core.min_level() {
        return WriteOutcome::Filtered;
    }
    let mut record = record.clone();
    if let Some(filter) = core.filter.read().as_ref() {
        match filter.evaluate(&record) {
            Verdict::Block => return WriteOutcome::Filtered,
            Verdict::Allow => {}
            Verdict::Transform(replacement) => record = replacement,
        }
    }
    let formatted = match core.formatter.read().as_ref() {
        Some(formatter) => formatter.format(&record),
        None => record.message.clone(),
    };
    match sink.write_raw(&record, &formatted) {
        Ok(bytes) => WriteOutcome::Success { bytes },
        Err(err) => WriteOutcome::Error(LogError::from_io(err, format!("sink '{}' write failed", core.name()))),
    }
}
