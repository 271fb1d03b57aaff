//! The public `Logger`: the producer-facing entry point wiring together the
//! write queue, callback registry, output fan-out, rotation engine, and the
//! dedicated writer thread. Grounded on the teacher's `PyLogger` for the
//! per-level convenience wrapper surface (trace/debug/info/.../critical),
//! generalized to the ten-level `Severity` scale and built as a plain Rust
//! type rather than a `pyclass`.

use crate::callback::{Callback, CallbackRegistry, HandlerId};
use crate::compression::pool::{CompressionConfig, CompressionPool};
use crate::filter::Filter;
use crate::format::{Formatter, RawFormatter};
use crate::level::Severity;
use crate::output::{OutputManager, Sink, WriteMode};
use crate::queue::{OverflowPolicy, PushOutcome, WriteQueue};
use crate::record::{LogRecord, QueueItem};
use crate::rotation::context::RotationContext;
use crate::rotation::manager::{RotationConfig, RotationManager, RotationOutcome};
use crate::rotation::strategy::RotationStrategy;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const OVERFLOW_TAG: &str = "logring.overflow";

/// Builds a `Logger` from the pieces spec §3's ownership summary assigns it:
/// a queue policy, a rotation strategy/config, a compressor config, and a
/// formatter for the legacy single-file writer.
pub struct LoggerBuilder {
    active_path: PathBuf,
    queue_capacity: usize,
    overflow_policy: OverflowPolicy,
    report_interval: u64,
    min_level: Severity,
    rotation_strategy: Arc<dyn RotationStrategy>,
    rotation_config: RotationConfig,
    compression_config: CompressionConfig,
    compression_workers: usize,
    formatter: Box<dyn Formatter>,
    output_mode: WriteMode,
    output_async_workers: usize,
    multi_output_enabled: bool,
}

impl LoggerBuilder {
    pub fn new(active_path: impl Into<PathBuf>, rotation_strategy: Arc<dyn RotationStrategy>) -> Self {
        LoggerBuilder {
            active_path: active_path.into(),
            queue_capacity: 8192,
            overflow_policy: OverflowPolicy::Block,
            report_interval: 1000,
            min_level: Severity::Trace,
            rotation_strategy,
            rotation_config: RotationConfig::default(),
            compression_config: CompressionConfig::default(),
            compression_workers: 1,
            formatter: Box::new(RawFormatter),
            output_mode: WriteMode::Sequential,
            output_async_workers: 0,
            multi_output_enabled: false,
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn min_level(mut self, level: Severity) -> Self {
        self.min_level = level;
        self
    }

    pub fn rotation_config(mut self, config: RotationConfig) -> Self {
        self.rotation_config = config;
        self
    }

    pub fn compression_config(mut self, config: CompressionConfig) -> Self {
        self.compression_config = config;
        self
    }

    pub fn formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn output_mode(mut self, mode: WriteMode, async_workers: usize) -> Self {
        self.output_mode = mode;
        self.output_async_workers = async_workers;
        self
    }

    pub fn multi_output_enabled(mut self, enabled: bool) -> Self {
        self.multi_output_enabled = enabled;
        self
    }

    pub fn build(self) -> Arc<Logger> {
        let compressor = Arc::new(CompressionPool::new(self.compression_workers, self.compression_config));
        let rotation = Arc::new(RotationManager::new(self.rotation_strategy, self.rotation_config, compressor));
        let queue = Arc::new(WriteQueue::new(self.queue_capacity, self.overflow_policy, self.report_interval));
        let output = OutputManager::new(self.output_mode, self.output_async_workers);

        let writer = crate::writer::Writer::new(queue.clone(), rotation.clone(), self.active_path.clone(), self.formatter);
        let writer_handle = std::thread::spawn(move || writer.run());

        Arc::new(Logger {
            active_path: self.active_path,
            min_level: RwLock::new(self.min_level),
            filter: RwLock::new(None),
            callbacks: CallbackRegistry::new(),
            queue,
            output,
            multi_output_enabled: AtomicBool::new(self.multi_output_enabled),
            rotation,
            writer_handle: Mutex::new(Some(writer_handle)),
            stopped: AtomicBool::new(false),
            start_time: Instant::now(),
        })
    }
}

/// The logger producers hold. Cheap to share: every field is either atomic,
/// lock-guarded, or an `Arc` to a subsystem that manages its own locking.
pub struct Logger {
    active_path: PathBuf,
    min_level: RwLock<Severity>,
    filter: RwLock<Option<Box<dyn Filter>>>,
    callbacks: CallbackRegistry,
    queue: Arc<WriteQueue>,
    output: Arc<OutputManager>,
    multi_output_enabled: AtomicBool,
    rotation: Arc<RotationManager>,
    writer_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
    stopped: AtomicBool,
    start_time: Instant,
}

impl Logger {
    pub fn builder(active_path: impl Into<PathBuf>, rotation_strategy: Arc<dyn RotationStrategy>) -> LoggerBuilder {
        LoggerBuilder::new(active_path, rotation_strategy)
    }

    pub fn set_min_level(&self, level: Severity) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> Severity {
        *self.min_level.read()
    }

    pub fn set_filter(&self, filter: Box<dyn Filter>) {
        *self.filter.write() = Some(filter);
    }

    pub fn clear_filter(&self) {
        *self.filter.write() = None;
    }

    pub fn subscribe(&self, min_level: Severity, callback: Callback) -> HandlerId {
        self.callbacks.subscribe(min_level, callback)
    }

    pub fn unsubscribe(&self, handle: HandlerId) -> bool {
        self.callbacks.unsubscribe(handle)
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.clear();
    }

    pub fn set_multi_output_enabled(&self, enabled: bool) {
        self.multi_output_enabled.store(enabled, Ordering::Release);
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> Result<(), crate::output::OutputError> {
        self.output.add_sink(sink)
    }

    pub fn remove_sink(&self, name: &str) -> bool {
        self.output.remove_sink(name)
    }

    pub fn get_sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.output.get_sink(name)
    }

    /// The central write path (spec §4.1). Infallible: overflow and sink
    /// failures are swallowed or reflected in statistics, never returned.
    pub fn write(&self, level: Severity, tag: impl Into<String>, message: impl Into<String>) {
        if level < self.min_level() {
            return;
        }
        let mut record = LogRecord::new(level, message);

        if let Some(filter) = self.filter.read().as_ref() {
            match filter.evaluate(&record) {
                crate::filter::Verdict::Block => return,
                crate::filter::Verdict::Allow => {}
                crate::filter::Verdict::Transform(replacement) => record = replacement,
            }
        }

        self.callbacks.broadcast(&record);

        if self.multi_output_enabled.load(Ordering::Acquire) {
            self.output.write(&record);
        }

        self.enqueue(record, tag.into());
    }

    fn enqueue(&self, record: LogRecord, tag: String) {
        match self.queue.push(QueueItem::new(record, tag)) {
            PushOutcome::Enqueued => {}
            PushOutcome::EnqueuedAfterDrop { drops_so_far } => {
                if drops_so_far % self.queue.report_interval() == 0 && self.queue.try_enter_overflow_report() {
                    let overflow = LogRecord::new(Severity::Warning, format!("log overflow: {} records dropped", drops_so_far));
                    // Re-entrancy is guarded: if this push itself overflows,
                    // the nested drop does not recurse into another report.
                    let _ = self.queue.push(QueueItem::new(overflow, OVERFLOW_TAG));
                    self.queue.exit_overflow_report();
                }
            }
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.write(Severity::Trace, "default", message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.write(Severity::Debug, "default", message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.write(Severity::Info, "default", message);
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.write(Severity::Notice, "default", message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.write(Severity::Warning, "default", message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.write(Severity::Error, "default", message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.write(Severity::Critical, "default", message);
    }

    pub fn alert(&self, message: impl Into<String>) {
        self.write(Severity::Alert, "default", message);
    }

    pub fn emergency(&self, message: impl Into<String>) {
        self.write(Severity::Emergency, "default", message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.write(Severity::Fatal, "default", message);
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn current_file_size(&self) -> u64 {
        std::fs::metadata(&self.active_path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn pending_rotation_tasks(&self) -> usize {
        self.rotation.pending_async_tasks()
    }

    pub fn cancel_pending_rotation_tasks(&self) -> usize {
        self.rotation.cancel_pending_async_tasks()
    }

    /// Synchronously forces a rotation regardless of what the strategy
    /// would decide.
    pub fn force_rotation(&self) -> RotationOutcome {
        let context = self.manual_context();
        self.rotation.force_rotation(&context)
    }

    /// Submits a forced rotation through the async pool; the receiver
    /// resolves once a worker thread runs it.
    pub fn force_rotation_async(&self) -> crossbeam_channel::Receiver<RotationOutcome> {
        self.rotation.force_rotation_async(self.manual_context())
    }

    fn manual_context(&self) -> RotationContext {
        let size = self.current_file_size();
        RotationContext::new(self.active_path.clone(), size, self.start_time, self.start_time).manual_request()
    }

    /// Blocks until the queue drains and the active file is flushed, up to
    /// `timeout` (`Duration::ZERO` waits forever).
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = if timeout.is_zero() { None } else { Some(Instant::now() + timeout) };
        loop {
            if self.queue.pending() == 0 {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Shuts the logger down: stops the queue, joins the writer, stops the
    /// rotation manager with a bounded wait, and stops sink dispatch.
    /// Idempotent — safe to call more than once (e.g. once explicitly and
    /// once from `Drop`).
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.stop();
        if let Some(handle) = self.writer_handle.lock().take() {
            let _ = handle.join();
        }
        self.rotation.stop(Duration::from_secs(5));
        self.output.stop();
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::strategy::ManualStrategy;
    use std::sync::atomic::AtomicU32;
    use tempfile::tempdir;

    #[test]
    fn write_below_min_level_is_silently_dropped() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder(dir.path().join("app.log"), Arc::new(ManualStrategy)).min_level(Severity::Warning).build();
        logger.info("should not enqueue");
        assert!(logger.flush(Duration::from_secs(1)));
        assert_eq!(logger.current_file_size(), 0);
    }

    #[test]
    fn write_reaches_the_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = Logger::builder(path.clone(), Arc::new(ManualStrategy)).build();
        logger.info("hello");
        assert!(logger.flush(Duration::from_secs(2)));
        logger.shutdown();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn callbacks_fire_before_enqueue() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder(dir.path().join("app.log"), Arc::new(ManualStrategy)).build();
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        logger.subscribe(Severity::Trace, Box::new(move |_| {
            hits2.fetch_add(1, Ordering::Relaxed);
        }));
        logger.info("observed");
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn force_rotation_moves_the_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = Logger::builder(path.clone(), Arc::new(ManualStrategy)).build();
        logger.info("content before rotation");
        assert!(logger.flush(Duration::from_secs(2)));
        std::thread::sleep(Duration::from_millis(50));
        let outcome = logger.force_rotation();
        assert!(outcome.success, "{:?}", outcome.error_message);
    }
}
