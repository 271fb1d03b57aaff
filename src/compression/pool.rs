//! The compression worker pool: a max-priority task queue drained by a
//! fixed-width pool of threads, each task producing a single-entry ZIP
//! archive via the `zip` crate. Grounded on `original_source/
//! LogCompressor.h`/`.cpp` for the contract (`MAX_FILE_SIZE`, bounded
//! retries opening a possibly-still-held source file, uncompressed-copy
//! fallback on codec failure) and on the `zip` crate usage in the pack's
//! `FrankSommer-64-coaly`/`saorsa-labs-fae` examples for the archive-build
//! idiom (single `ZipWriter::start_file` + `io::copy`).

use super::stats::{CompressionResult, StatsCallback, StatsTracker};
use super::task::{CompressionTask, Priority};
use parking_lot::{Condvar, Mutex};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// Files larger than this are rejected rather than compressed, a safety
    /// cap the original hard-codes at 100 MiB; SPEC_FULL.md's redesign
    /// flag asks for it to be configurable while keeping that default.
    pub max_file_size: u64,
    pub open_retries: u32,
    pub open_retry_delay: Duration,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig { max_file_size: 100 * 1024 * 1024, open_retries: 3, open_retry_delay: Duration::from_millis(50) }
    }
}

type Callback = Arc<dyn Fn(bool) + Send + Sync>;
type ResultCallback = Arc<dyn Fn(&CompressionResult) + Send + Sync>;

enum TaskCallback {
    Bool(Callback),
    Result(ResultCallback),
}

struct QueuedTask {
    task: CompressionTask,
    callback: Option<TaskCallback>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task == other.task
    }
}
impl Eq for QueuedTask {}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.task.cmp(&other.task)
    }
}

struct Inner {
    queue: BinaryHeap<QueuedTask>,
    stopped: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    active: AtomicUsize,
    stats: StatsTracker,
    config: CompressionConfig,
}

/// A cheaply-cloneable handle to a running compression worker pool.
#[derive(Clone)]
pub struct CompressionPool {
    shared: Arc<Shared>,
}

impl CompressionPool {
    pub fn new(worker_count: usize, config: CompressionConfig) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner { queue: BinaryHeap::new(), stopped: false }),
            not_empty: Condvar::new(),
            active: AtomicUsize::new(0),
            stats: StatsTracker::new(),
            config,
        });
        for _ in 0..worker_count.max(1) {
            let shared = shared.clone();
            std::thread::spawn(move || worker_loop(shared));
        }
        CompressionPool { shared }
    }

    pub fn set_stats_callback(&self, callback: StatsCallback) {
        self.shared.stats.set_callback(callback);
    }

    pub fn stats(&self) -> super::stats::CompressionStats {
        self.shared.stats.snapshot()
    }

    /// Synchronously compresses `src` into `dst`, blocking the caller.
    /// Used by the rotation transaction's compress step, which must know
    /// the outcome before deciding whether to proceed.
    pub fn compress(&self, src: &Path, dst: &Path) -> bool {
        compress_one(&self.shared.config, &self.shared.stats, src, dst, false).success
    }

    /// Queues `src` -> `dst` for background compression, reporting only
    /// success/failure to `callback`.
    pub fn compress_async(&self, src: PathBuf, dst: PathBuf, priority: Priority, callback: Option<Callback>) {
        self.submit(src, dst, priority, callback.map(TaskCallback::Bool));
    }

    /// Queues `src` -> `dst` for background compression, reporting the full
    /// per-task `CompressionResult` (byte counts and duration alongside
    /// success/failure) to `callback` instead of a plain bool.
    pub fn compress_async_with_result(&self, src: PathBuf, dst: PathBuf, priority: Priority, callback: Option<ResultCallback>) {
        self.submit(src, dst, priority, callback.map(TaskCallback::Result));
    }

    fn submit(&self, src: PathBuf, dst: PathBuf, priority: Priority, callback: Option<TaskCallback>) {
        let mut task = CompressionTask::new(src, dst, priority);
        task.delete_source_on_success = false;
        let mut guard = self.shared.inner.lock();
        guard.queue.push(QueuedTask { task, callback });
        self.shared.not_empty.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn cancel_pending(&self) -> usize {
        let mut guard = self.shared.inner.lock();
        let count = guard.queue.len();
        guard.queue.clear();
        count
    }

    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let deadline = if timeout.is_zero() { None } else { Some(Instant::now() + timeout) };
        loop {
            if self.pending() == 0 && self.active() == 0 {
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

    pub fn stop(&self) {
        let mut guard = self.shared.inner.lock();
        guard.stopped = true;
        self.shared.not_empty.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let queued = {
            let mut guard = shared.inner.lock();
            loop {
                if let Some(queued) = guard.queue.pop() {
                    break Some(queued);
                }
                if guard.stopped {
                    break None;
                }
                shared.not_empty.wait(&mut guard);
            }
        };
        let Some(queued) = queued else { break };
        shared.active.fetch_add(1, Ordering::AcqRel);
        let result = compress_one(&shared.config, &shared.stats, &queued.task.source, &queued.task.target, queued.task.delete_source_on_success);
        shared.active.fetch_sub(1, Ordering::AcqRel);
        match queued.callback {
            Some(TaskCallback::Bool(cb)) => {
                let success = result.success;
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(success)));
            }
            Some(TaskCallback::Result(cb)) => {
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&result)));
            }
            None => {}
        }
    }
}

fn compress_one(config: &CompressionConfig, stats: &StatsTracker, src: &Path, dst: &Path, delete_source: bool) -> CompressionResult {
    let start = Instant::now();
    let result = try_compress(config, src, dst);
    match result {
        Ok(original_size) => {
            let compressed_size = std::fs::metadata(dst).map(|m| m.len()).unwrap_or(0);
            let duration = start.elapsed();
            stats.record(true, original_size, compressed_size, duration);
            if delete_source {
                let _ = std::fs::remove_file(src);
            }
            CompressionResult { success: true, original_bytes: original_size, compressed_bytes: compressed_size, duration }
        }
        Err(_) => {
            // Fallback: copy uncompressed, renamed to `.log`, so the
            // archive stays available even when the codec errors.
            let fallback_path = dst.with_extension("log");
            let fallback_ok = std::fs::copy(src, &fallback_path).is_ok();
            let duration = start.elapsed();
            stats.record(false, 0, 0, duration);
            CompressionResult { success: fallback_ok, original_bytes: 0, compressed_bytes: 0, duration }
        }
    }
}

fn try_compress(config: &CompressionConfig, src: &Path, dst: &Path) -> std::io::Result<u64> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = open_with_retries(config, src)?;
    let metadata = file.metadata()?;
    if metadata.len() > config.max_file_size {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "source file exceeds max_file_size"));
    }
    let mut buffer = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut buffer)?;

    let entry_name = src.file_name().and_then(|n| n.to_str()).unwrap_or("archive.log").to_string();
    let output = File::create(dst)?;
    let mut writer = zip::ZipWriter::new(output);
    let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    writer.start_file(entry_name, options).map_err(to_io_error)?;
    writer.write_all(&buffer)?;
    writer.finish().map_err(to_io_error)?;
    Ok(metadata.len())
}

fn open_with_retries(config: &CompressionConfig, path: &Path) -> std::io::Result<File> {
    let mut attempt = 0;
    loop {
        match File::open(path) {
            Ok(file) => return Ok(file),
            Err(err) if attempt < config.open_retries => {
                attempt += 1;
                std::thread::sleep(config.open_retry_delay);
                let _ = err;
            }
            Err(err) => return Err(err),
        }
    }
}

fn to_io_error(err: zip::result::ZipError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn compress_produces_single_entry_zip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("app.log");
        std::fs::write(&src, b"some log content").unwrap();
        let dst = dir.path().join("app.zip");
        let pool = CompressionPool::new(1, CompressionConfig::default());
        assert!(pool.compress(&src, &dst));

        let file = File::open(&dst).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "app.log");
        let mut contents = String::new();
        entry.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "some log content");
    }

    #[test]
    fn oversized_file_falls_back_to_uncompressed_copy() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("app.log");
        std::fs::write(&src, b"tiny but capped").unwrap();
        let dst = dir.path().join("app.zip");
        let pool = CompressionPool::new(1, CompressionConfig { max_file_size: 1, ..CompressionConfig::default() });
        let ok = pool.compress(&src, &dst);
        assert!(ok);
        assert!(dst.with_extension("log").exists());
        assert!(!dst.exists());
    }

    #[test]
    fn async_compress_reports_via_callback() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let dir = tempdir().unwrap();
        let src = dir.path().join("app.log");
        std::fs::write(&src, b"async content").unwrap();
        let dst = dir.path().join("app.zip");
        let pool = CompressionPool::new(1, CompressionConfig::default());
        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        pool.compress_async(src, dst, Priority::High, Some(Arc::new(move |ok| {
            done2.store(ok, Ordering::Relaxed);
        })));
        assert!(pool.wait_for_completion(Duration::from_secs(2)));
        assert!(done.load(Ordering::Relaxed));
    }

    #[test]
    fn async_compress_with_result_reports_byte_counts() {
        use parking_lot::Mutex;
        let dir = tempdir().unwrap();
        let src = dir.path().join("app.log");
        std::fs::write(&src, b"async content with a result callback").unwrap();
        let dst = dir.path().join("app.zip");
        let pool = CompressionPool::new(1, CompressionConfig::default());
        let seen: Arc<Mutex<Option<CompressionResult>>> = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        pool.compress_async_with_result(
            src,
            dst,
            Priority::Normal,
            Some(Arc::new(move |result: &CompressionResult| {
                *seen2.lock() = Some(result.clone());
            })),
        );
        assert!(pool.wait_for_completion(Duration::from_secs(2)));
        let result = seen.lock().take().expect("callback should have fired");
        assert!(result.success);
        assert!(result.original_bytes > 0);
        assert!(result.compressed_bytes > 0);
    }
}
