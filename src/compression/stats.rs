//! Compression statistics, updated after every task and exposed to an
//! optional off-critical-path callback.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CompressionStats {
    pub total_tasks: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub total_processing_time: Duration,
    pub last_reset_time: Option<Instant>,
}

impl CompressionStats {
    pub fn average_processing_time(&self) -> Duration {
        if self.total_tasks == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / self.total_tasks as u32
        }
    }

    /// Mean of `compressed / original` across completed tasks, via the
    /// aggregate byte totals (not a per-task average of ratios).
    pub fn average_compression_ratio(&self) -> f64 {
        if self.total_original_bytes == 0 {
            0.0
        } else {
            self.total_compressed_bytes as f64 / self.total_original_bytes as f64
        }
    }

    pub fn average_space_saving_ratio(&self) -> f64 {
        1.0 - self.average_compression_ratio()
    }
}

/// The outcome of a single compression task, handed to a
/// `compress_async_with_result` callback alongside the plain success/failure
/// `compress_async` reports — the per-task counterpart to the pool-wide
/// `CompressionStats` aggregate.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub success: bool,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub duration: Duration,
}

pub type StatsCallback = Arc<dyn Fn(&CompressionStats) + Send + Sync>;

pub struct StatsTracker {
    stats: Mutex<CompressionStats>,
    callback: Mutex<Option<StatsCallback>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        StatsTracker { stats: Mutex::new(CompressionStats { last_reset_time: Some(Instant::now()), ..Default::default() }), callback: Mutex::new(None) }
    }

    pub fn set_callback(&self, callback: StatsCallback) {
        *self.callback.lock() = Some(callback);
    }

    pub fn record(&self, success: bool, original_bytes: u64, compressed_bytes: u64, elapsed: Duration) {
        let snapshot = {
            let mut stats = self.stats.lock();
            stats.total_tasks += 1;
            if success {
                stats.successful += 1;
                stats.total_original_bytes += original_bytes;
                stats.total_compressed_bytes += compressed_bytes;
            } else {
                stats.failed += 1;
            }
            stats.total_processing_time += elapsed;
            stats.clone()
        };
        // Off the critical path: the callback is invoked after the stats
        // lock is released, never while a worker is mid-task.
        if let Some(cb) = self.callback.lock().clone() {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&snapshot)));
        }
    }

    pub fn snapshot(&self) -> CompressionStats {
        self.stats.lock().clone()
    }

    pub fn reset(&self) {
        *self.stats.lock() = CompressionStats { last_reset_time: Some(Instant::now()), ..Default::default() };
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_success_and_failure_counts() {
        let tracker = StatsTracker::new();
        tracker.record(true, 1000, 400, Duration::from_millis(10));
        tracker.record(false, 0, 0, Duration::from_millis(5));
        let stats = tracker.snapshot();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.average_compression_ratio() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn callback_fires_with_current_snapshot() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let tracker = StatsTracker::new();
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = seen.clone();
        tracker.set_callback(Arc::new(move |stats| {
            seen2.store(stats.total_tasks, Ordering::Relaxed);
        }));
        tracker.record(true, 10, 5, Duration::from_millis(1));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
