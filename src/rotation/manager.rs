//! The rotation manager: orchestrates strategy evaluation, the state
//! machine, pre-checks, the transactional rotation itself, and statistics.
//! Owns a shared reference to the compressor (spec §3: "the compressor is
//! shared between the logger and the rotation engine") but never holds a
//! back-reference to the logger — the writer passes the active path in
//! explicitly on every check (spec §9).

use super::async_pool::AsyncRotationPool;
use super::context::RotationContext;
use super::error_handler::{run_with_retry, RetryPolicy};
use super::naming::{self, NameContext};
use super::precheck::{self, PrecheckInput};
use super::state_machine::{Event, StateMachine};
use super::strategy::RotationStrategy;
use super::transaction::{OperationKind, RotationOperation, RotationResult as TransactionResult, RotationTransaction};
use crate::compression::pool::CompressionPool;
use crate::error::LogError;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub success: bool,
    pub old_path: Option<PathBuf>,
    pub new_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub compression_scheduled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RotationStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub manual: u64,
    pub size_triggered: u64,
    pub time_triggered: u64,
    pub last_rotation_time: Option<Instant>,
    pub total_duration: Duration,
    pub archived_files: u64,
    pub archived_bytes: u64,
}

impl RotationStats {
    pub fn average_duration(&self) -> Duration {
        if self.total == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.total as u32
        }
    }
}

pub struct RotationConfig {
    pub archive_dir: PathBuf,
    pub name_pattern: String,
    pub compress: bool,
    pub delete_archive_after_compress: bool,
    pub threshold_bytes: u64,
    pub retry: RetryPolicy,
    pub worker_count: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            archive_dir: PathBuf::from("archive"),
            name_pattern: naming::DEFAULT_PATTERN.to_string(),
            compress: false,
            delete_archive_after_compress: true,
            threshold_bytes: 0,
            retry: RetryPolicy::default(),
            worker_count: super::async_pool::DEFAULT_WORKER_COUNT,
        }
    }
}

struct Shared {
    config: Mutex<RotationConfig>,
    stats: Mutex<RotationStats>,
    state_machine: StateMachine,
    compressor: Arc<CompressionPool>,
    next_txn_id: AtomicU64,
}

/// Coordinates one logger's rotation lifecycle. Cheap to clone (an `Arc`
/// internally) so both the writer loop and the async pool's worker
/// closures can hold a reference.
pub struct RotationManager {
    shared: Arc<Shared>,
    strategy: Arc<dyn RotationStrategy>,
    async_pool: Arc<AsyncRotationPool>,
}

impl RotationManager {
    pub fn new(strategy: Arc<dyn RotationStrategy>, config: RotationConfig, compressor: Arc<CompressionPool>) -> Self {
        let worker_count = config.worker_count;
        let shared = Arc::new(Shared {
            config: Mutex::new(config),
            stats: Mutex::new(RotationStats::default()),
            state_machine: StateMachine::new(),
            compressor,
            next_txn_id: AtomicU64::new(1),
        });
        RotationManager { shared, strategy, async_pool: AsyncRotationPool::new(worker_count) }
    }

    pub fn stats(&self) -> RotationStats {
        self.shared.stats.lock().clone()
    }

    pub fn current_state(&self) -> super::state_machine::RotationState {
        self.shared.state_machine.current()
    }

    pub fn journal(&self) -> Vec<super::state_machine::JournalEntry> {
        self.shared.state_machine.journal()
    }

    pub fn pending_async_tasks(&self) -> usize {
        self.async_pool.pending()
    }

    pub fn active_async_tasks(&self) -> usize {
        self.async_pool.active()
    }

    pub fn cancel_pending_async_tasks(&self) -> usize {
        self.async_pool.cancel_all_pending()
    }

    pub fn wait_for_all(&self, timeout: Duration) -> bool {
        self.async_pool.wait_for_all(timeout)
    }

    pub fn stop(&self, timeout: Duration) {
        self.async_pool.wait_for_all(timeout);
        self.async_pool.stop();
    }

    /// Evaluates the strategy and, if it decides to rotate, runs the full
    /// pre-check + transaction pipeline synchronously.
    pub fn check_and_rotate(&self, context: &RotationContext) -> Option<RotationOutcome> {
        let decision = self.strategy.should_rotate(context);
        if !decision.should_rotate {
            return None;
        }
        Some(self.rotate_now(context))
    }

    /// Forces a rotation regardless of what the strategy would decide,
    /// driving the same state machine path the strategy-triggered path uses.
    pub fn force_rotation(&self, context: &RotationContext) -> RotationOutcome {
        let manual_context = RotationContext {
            active_path: context.active_path.clone(),
            current_size: context.current_size,
            last_rotation: context.last_rotation,
            now: context.now,
            file_created: context.file_created,
            manual: true,
        };
        self.rotate_now(&manual_context)
    }

    /// Submits an async rotation request through the worker pool. The
    /// returned receiver resolves with the outcome once a worker runs it.
    pub fn force_rotation_async(&self, context: RotationContext) -> crossbeam_channel::Receiver<RotationOutcome> {
        let manager = self.clone_handle();
        let priority = if context.manual { 10 } else { 5 };
        let (_, rx) = self.async_pool.submit(priority, Box::new(move || manager.rotate_now(&context)));
        rx
    }

    fn clone_handle(&self) -> RotationManager {
        RotationManager { shared: self.shared.clone(), strategy: self.strategy.clone(), async_pool: self.async_pool.clone() }
    }

    fn rotate_now(&self, context: &RotationContext) -> RotationOutcome {
        let start = Instant::now();
        let sm = &self.shared.state_machine;

        if sm.fire(Event::Start).is_err() {
            return self.failure_outcome("rotation already in progress", start);
        }
        let _ = sm.fire(Event::CheckPassed);
        let _ = sm.fire(Event::PrepareDone);

        let config = self.shared.config.lock();
        let basename = context
            .active_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log")
            .to_string();
        let extension = context.active_path.extension().and_then(|s| s.to_str()).unwrap_or("log").to_string();
        let archive_name = naming::render(
            &config.name_pattern,
            &NameContext { basename: &basename, timestamp: chrono::Utc::now(), index: 0, size: context.current_size, extension: &extension },
        );
        let archive_path = config.archive_dir.join(&archive_name);
        let backup_dir = config.archive_dir.join(format!(".rotation-backup-{}", self.shared.next_txn_id.load(Ordering::Relaxed)));

        let precheck_input = PrecheckInput {
            active_path: &context.active_path,
            archive_dir: &config.archive_dir,
            target_archive_path: &archive_path,
            file_size: context.current_size,
            backup_size: 0,
            compressing: config.compress,
            threshold_bytes: config.threshold_bytes,
        };
        let checks = precheck::run_all(&precheck_input);
        if !precheck::can_rotate(&checks) {
            let _ = sm.fire(Event::PreCheckFailed);
            let _ = sm.fire(Event::Reset);
            drop(config);
            return self.failure_outcome("pre-check failed", start);
        }
        let _ = sm.fire(Event::PreCheckPassed);

        let compress = config.compress;
        let delete_after_compress = config.delete_archive_after_compress;
        let retry = config.retry;
        drop(config);

        let txn_id = self.shared.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let transaction = self.build_transaction(txn_id, &backup_dir, &context.active_path, &archive_path, compress, delete_after_compress, &retry);
        let Ok(mut transaction) = transaction else {
            let _ = sm.fire(Event::RotationFailed);
            let _ = sm.fire(Event::Reset);
            return self.failure_outcome("failed to build rotation transaction", start);
        };

        let result: TransactionResult = transaction.execute();
        if !result.success {
            let _ = sm.fire(Event::RotationFailed);
            let _ = sm.fire(Event::Reset);
            self.record_failure();
            return RotationOutcome {
                success: false,
                old_path: None,
                new_path: None,
                archive_path: None,
                duration: start.elapsed(),
                error_message: result.error_message,
                compression_scheduled: false,
            };
        }
        let _ = sm.fire(Event::RotationSuccess);
        let _ = sm.fire(if compress { Event::CompressOk } else { Event::CompressFail });
        let _ = sm.fire(Event::CleanupDone);
        let _ = sm.fire(Event::Complete);
        let _ = sm.fire(Event::Reset);
        transaction.commit();

        self.record_success(context, compress);

        RotationOutcome {
            success: true,
            old_path: Some(context.active_path.clone()),
            new_path: Some(context.active_path.clone()),
            archive_path: Some(if compress { archive_path.with_extension("zip") } else { archive_path }),
            duration: start.elapsed(),
            error_message: None,
            compression_scheduled: compress,
        }
    }

    fn build_transaction(
        &self,
        id: u64,
        backup_dir: &Path,
        active_path: &Path,
        archive_path: &Path,
        compress: bool,
        delete_after_compress: bool,
        retry: &RetryPolicy,
    ) -> std::io::Result<RotationTransaction> {
        std::fs::create_dir_all(backup_dir)?;
        let mut operations = Vec::new();

        let archive_dir = archive_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        {
            let dir = archive_dir.clone();
            operations.push(RotationOperation::new(
                OperationKind::DirectoryCreate,
                PathBuf::new(),
                dir.clone(),
                None,
                Box::new(move || std::fs::create_dir_all(&dir).map_err(|e| e.to_string())),
                Box::new(|| Ok(())),
            ));
        }

        {
            let src = active_path.to_path_buf();
            let dst = archive_path.to_path_buf();
            let backup = backup_dir.join("active.bak");
            let src_for_rollback = src.clone();
            let dst_for_rollback = dst.clone();
            let backup_for_rollback = backup.clone();
            let retry = *retry;
            operations.push(RotationOperation::new(
                OperationKind::FileMove,
                src.clone(),
                dst.clone(),
                Some(backup.clone()),
                Box::new(move || {
                    if src.exists() {
                        std::fs::copy(&src, &backup).map_err(|e| e.to_string())?;
                    }
                    run_with_retry(&retry, || std::fs::rename(&src, &dst).map_err(rename_error)).map_err(|e| e.to_string())
                }),
                Box::new(move || {
                    if !src_for_rollback.exists() {
                        if backup_for_rollback.exists() {
                            std::fs::copy(&backup_for_rollback, &src_for_rollback).map_err(|e| e.to_string())?;
                        } else if dst_for_rollback.exists() {
                            std::fs::rename(&dst_for_rollback, &src_for_rollback).map_err(|e| e.to_string())?;
                        }
                    }
                    if dst_for_rollback.exists() {
                        std::fs::remove_file(&dst_for_rollback).map_err(|e| e.to_string())?;
                    }
                    Ok(())
                }),
            ));
        }

        if compress {
            let src = archive_path.to_path_buf();
            let zip_path = archive_path.with_extension("zip");
            let compressor = self.shared.compressor.clone();
            let zip_for_rollback = zip_path.clone();
            operations.push(RotationOperation::new(
                OperationKind::Compress,
                src.clone(),
                zip_path.clone(),
                None,
                Box::new(move || {
                    let ok = compressor.compress(&src, &zip_path);
                    if ok && delete_after_compress {
                        let _ = std::fs::remove_file(&src);
                    }
                    if ok {
                        Ok(())
                    } else {
                        Err("compression failed".to_string())
                    }
                }),
                Box::new(move || {
                    let _ = std::fs::remove_file(&zip_for_rollback);
                    Ok(())
                }),
            ));
        }

        Ok(RotationTransaction::new(id, backup_dir.to_path_buf(), operations))
    }

    fn failure_outcome(&self, reason: &str, start: Instant) -> RotationOutcome {
        self.record_failure();
        RotationOutcome {
            success: false,
            old_path: None,
            new_path: None,
            archive_path: None,
            duration: start.elapsed(),
            error_message: Some(reason.to_string()),
            compression_scheduled: false,
        }
    }

    fn record_success(&self, context: &RotationContext, _compress: bool) {
        let mut stats = self.shared.stats.lock();
        stats.total += 1;
        stats.successful += 1;
        if context.manual {
            stats.manual += 1;
        }
        stats.last_rotation_time = Some(Instant::now());
        stats.archived_files += 1;
        stats.archived_bytes += context.current_size;
    }

    fn record_failure(&self) {
        let mut stats = self.shared.stats.lock();
        stats.total += 1;
        stats.failed += 1;
    }
}

fn rename_error(err: std::io::Error) -> LogError {
    LogError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::pool::CompressionPool;
    use crate::rotation::strategy::SizeStrategy;
    use tempfile::tempdir;

    fn manager(archive_dir: PathBuf, compress: bool) -> RotationManager {
        let compressor = Arc::new(CompressionPool::new(1, Default::default()));
        let config = RotationConfig { archive_dir, compress, worker_count: 1, ..RotationConfig::default() };
        RotationManager::new(Arc::new(SizeStrategy { max_bytes: 1 }), config, compressor)
    }

    #[test]
    fn successful_rotation_moves_file_to_archive() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("app.log");
        std::fs::write(&active, b"hello world").unwrap();
        let manager = manager(dir.path().join("archive"), false);
        let now = Instant::now();
        let context = RotationContext::new(active.clone(), 11, now, now);
        let outcome = manager.force_rotation(&context);
        assert!(outcome.success, "{:?}", outcome.error_message);
        assert!(!active.exists());
        assert!(outcome.archive_path.unwrap().exists());
        assert_eq!(manager.current_state(), super::super::state_machine::RotationState::Completed);
    }

    #[test]
    fn rotation_with_compression_produces_zip_and_drops_plain_archive() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("app.log");
        std::fs::write(&active, b"compress me").unwrap();
        let manager = manager(dir.path().join("archive"), true);
        let now = Instant::now();
        let context = RotationContext::new(active.clone(), 11, now, now);
        let outcome = manager.force_rotation(&context);
        assert!(outcome.success, "{:?}", outcome.error_message);
        let zip_path = outcome.archive_path.unwrap();
        assert_eq!(zip_path.extension().unwrap(), "zip");
        assert!(zip_path.exists());
    }

    #[test]
    fn check_and_rotate_is_noop_when_strategy_declines() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("app.log");
        std::fs::write(&active, b"tiny").unwrap();
        let compressor = Arc::new(CompressionPool::new(1, Default::default()));
        let config = RotationConfig { archive_dir: dir.path().join("archive"), worker_count: 1, ..RotationConfig::default() };
        let manager = RotationManager::new(Arc::new(SizeStrategy { max_bytes: 1_000_000 }), config, compressor);
        let now = Instant::now();
        let context = RotationContext::new(active, 4, now, now);
        assert!(manager.check_and_rotate(&context).is_none());
    }

    #[test]
    fn async_force_rotation_delivers_outcome() {
        let dir = tempdir().unwrap();
        let active = dir.path().join("app.log");
        std::fs::write(&active, b"hello").unwrap();
        let manager = manager(dir.path().join("archive"), false);
        let now = Instant::now();
        let context = RotationContext::new(active, 5, now, now).manual_request();
        let rx = manager.force_rotation_async(context);
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(outcome.success);
        manager.stop(Duration::from_secs(1));
    }
}
