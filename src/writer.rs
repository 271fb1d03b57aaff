//! The dedicated writer thread (spec §4.1): the single consumer of the
//! bounded write queue. Owns the active file handle, runs the rotation
//! check between pops (without holding the queue lock), and writes each
//! formatted record.

use crate::format::Formatter;
use crate::queue::WriteQueue;
use crate::record::QueueItem;
use crate::rotation::context::RotationContext;
use crate::rotation::manager::RotationManager;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

struct OpenFile {
    file: File,
    size: u64,
    created: Instant,
}

/// Runs on its own thread for the lifetime of a `Logger`. Constructed once,
/// consumed by `run()`.
pub struct Writer {
    queue: Arc<WriteQueue>,
    rotation: Arc<RotationManager>,
    active_path: PathBuf,
    formatter: Box<dyn Formatter>,
}

impl Writer {
    pub fn new(queue: Arc<WriteQueue>, rotation: Arc<RotationManager>, active_path: PathBuf, formatter: Box<dyn Formatter>) -> Self {
        Writer { queue, rotation, active_path, formatter }
    }

    /// Drains the queue until it reports stopped-and-empty. Meant to be the
    /// body of the writer thread; consumes `self` since a writer never runs
    /// twice.
    pub fn run(self) {
        let span = tracing::info_span!("writer_loop", path = %self.active_path.display());
        let _enter = span.enter();
        let mut open: Option<OpenFile> = None;
        let mut last_rotation = Instant::now();

        loop {
            let Some(item) = self.queue.pop_wait() else { break };

            // The rotation check runs after the pop releases the queue
            // lock: a slow pre-check or transaction must never stall
            // producers waiting to enqueue.
            let context = RotationContext::new(
                self.active_path.clone(),
                open.as_ref().map(|f| f.size).unwrap_or(0),
                last_rotation,
                open.as_ref().map(|f| f.created).unwrap_or(last_rotation),
            );
            if let Some(outcome) = self.rotation.check_and_rotate(&context) {
                if outcome.success {
                    // The active path was just renamed out from under us;
                    // the next write reopens a fresh file there.
                    open = None;
                    last_rotation = Instant::now();
                } else {
                    tracing::warn!(error = ?outcome.error_message, "rotation attempt failed");
                }
            }

            self.write_item(&mut open, item);
        }

        if let Some(mut open) = open {
            let _ = open.file.flush();
        }
        tracing::debug!("writer loop exiting");
    }

    fn write_item(&self, open: &mut Option<OpenFile>, item: QueueItem) {
        if open.is_none() {
            match self.open_active_file() {
                Ok(f) => *open = Some(f),
                Err(err) => {
                    tracing::error!(%err, "failed to open active log file");
                    return;
                }
            }
        }
        let Some(file) = open.as_mut() else { return };
        let formatted = self.formatter.format(&item.record);
        if let Err(err) = writeln!(file.file, "{}", formatted) {
            tracing::error!(%err, "write to active log file failed");
            return;
        }
        let _ = file.file.flush();
        file.size += formatted.len() as u64 + 1;
    }

    fn open_active_file(&self) -> std::io::Result<OpenFile> {
        if let Some(parent) = self.active_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.active_path)?;
        let size = file.metadata()?.len();
        Ok(OpenFile { file, size, created: Instant::now() })
    }
}
