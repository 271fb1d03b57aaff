//! Console sink: writes formatted text to stdout or stderr, with optional
//! ANSI color per level and an optional dedicated-console mode where a
//! single consumer thread owns that console's I/O.
//!
//! Grounded on the teacher's `backend.rs` console layer (`with_ansi`,
//! stderr-by-default writer) translated from a `tracing` fmt layer into a
//! plain `Sink`, since this crate's console output is not itself a
//! `tracing` subscriber.

use super::sink::{Sink, SinkCore};
use crate::level::Severity;
use crate::record::LogRecord;
use crossbeam_channel::{Receiver, Sender};
use std::io::Write;

fn ansi_color(level: Severity) -> &'static str {
    match level {
        Severity::Trace => "\x1b[90m",
        Severity::Debug => "\x1b[36m",
        Severity::Info => "\x1b[32m",
        Severity::Notice => "\x1b[34m",
        Severity::Warning => "\x1b[33m",
        Severity::Error => "\x1b[31m",
        Severity::Critical | Severity::Alert | Severity::Emergency | Severity::Fatal => "\x1b[1;31m",
    }
}

const RESET: &str = "\x1b[0m";

struct SeparateConsole {
    sender: Sender<String>,
    shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SeparateConsole {
    fn spawn(to_stderr: bool) -> Self {
        let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
        let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let shutdown_worker = shutdown.clone();
        let handle = std::thread::spawn(move || {
            while let Ok(line) = rx.recv() {
                if to_stderr {
                    let _ = writeln!(std::io::stderr(), "{}", line);
                } else {
                    let _ = writeln!(std::io::stdout(), "{}", line);
                }
                if shutdown_worker.load(std::sync::atomic::Ordering::Acquire) && rx.is_empty() {
                    break;
                }
            }
        });
        SeparateConsole { sender: tx, shutdown, handle: Some(handle) }
    }
}

impl Drop for SeparateConsole {
    fn drop(&mut self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Release);
        // Wake the consumer in case it is parked on an empty channel.
        let _ = self.sender.send(String::new());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub struct ConsoleSink {
    core: SinkCore,
    color: bool,
    stderr_threshold: Severity,
    separate: Option<SeparateConsole>,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>, color: bool) -> Self {
        ConsoleSink { core: SinkCore::new(name), color, stderr_threshold: Severity::Warning, separate: None }
    }

    pub fn with_stderr_threshold(mut self, level: Severity) -> Self {
        self.stderr_threshold = level;
        self
    }

    /// Drives this sink's output through a dedicated single-thread consumer
    /// that owns a separate console's stdio, per spec §4.4.
    pub fn with_separate_console(mut self, to_stderr: bool) -> Self {
        self.separate = Some(SeparateConsole::spawn(to_stderr));
        self
    }

    fn colorize(&self, level: Severity, text: &str) -> String {
        if self.color {
            format!("{}{}{}", ansi_color(level), text, RESET)
        } else {
            text.to_string()
        }
    }
}

impl Sink for ConsoleSink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn write_raw(&self, record: &LogRecord, formatted: &str) -> std::io::Result<usize> {
        let line = self.colorize(record.level, formatted);
        let bytes = line.len() + 1;
        if let Some(separate) = &self.separate {
            separate.sender.send(line).map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e.to_string()))?;
            return Ok(bytes);
        }
        if record.level >= self.stderr_threshold {
            writeln!(std::io::stderr(), "{}", line)?;
        } else {
            writeln!(std::io::stdout(), "{}", line)?;
        }
        Ok(bytes)
    }
}
