//! File sink: writes UTF-8 text to a lazily-opened path, auto-creating
//! parent directories, with writes serialized by an internal mutex.
//!
//! Grounded on the teacher's `backend::file::make_file_appender` for the
//! "create parent dirs, open for append, fall back rather than panic"
//! idiom, trimmed down since rotation now lives in `crate::rotation`
//! rather than inside the sink itself.

use super::sink::{Sink, SinkCore};
use crate::record::LogRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

struct FileState {
    writer: Option<BufWriter<File>>,
    size: u64,
}

pub struct FileSink {
    core: SinkCore,
    path: PathBuf,
    auto_flush: bool,
    state: Mutex<FileState>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        FileSink { core: SinkCore::new(name), path: path.into(), auto_flush: true, state: Mutex::new(FileState { writer: None, size: 0 }) }
    }

    /// Disables the default auto-flush-per-write behavior, relying on the
    /// `BufWriter`'s internal buffer (and an explicit `flush()`) instead.
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.state.lock().size
    }

    pub fn flush(&self) -> std::io::Result<()> {
        let mut state = self.state.lock();
        if let Some(writer) = state.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn open(&self) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(BufWriter::new(file))
    }
}

impl Sink for FileSink {
    fn core(&self) -> &SinkCore {
        &self.core
    }

    fn write_raw(&self, _record: &LogRecord, formatted: &str) -> std::io::Result<usize> {
        let mut state = self.state.lock();
        if state.writer.is_none() {
            let metadata_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
            state.writer = Some(self.open()?);
            state.size = metadata_size;
        }
        {
            let writer = state.writer.as_mut().expect("just opened above");
            writer.write_all(formatted.as_bytes())?;
            writer.write_all(b"\n")?;
            if self.auto_flush {
                writer.flush()?;
            }
        }
        let written = formatted.len() + 1;
        state.size += written as u64;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;
    use crate::output::sink::dispatch;
    use tempfile::tempdir;

    #[test]
    fn lazily_creates_parent_directories_and_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let sink = FileSink::new("file", &path);
        let record = LogRecord::new(Severity::Info, "hello world");
        let outcome = dispatch(&sink, &record);
        assert!(outcome.is_success());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello world\n");
    }

    #[test]
    fn tracks_current_size_across_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sink = FileSink::new("file", &path);
        dispatch(&sink, &LogRecord::new(Severity::Info, "one"));
        dispatch(&sink, &LogRecord::new(Severity::Info, "two"));
        assert_eq!(sink.current_size(), "one\n".len() as u64 + "two\n".len() as u64);
    }
}
