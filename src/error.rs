//! Crate-wide error taxonomy.
//!
//! Producer-facing logging (`Logger::write` and friends) is infallible by
//! design (see spec §7): it drops or blocks per the queue's overflow
//! policy but never returns an error. Everything behind that boundary —
//! rotation, compression, sink I/O, config loading — reports failure
//! through `LogError` so callers and the rotation/compression machinery
//! can classify and react to it uniformly.

use std::fmt;
use std::io;

/// Severity bucket derived from an error's `ErrorCategory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Exhaustive classification of platform/operational failures encountered
/// by the rotation and compression subsystems. Anything that does not map
/// to a specific class becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FileSystem,
    Permissions,
    DiskSpace,
    FileNotFound,
    FileLocked,
    NetworkError,
    CompressionError,
    ConfigurationError,
    ResourceExhausted,
    Timeout,
    UserCancelled,
    SystemError,
    Unknown,
}

impl ErrorCategory {
    /// Derives this error's severity. Used to decide pre-check aggregation
    /// (`canRotate`) and to pick a recovery strategy.
    pub fn severity(&self) -> ErrorSeverity {
        use ErrorCategory::*;
        match self {
            FileNotFound | UserCancelled => ErrorSeverity::Warning,
            Permissions | ConfigurationError | CompressionError => ErrorSeverity::Error,
            FileSystem | DiskSpace | FileLocked | NetworkError | ResourceExhausted | Timeout => {
                ErrorSeverity::Error
            }
            SystemError | Unknown => ErrorSeverity::Critical,
        }
    }

    /// Whether this class of error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::FileSystem
                | ErrorCategory::DiskSpace
                | ErrorCategory::FileLocked
                | ErrorCategory::NetworkError
                | ErrorCategory::ResourceExhausted
                | ErrorCategory::Timeout
        )
    }

    /// Classifies a raw `io::Error` into one of the rotation error classes.
    pub fn from_io_error(err: &io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            NotFound => ErrorCategory::FileNotFound,
            PermissionDenied => ErrorCategory::Permissions,
            AlreadyExists => ErrorCategory::FileSystem,
            WouldBlock => ErrorCategory::FileLocked,
            TimedOut => ErrorCategory::Timeout,
            Interrupted => ErrorCategory::SystemError,
            OutOfMemory => ErrorCategory::ResourceExhausted,
            _ => {
                #[cfg(unix)]
                {
                    if let Some(28) = err.raw_os_error() {
                        // ENOSPC
                        return ErrorCategory::DiskSpace;
                    }
                    if let Some(11) | Some(35) = err.raw_os_error() {
                        // EAGAIN / EWOULDBLOCK (platform dependent)
                        return ErrorCategory::FileLocked;
                    }
                }
                ErrorCategory::Unknown
            }
        }
    }
}

/// What the rotation error-handler recommends doing about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Retry,
    Skip,
    Fallback,
    Rollback,
    Manual,
    Abort,
}

/// Derives a recovery strategy from an error's category and severity,
/// following the rotation engine's error-classification contract (spec §4.2).
pub fn recovery_strategy_for(category: ErrorCategory, severity: ErrorSeverity) -> RecoveryStrategy {
    use ErrorCategory::*;
    match category {
        _ if category.is_retryable() => RecoveryStrategy::Retry,
        FileNotFound => RecoveryStrategy::Skip,
        CompressionError => RecoveryStrategy::Fallback,
        Permissions | ConfigurationError => RecoveryStrategy::Manual,
        UserCancelled => RecoveryStrategy::Abort,
        _ if severity == ErrorSeverity::Critical => RecoveryStrategy::Rollback,
        _ => RecoveryStrategy::Manual,
    }
}

/// The crate's error type. Carries an `ErrorCategory` so callers can match
/// on class without string-parsing the message.
#[derive(Debug)]
pub struct LogError {
    pub category: ErrorCategory,
    message: String,
}

impl LogError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        LogError { category, message: message.into() }
    }

    pub fn from_io(err: io::Error, context: impl Into<String>) -> Self {
        let category = ErrorCategory::from_io_error(&err);
        LogError::new(category, format!("{}: {}", context.into(), err))
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.category.severity()
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        recovery_strategy_for(self.category, self.severity())
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.category, self.message)
    }
}

impl std::error::Error for LogError {}

impl From<io::Error> for LogError {
    fn from(err: io::Error) -> Self {
        LogError::from_io(err, "I/O operation failed")
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_classifies_as_file_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "nope");
        assert_eq!(ErrorCategory::from_io_error(&err), ErrorCategory::FileNotFound);
    }

    #[test]
    fn retryable_categories_recommend_retry() {
        assert_eq!(
            recovery_strategy_for(ErrorCategory::DiskSpace, ErrorSeverity::Error),
            RecoveryStrategy::Retry
        );
    }

    #[test]
    fn display_includes_category_and_message() {
        let err = LogError::new(ErrorCategory::Permissions, "cannot open archive dir");
        let s = err.to_string();
        assert!(s.contains("Permissions"));
        assert!(s.contains("cannot open archive dir"));
    }
}
