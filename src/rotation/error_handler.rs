//! Exponential-backoff retry, driven by the `RecoveryStrategy` the crate's
//! error taxonomy (`crate::error`) derives for a given failure.
//!
//! Defaults (`initial_delay=100ms`, `multiplier=2.0`, `max_delay=30s`,
//! `max_retries=3`) are carried over from `original_source/
//! RotationErrorHandler.cpp` verbatim, per SPEC_FULL.md §4.

use crate::error::{ErrorCategory, LogError, RecoveryStrategy};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { initial_delay: Duration::from_millis(100), multiplier: 2.0, max_delay: Duration::from_secs(30), max_retries: 3 }
    }
}

impl RetryPolicy {
    /// `delay_k = min(max_delay, initial_delay * multiplier^k)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

/// Runs `operation` up to `policy.max_retries + 1` times, sleeping between
/// attempts per `delay_for_attempt`, but only while the error's category is
/// retryable. Non-retryable errors return immediately.
pub fn run_with_retry<T>(policy: &RetryPolicy, mut operation: impl FnMut() -> Result<T, LogError>) -> Result<T, LogError> {
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.category.is_retryable() && err.recovery_strategy() == RecoveryStrategy::Retry;
                if !retryable || attempt >= policy.max_retries {
                    return Err(err);
                }
                std::thread::sleep(policy.delay_for_attempt(attempt));
                attempt += 1;
            }
        }
    }
}

/// Classifies a raw I/O failure and reports the recommended next step,
/// without itself performing any retry — callers decide whether to loop.
pub fn classify(err: &std::io::Error) -> (ErrorCategory, RecoveryStrategy) {
    let category = ErrorCategory::from_io_error(err);
    let strategy = crate::error::recovery_strategy_for(category, category.severity());
    (category, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        let big = RetryPolicy { max_retries: 20, ..policy };
        assert_eq!(big.delay_for_attempt(15), big.max_delay);
    }

    #[test]
    fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy { initial_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2), ..Default::default() };
        let result = run_with_retry(&policy, || {
            let n = attempts.fetch_add(1, Ordering::Relaxed);
            if n < 2 {
                Err(LogError::new(ErrorCategory::FileLocked, "still locked"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn non_retryable_error_returns_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), LogError> = run_with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            Err(LogError::new(ErrorCategory::Permissions, "denied"))
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn retryable_error_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy { initial_delay: Duration::from_millis(1), max_delay: Duration::from_millis(2), max_retries: 2, ..Default::default() };
        let result: Result<(), LogError> = run_with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            Err(LogError::new(ErrorCategory::FileLocked, "still locked"))
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }
}
