//! Severity levels for log records.
//!
//! `Severity` is a ten-level ordinal, ordered from least to most severe.
//! Unlike the five-level scheme `tracing::Level` offers, this mirrors the
//! full severity range a production file-rotating logger is expected to
//! expose (trace through fatal), so level-gate and filter comparisons use
//! the same ordering everywhere in the crate.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Log record severity, ordered `Trace < Debug < ... < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
    Fatal,
}

impl Severity {
    pub const ALL: [Severity; 10] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
        Severity::Fatal,
    ];

    /// Uppercase name, used for the formatted-level string carried by `LogRecord`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a severity name does not match any known level.
#[derive(Debug, Clone)]
pub struct ParseSeverityError(pub String);

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid severity level: '{}'", self.0)
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Severity::Trace),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" | "SUCCESS" => Ok(Severity::Info),
            "NOTICE" => Ok(Severity::Notice),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            "ALERT" => Ok(Severity::Alert),
            "EMERGENCY" => Ok(Severity::Emergency),
            "FATAL" => Ok(Severity::Fatal),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// Orders two optional bounds the way a min/max level range filter needs:
/// `None` on the low end means unbounded-low, `None` on the high end means
/// unbounded-high.
pub fn in_range(level: Severity, min: Option<Severity>, max: Option<Severity>) -> bool {
    if let Some(min) = min {
        if level.cmp(&min) == Ordering::Less {
            return false;
        }
    }
    if let Some(max) = max {
        if level.cmp(&max) == Ordering::Greater {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_monotonic() {
        assert!(Severity::Trace < Severity::Debug);
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Notice);
        assert!(Severity::Notice < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
        assert!(Severity::Critical < Severity::Alert);
        assert!(Severity::Alert < Severity::Emergency);
        assert!(Severity::Emergency < Severity::Fatal);
    }

    #[test]
    fn parse_is_case_insensitive_with_aliases() {
        assert_eq!("info".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("success".parse::<Severity>().unwrap(), Severity::Info);
        assert!("bogus".parse::<Severity>().is_err());
    }

    #[test]
    fn range_check() {
        assert!(in_range(Severity::Error, Some(Severity::Warning), None));
        assert!(!in_range(Severity::Info, Some(Severity::Warning), None));
        assert!(in_range(Severity::Info, None, Some(Severity::Warning)));
        assert!(!in_range(Severity::Critical, None, Some(Severity::Warning)));
    }
}
