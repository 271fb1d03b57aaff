//! Leaf filters: level range, keyword include/exclude, regex, token-bucket
//! rate limiting, and thread allow/deny.

use super::{timed_evaluate, Filter, FilterConfig, FilterStats, StatsCell, Verdict};
use crate::level::Severity;
use crate::record::{LogRecord, ThreadIdent};
use ahash::AHashSet;
use parking_lot::Mutex;
use regex::Regex;
use std::time::{Duration, Instant};

/// Allows records whose level falls within `[min, max]` (either bound may
/// be open).
pub struct LevelFilter {
    pub min: Option<Severity>,
    pub max: Option<Severity>,
    stats: StatsCell,
}

impl LevelFilter {
    pub fn new(min: Option<Severity>, max: Option<Severity>) -> Self {
        LevelFilter { min, max, stats: StatsCell::new() }
    }

    pub fn at_least(min: Severity) -> Self {
        LevelFilter::new(Some(min), None)
    }
}

impl Filter for LevelFilter {
    fn evaluate(&self, record: &LogRecord) -> Verdict {
        timed_evaluate(&self.stats, || {
            if crate::level::in_range(record.level, self.min, self.max) {
                Verdict::Allow
            } else {
                Verdict::Block
            }
        })
    }

    fn quick_reject(&self, level: Severity) -> bool {
        !crate::level::in_range(level, self.min, self.max)
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset()
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        Box::new(LevelFilter::new(self.min, self.max))
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: "level range filter".to_string(),
            version: 1,
            config: serde_json::json!({ "min": self.min, "max": self.max }),
        }
    }

    fn type_name(&self) -> &'static str {
        "level"
    }
}

/// Allows or blocks based on required/forbidden substrings in the message.
pub struct KeywordFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub case_sensitive: bool,
    stats: StatsCell,
}

impl KeywordFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>, case_sensitive: bool) -> Self {
        KeywordFilter { include, exclude, case_sensitive, stats: StatsCell::new() }
    }

    fn contains(&self, haystack: &str, needle: &str) -> bool {
        if self.case_sensitive {
            haystack.contains(needle)
        } else {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
    }
}

impl Filter for KeywordFilter {
    fn evaluate(&self, record: &LogRecord) -> Verdict {
        timed_evaluate(&self.stats, || {
            if self.exclude.iter().any(|kw| self.contains(&record.message, kw)) {
                return Verdict::Block;
            }
            if !self.include.is_empty() && !self.include.iter().any(|kw| self.contains(&record.message, kw)) {
                return Verdict::Block;
            }
            Verdict::Allow
        })
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset()
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        Box::new(KeywordFilter::new(self.include.clone(), self.exclude.clone(), self.case_sensitive))
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: "keyword include/exclude filter".to_string(),
            version: 1,
            config: serde_json::json!({
                "include": self.include,
                "exclude": self.exclude,
                "case_sensitive": self.case_sensitive,
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        "keyword"
    }
}

/// Allows records whose message matches a compiled regular expression.
pub struct RegexFilter {
    pub pattern: String,
    regex: Regex,
    stats: StatsCell,
}

impl RegexFilter {
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)?;
        Ok(RegexFilter { pattern, regex, stats: StatsCell::new() })
    }
}

impl Filter for RegexFilter {
    fn evaluate(&self, record: &LogRecord) -> Verdict {
        timed_evaluate(&self.stats, || {
            if self.regex.is_match(&record.message) {
                Verdict::Allow
            } else {
                Verdict::Block
            }
        })
    }

    fn is_expensive(&self) -> bool {
        true
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset()
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        Box::new(RegexFilter::new(self.pattern.clone()).expect("previously-valid pattern"))
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: "regex filter".to_string(),
            version: 1,
            config: serde_json::json!({ "pattern": self.pattern }),
        }
    }

    fn type_name(&self) -> &'static str {
        "regex"
    }
}

/// Token-bucket rate limiter: at most `max_per_second` allowed per second,
/// with bursts up to `max_burst` tokens banked.
pub struct RateLimitFilter {
    pub max_per_second: f64,
    pub max_burst: f64,
    bucket: Mutex<Bucket>,
    stats: StatsCell,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimitFilter {
    pub fn new(max_per_second: f64, max_burst: f64) -> Self {
        RateLimitFilter {
            max_per_second,
            max_burst,
            bucket: Mutex::new(Bucket { tokens: max_burst, last_refill: Instant::now() }),
            stats: StatsCell::new(),
        }
    }

    fn try_take(&self) -> bool {
        let mut b = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(b.last_refill).as_secs_f64();
        b.tokens = (b.tokens + elapsed * self.max_per_second).min(self.max_burst);
        b.last_refill = now;
        if b.tokens >= 1.0 {
            b.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Filter for RateLimitFilter {
    fn evaluate(&self, _record: &LogRecord) -> Verdict {
        timed_evaluate(&self.stats, || {
            if self.try_take() {
                Verdict::Allow
            } else {
                Verdict::Block
            }
        })
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset()
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        Box::new(RateLimitFilter::new(self.max_per_second, self.max_burst))
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: "token bucket rate limiter".to_string(),
            version: 1,
            config: serde_json::json!({
                "max_per_second": self.max_per_second,
                "max_burst": self.max_burst,
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        "rate_limit"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ThreadMode {
    Allow,
    Deny,
}

/// Allows or denies records based on the producing thread's identity.
pub struct ThreadFilter {
    pub mode: ThreadMode,
    pub threads: AHashSet<u64>,
    stats: StatsCell,
}

impl ThreadFilter {
    pub fn new(mode: ThreadMode, threads: impl IntoIterator<Item = ThreadIdent>) -> Self {
        ThreadFilter {
            mode,
            threads: threads.into_iter().map(|t| t.as_u64()).collect(),
            stats: StatsCell::new(),
        }
    }
}

impl Filter for ThreadFilter {
    fn evaluate(&self, record: &LogRecord) -> Verdict {
        timed_evaluate(&self.stats, || {
            let is_member = self.threads.contains(&record.thread.as_u64());
            let allowed = match self.mode {
                ThreadMode::Allow => is_member,
                ThreadMode::Deny => !is_member,
            };
            if allowed {
                Verdict::Allow
            } else {
                Verdict::Block
            }
        })
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset()
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        Box::new(ThreadFilter {
            mode: self.mode,
            threads: self.threads.clone(),
            stats: StatsCell::new(),
        })
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: "thread allow/deny filter".to_string(),
            version: 1,
            config: serde_json::json!({
                "mode": self.mode,
                "threads": self.threads.iter().collect::<Vec<_>>(),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        "thread"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(level: Severity, msg: &str) -> LogRecord {
        LogRecord::new(level, msg)
    }

    #[test]
    fn level_filter_range() {
        let f = LevelFilter::at_least(Severity::Warning);
        assert_eq!(f.evaluate(&rec(Severity::Info, "x")), Verdict::Block);
        assert_eq!(f.evaluate(&rec(Severity::Error, "x")), Verdict::Allow);
    }

    #[test]
    fn keyword_include_and_exclude() {
        let f = KeywordFilter::new(vec!["CRITICAL".into()], vec![], false);
        assert_eq!(f.evaluate(&rec(Severity::Info, "a CRITICAL event")), Verdict::Allow);
        assert_eq!(f.evaluate(&rec(Severity::Info, "nothing interesting")), Verdict::Block);

        let f2 = KeywordFilter::new(vec![], vec!["secret".into()], false);
        assert_eq!(f2.evaluate(&rec(Severity::Info, "a secret value")), Verdict::Block);
        assert_eq!(f2.evaluate(&rec(Severity::Info, "public value")), Verdict::Allow);
    }

    #[test]
    fn regex_filter_matches() {
        let f = RegexFilter::new(r"^user-\d+$").unwrap();
        assert_eq!(f.evaluate(&rec(Severity::Info, "user-42")), Verdict::Allow);
        assert_eq!(f.evaluate(&rec(Severity::Info, "user-abc")), Verdict::Block);
    }

    #[test]
    fn rate_limit_bursts_then_blocks_then_recovers() {
        let f = RateLimitFilter::new(2.0, 2.0);
        let r = rec(Severity::Info, "x");
        assert_eq!(f.evaluate(&r), Verdict::Allow);
        assert_eq!(f.evaluate(&r), Verdict::Allow);
        assert_eq!(f.evaluate(&r), Verdict::Block);
        assert_eq!(f.evaluate(&r), Verdict::Block);
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(f.evaluate(&r), Verdict::Allow);
        assert_eq!(f.evaluate(&r), Verdict::Allow);
    }

    #[test]
    fn thread_filter_allow_mode() {
        let me = ThreadIdent::current();
        let f = ThreadFilter::new(ThreadMode::Allow, vec![me]);
        assert_eq!(f.evaluate(&rec(Severity::Info, "x")), Verdict::Allow);
    }
}
