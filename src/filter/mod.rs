//! The filter subsystem: a polymorphic `Filter` trait, leaf filters
//! (level/keyword/regex/rate-limit/thread), a composite that combines
//! children under one of several strategies, and a process-wide factory
//! that serializes/deserializes filters by type name.
//!
//! Grounded on the teacher's `backend::filtering` module for the per-call
//! statistics idiom (`parking_lot::Mutex`-guarded counters) and on
//! `original_source/include/log/ILogFilter.h` /
//! `include/log/CompositeFilter.h` for the evaluation contract and
//! composition strategies this module implements in full.

pub mod composite;
pub mod factory;
pub mod leaf;

use crate::level::Severity;
use crate::record::LogRecord;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// The result of evaluating a filter against a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow,
    Block,
    Transform(LogRecord),
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block)
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub fn is_transform(&self) -> bool {
        matches!(self, Verdict::Transform(_))
    }
}

/// Per-filter call statistics, tracked under the filter's own lock so a
/// caller can sample `totalProcessed = allowed + blocked + transformed`
/// without synchronizing with `apply`.
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub total_processed: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub transformed: u64,
    pub total_processing_time: Duration,
    pub last_reset_time: Option<Instant>,
}

impl FilterStats {
    pub fn average_processing_time(&self) -> Duration {
        if self.total_processed == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / self.total_processed as u32
        }
    }
}

#[derive(Default)]
pub struct StatsCell(Mutex<FilterStats>);

impl StatsCell {
    pub fn new() -> Self {
        StatsCell(Mutex::new(FilterStats { last_reset_time: Some(Instant::now()), ..Default::default() }))
    }

    pub fn record(&self, verdict: &Verdict, elapsed: Duration) {
        let mut s = self.0.lock();
        s.total_processed += 1;
        s.total_processing_time += elapsed;
        match verdict {
            Verdict::Allow => s.allowed += 1,
            Verdict::Block => s.blocked += 1,
            Verdict::Transform(_) => s.transformed += 1,
        }
    }

    pub fn snapshot(&self) -> FilterStats {
        self.0.lock().clone()
    }

    pub fn reset(&self) {
        let mut s = self.0.lock();
        *s = FilterStats { last_reset_time: Some(Instant::now()), ..Default::default() };
    }
}

/// Configuration shape every filter can serialize itself to/from, per
/// spec §4.5: `{type, enabled, priority, description, version, config}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub enabled: bool,
    pub priority: i32,
    pub description: String,
    pub version: u32,
    pub config: serde_json::Value,
}

/// Capability set every filter implements. `evaluate` is the hot path;
/// `quick_reject` lets a caller skip expensive work (e.g. regex) when a
/// cheap level check alone would already block.
pub trait Filter: Send + Sync {
    /// Applies the filter to `record`. Returning `Verdict::Transform` means
    /// the returned record replaces the input for all downstream stages.
    fn evaluate(&self, record: &LogRecord) -> Verdict;

    /// Fast pre-check usable before a record even exists, e.g. to skip
    /// building an expensive message. Default: never rejects.
    fn quick_reject(&self, _level: Severity) -> bool {
        false
    }

    /// Whether `evaluate` does non-trivial work (regex, rate limiting).
    /// Composite filters use this to decide evaluation order.
    fn is_expensive(&self) -> bool {
        false
    }

    fn stats(&self) -> FilterStats;
    fn reset_stats(&self);

    fn box_clone(&self) -> Box<dyn Filter>;
    fn serialize(&self) -> FilterConfig;

    /// Type name used by the factory registry, e.g. `"level"`, `"composite"`.
    fn type_name(&self) -> &'static str;

    /// Identity used only for composite cycle detection. `None` for leaves.
    fn composite_id(&self) -> Option<u64> {
        None
    }

    /// Whether this filter is, or transitively contains, the composite
    /// identified by `id`. Leaves always answer `false`.
    fn contains_composite_id(&self, _id: u64) -> bool {
        false
    }
}

impl Clone for Box<dyn Filter> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Shared timing+stats wrapper so every leaf filter's `evaluate` gets
/// consistent instrumentation without repeating the boilerplate.
pub(crate) fn timed_evaluate(stats: &StatsCell, f: impl FnOnce() -> Verdict) -> Verdict {
    let start = Instant::now();
    let verdict = f();
    stats.record(&verdict, start.elapsed());
    verdict
}
