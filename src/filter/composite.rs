//! Composite filters: combine child filters under one of several
//! strategies. Grounded on `original_source/include/log/CompositeFilter.h`
//! and `ICompositeFilter.h` for the strategy set and the cycle-rejection
//! requirement (spec §9: "composite filters must reject cycles on
//! construction").
//!
//! Children are held behind a `parking_lot::RwLock` rather than a plain
//! `Vec` so a composite can grow after construction via `try_add_child` —
//! the only way a cycle (`A` containing `B` containing `A`) could ever
//! arise, since a `Vec<Arc<dyn Filter>>` built once at construction time
//! cannot reference a composite that doesn't exist yet.

use super::{Filter, FilterConfig, FilterStats, StatsCell, Verdict};
use crate::level::Severity;
use crate::record::LogRecord;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How a composite reduces its children's verdicts into one.
pub enum Strategy {
    /// AND: short-circuits on the first `Block`.
    AllMustPass,
    /// OR: short-circuits on the first `Allow`/`Transform`.
    AnyCanPass,
    /// The verdict held by more than half the children; ties favor `Allow`.
    MajorityRule,
    /// The first non-`Allow` verdict wins; otherwise `Allow`.
    FirstMatch,
    /// A caller-supplied reducer over the full verdict vector.
    Custom(Box<dyn Fn(&[Verdict]) -> Verdict + Send + Sync>),
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::AllMustPass => "all_must_pass",
            Strategy::AnyCanPass => "any_can_pass",
            Strategy::MajorityRule => "majority_rule",
            Strategy::FirstMatch => "first_match",
            Strategy::Custom(_) => "custom",
        }
    }
}

static NEXT_COMPOSITE_ID: AtomicU64 = AtomicU64::new(1);

pub struct CompositeFilter {
    id: u64,
    pub strategy: Strategy,
    children: RwLock<Vec<Arc<dyn Filter>>>,
    stats: StatsCell,
}

/// Error returned when adding a child would introduce a cycle.
#[derive(Debug, Clone)]
pub struct CycleError;

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "composite filter would contain itself, transitively")
    }
}
impl std::error::Error for CycleError {}

impl CompositeFilter {
    /// Builds a composite from `children` under `strategy`. Rejects any
    /// child that is, or transitively contains, this about-to-exist
    /// composite — unreachable for a value built bottom-up like this, but
    /// checked anyway so the invariant holds uniformly with `try_add_child`.
    pub fn new(strategy: Strategy, children: Vec<Arc<dyn Filter>>) -> Result<Self, CycleError> {
        let id = NEXT_COMPOSITE_ID.fetch_add(1, Ordering::Relaxed);
        if children.iter().any(|c| c.composite_id() == Some(id) || c.contains_composite_id(id)) {
            return Err(CycleError);
        }
        Ok(CompositeFilter { id, strategy, children: RwLock::new(children), stats: StatsCell::new() })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Adds `child` to this composite, rejecting it if `child` is this
    /// composite or already (transitively) contains it.
    pub fn try_add_child(&self, child: Arc<dyn Filter>) -> Result<(), CycleError> {
        if child.composite_id() == Some(self.id) || child.contains_composite_id(self.id) {
            return Err(CycleError);
        }
        self.children.write().push(child);
        Ok(())
    }

    pub fn children(&self) -> Vec<Arc<dyn Filter>> {
        self.children.read().clone()
    }

    fn evaluate_all_must_pass(&self, record: &LogRecord, children: &[Arc<dyn Filter>]) -> Verdict {
        let mut transformed: Option<LogRecord> = None;
        for child in children {
            let view = transformed.as_ref().unwrap_or(record);
            match child.evaluate(view) {
                Verdict::Block => return Verdict::Block,
                Verdict::Allow => {}
                Verdict::Transform(r) => transformed = Some(r),
            }
        }
        match transformed {
            Some(r) => Verdict::Transform(r),
            None => Verdict::Allow,
        }
    }

    fn evaluate_any_can_pass(&self, record: &LogRecord, children: &[Arc<dyn Filter>]) -> Verdict {
        for child in children {
            match child.evaluate(record) {
                Verdict::Allow => return Verdict::Allow,
                Verdict::Transform(r) => return Verdict::Transform(r),
                Verdict::Block => continue,
            }
        }
        if children.is_empty() {
            Verdict::Allow
        } else {
            Verdict::Block
        }
    }

    fn evaluate_majority_rule(&self, record: &LogRecord, children: &[Arc<dyn Filter>]) -> Verdict {
        let verdicts: Vec<Verdict> = children.iter().map(|c| c.evaluate(record)).collect();
        if verdicts.is_empty() {
            return Verdict::Allow;
        }
        let threshold = verdicts.len() / 2 + 1;
        let allow = verdicts.iter().filter(|v| v.is_allow()).count();
        let block = verdicts.iter().filter(|v| v.is_block()).count();
        let transform = verdicts.iter().filter(|v| v.is_transform()).count();
        if block >= threshold {
            Verdict::Block
        } else if transform >= threshold {
            verdicts.into_iter().find(|v| v.is_transform()).unwrap()
        } else {
            // Majority Allow, or no strict majority at all: ties favor Allow.
            let _ = allow;
            Verdict::Allow
        }
    }

    fn evaluate_first_match(&self, record: &LogRecord, children: &[Arc<dyn Filter>]) -> Verdict {
        for child in children {
            let v = child.evaluate(record);
            if !v.is_allow() {
                return v;
            }
        }
        Verdict::Allow
    }
}

impl Filter for CompositeFilter {
    fn evaluate(&self, record: &LogRecord) -> Verdict {
        let start = std::time::Instant::now();
        let children = self.children.read().clone();
        let verdict = match &self.strategy {
            Strategy::AllMustPass => self.evaluate_all_must_pass(record, &children),
            Strategy::AnyCanPass => self.evaluate_any_can_pass(record, &children),
            Strategy::MajorityRule => self.evaluate_majority_rule(record, &children),
            Strategy::FirstMatch => self.evaluate_first_match(record, &children),
            Strategy::Custom(reducer) => {
                let verdicts: Vec<Verdict> = children.iter().map(|c| c.evaluate(record)).collect();
                reducer(&verdicts)
            }
        };
        self.stats.record(&verdict, start.elapsed());
        verdict
    }

    fn quick_reject(&self, level: Severity) -> bool {
        let children = self.children.read();
        match &self.strategy {
            Strategy::AllMustPass => children.iter().any(|c| c.quick_reject(level)),
            Strategy::AnyCanPass => !children.is_empty() && children.iter().all(|c| c.quick_reject(level)),
            _ => false,
        }
    }

    fn is_expensive(&self) -> bool {
        self.children.read().iter().any(|c| c.is_expensive())
    }

    fn stats(&self) -> FilterStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset();
        for c in self.children.read().iter() {
            c.reset_stats();
        }
    }

    fn box_clone(&self) -> Box<dyn Filter> {
        let strategy = match &self.strategy {
            Strategy::AllMustPass => Strategy::AllMustPass,
            Strategy::AnyCanPass => Strategy::AnyCanPass,
            Strategy::MajorityRule => Strategy::MajorityRule,
            Strategy::FirstMatch => Strategy::FirstMatch,
            // A custom reducer can't be cloned generically; degrade to
            // FirstMatch rather than silently losing the custom logic.
            Strategy::Custom(_) => Strategy::FirstMatch,
        };
        Box::new(CompositeFilter::new(strategy, self.children()).expect("already validated"))
    }

    fn serialize(&self) -> FilterConfig {
        FilterConfig {
            type_name: self.type_name().to_string(),
            enabled: true,
            priority: 0,
            description: format!("composite filter ({})", self.strategy.name()),
            version: 1,
            config: serde_json::json!({
                "strategy": self.strategy.name(),
                "children": self.children().iter().map(|c| c.serialize()).collect::<Vec<_>>(),
            }),
        }
    }

    fn type_name(&self) -> &'static str {
        "composite"
    }

    fn composite_id(&self) -> Option<u64> {
        Some(self.id)
    }

    fn contains_composite_id(&self, id: u64) -> bool {
        self.id == id || self.children.read().iter().any(|c| c.composite_id() == Some(id) || c.contains_composite_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::leaf::{KeywordFilter, LevelFilter};

    fn rec(level: Severity, msg: &str) -> LogRecord {
        LogRecord::new(level, msg)
    }

    #[test]
    fn all_must_pass_requires_every_child() {
        let composite = CompositeFilter::new(
            Strategy::AllMustPass,
            vec![
                Arc::new(LevelFilter::at_least(Severity::Warning)),
                Arc::new(KeywordFilter::new(vec!["CRITICAL".into()], vec![], false)),
            ],
        )
        .unwrap();

        assert_eq!(composite.evaluate(&rec(Severity::Info, "CRITICAL x")), Verdict::Block);
        assert_eq!(composite.evaluate(&rec(Severity::Error, "normal")), Verdict::Block);
        assert_eq!(composite.evaluate(&rec(Severity::Error, "CRITICAL y")), Verdict::Allow);
    }

    #[test]
    fn any_can_pass_allows_if_one_child_allows() {
        let composite = CompositeFilter::new(
            Strategy::AnyCanPass,
            vec![
                Arc::new(LevelFilter::at_least(Severity::Critical)),
                Arc::new(KeywordFilter::new(vec!["ping".into()], vec![], false)),
            ],
        )
        .unwrap();
        assert_eq!(composite.evaluate(&rec(Severity::Info, "ping")), Verdict::Allow);
        assert_eq!(composite.evaluate(&rec(Severity::Info, "other")), Verdict::Block);
    }

    #[test]
    fn majority_rule_breaks_ties_toward_allow() {
        let composite = CompositeFilter::new(
            Strategy::MajorityRule,
            vec![
                Arc::new(LevelFilter::at_least(Severity::Error)),
                Arc::new(LevelFilter::at_least(Severity::Trace)),
            ],
        )
        .unwrap();
        assert_eq!(composite.evaluate(&rec(Severity::Info, "x")), Verdict::Allow);
    }

    #[test]
    fn stats_roll_up_total_processed() {
        let composite = CompositeFilter::new(
            Strategy::AllMustPass,
            vec![Arc::new(LevelFilter::at_least(Severity::Trace))],
        )
        .unwrap();
        composite.evaluate(&rec(Severity::Info, "x"));
        composite.evaluate(&rec(Severity::Info, "y"));
        let s = composite.stats();
        assert_eq!(s.total_processed, s.allowed + s.blocked + s.transformed);
        assert_eq!(s.total_processed, 2);
    }

    #[test]
    fn adding_self_as_child_is_rejected() {
        let composite = Arc::new(
            CompositeFilter::new(Strategy::AllMustPass, vec![Arc::new(LevelFilter::at_least(Severity::Trace))])
                .unwrap(),
        );
        let err = composite.try_add_child(composite.clone());
        assert!(err.is_err());
    }

    #[test]
    fn adding_a_parent_that_contains_us_is_rejected() {
        let inner = Arc::new(CompositeFilter::new(Strategy::AllMustPass, vec![]).unwrap());
        let outer = Arc::new(
            CompositeFilter::new(Strategy::AllMustPass, vec![inner.clone() as Arc<dyn Filter>]).unwrap(),
        );
        // outer already contains inner; adding outer into inner would cycle.
        assert!(inner.try_add_child(outer.clone()).is_err());
    }
}
