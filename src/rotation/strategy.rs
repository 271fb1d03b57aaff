//! Rotation strategies: `Size`, `Time`, `SizeAndTime` (composite), `Manual`.
//! Grounded on `original_source/include/log/ILogRotationManager.h`'s
//! `LogRotationStrategy`/`TimeRotationInterval` for the interval set and
//! priority-scaling behavior spec.md §4.2 describes only qualitatively.

use super::context::RotationContext;
use super::trigger::{RotationDecision, RotationTrigger};
use std::time::{Duration, Instant};

pub trait RotationStrategy: Send + Sync {
    fn should_rotate(&self, context: &RotationContext) -> RotationDecision;

    /// The next instant this strategy would trigger on its own, absent any
    /// size growth — `None` for strategies that can't predict (e.g. `Size`).
    fn next_rotation_time(&self, context: &RotationContext) -> Option<Instant>;
}

pub struct SizeStrategy {
    pub max_bytes: u64,
}

impl RotationStrategy for SizeStrategy {
    fn should_rotate(&self, context: &RotationContext) -> RotationDecision {
        if context.current_size < self.max_bytes {
            return RotationDecision::no("size below threshold");
        }
        let overage_ratio = context.current_size as f64 / self.max_bytes as f64;
        let priority = (overage_ratio.min(10.0)) as u8;
        RotationDecision::yes(
            format!("size {} >= max {}", context.current_size, self.max_bytes),
            priority.max(1),
            RotationTrigger { size_exceeded: true, ..RotationTrigger::none() },
        )
    }

    fn next_rotation_time(&self, _context: &RotationContext) -> Option<Instant> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeRotationInterval {
    Hourly,
    Daily,
    Weekly,
    /// Approximated as 30 days, per spec.md §4.2.
    Monthly,
}

impl TimeRotationInterval {
    pub fn duration(&self) -> Duration {
        match self {
            TimeRotationInterval::Hourly => Duration::from_secs(60 * 60),
            TimeRotationInterval::Daily => Duration::from_secs(24 * 60 * 60),
            TimeRotationInterval::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
            TimeRotationInterval::Monthly => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

pub struct TimeStrategy {
    pub interval: TimeRotationInterval,
}

impl RotationStrategy for TimeStrategy {
    fn should_rotate(&self, context: &RotationContext) -> RotationDecision {
        let elapsed = context.now.saturating_duration_since(context.last_rotation);
        let interval = self.interval.duration();
        if elapsed < interval {
            return RotationDecision::no("interval not yet elapsed");
        }
        let overrun_hours = (elapsed.as_secs() - interval.as_secs()) as f64 / 3600.0;
        let priority = (1.0 + overrun_hours).min(10.0) as u8;
        RotationDecision::yes(
            format!("time interval {:?} elapsed", self.interval),
            priority.max(1),
            RotationTrigger { time_reached: true, ..RotationTrigger::none() },
        )
    }

    fn next_rotation_time(&self, context: &RotationContext) -> Option<Instant> {
        Some(context.last_rotation + self.interval.duration())
    }
}

pub struct SizeAndTimeStrategy {
    pub size: SizeStrategy,
    pub time: TimeStrategy,
}

impl RotationStrategy for SizeAndTimeStrategy {
    fn should_rotate(&self, context: &RotationContext) -> RotationDecision {
        let size_decision = self.size.should_rotate(context);
        let time_decision = self.time.should_rotate(context);
        match (size_decision.should_rotate, time_decision.should_rotate) {
            (false, false) => RotationDecision::no("neither size nor time threshold reached"),
            (true, false) => size_decision,
            (false, true) => time_decision,
            (true, true) => {
                if size_decision.priority >= time_decision.priority {
                    size_decision
                } else {
                    time_decision
                }
            }
        }
    }

    fn next_rotation_time(&self, context: &RotationContext) -> Option<Instant> {
        match (self.size.next_rotation_time(context), self.time.next_rotation_time(context)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

pub struct ManualStrategy;

impl RotationStrategy for ManualStrategy {
    fn should_rotate(&self, context: &RotationContext) -> RotationDecision {
        if context.manual {
            RotationDecision::yes(
                "manual rotation requested",
                10,
                RotationTrigger { manual: true, ..RotationTrigger::none() },
            )
        } else {
            RotationDecision::no("no manual request pending")
        }
    }

    fn next_rotation_time(&self, _context: &RotationContext) -> Option<Instant> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn context(size: u64, manual: bool) -> RotationContext {
        let now = Instant::now();
        let mut ctx = RotationContext::new(PathBuf::from("app.log"), size, now, now);
        ctx.manual = manual;
        ctx
    }

    #[test]
    fn size_strategy_triggers_at_threshold() {
        let strategy = SizeStrategy { max_bytes: 1024 };
        assert!(!strategy.should_rotate(&context(512, false)).should_rotate);
        let decision = strategy.should_rotate(&context(2048, false));
        assert!(decision.should_rotate);
        assert!(decision.trigger.size_exceeded);
        assert!(decision.priority >= 1);
    }

    #[test]
    fn manual_strategy_only_fires_on_request() {
        let strategy = ManualStrategy;
        assert!(!strategy.should_rotate(&context(0, false)).should_rotate);
        assert!(strategy.should_rotate(&context(0, true)).should_rotate);
    }

    #[test]
    fn size_and_time_prefers_higher_priority() {
        let strategy =
            SizeAndTimeStrategy { size: SizeStrategy { max_bytes: 1024 }, time: TimeStrategy { interval: TimeRotationInterval::Hourly } };
        let decision = strategy.should_rotate(&context(4096, false));
        assert!(decision.should_rotate);
        assert!(decision.trigger.size_exceeded);
    }
}
