//! `RotationTrigger`/`RotationDecision`: the strategy layer's output,
//! consumed by the rotation engine to decide whether and how urgently to
//! rotate.

use std::time::Duration;

/// What kind of condition fired. A strategy sets exactly the flag(s) that
/// apply to it; `SizeAndTime` may set both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationTrigger {
    pub size_exceeded: bool,
    pub time_reached: bool,
    pub manual: bool,
}

impl RotationTrigger {
    pub fn none() -> Self {
        RotationTrigger::default()
    }

    pub fn is_triggered(&self) -> bool {
        self.size_exceeded || self.time_reached || self.manual
    }
}

/// A strategy's verdict: whether to rotate, why, how urgently (0..10), and
/// a rough duration estimate the caller may use for scheduling.
#[derive(Debug, Clone)]
pub struct RotationDecision {
    pub should_rotate: bool,
    pub reason: String,
    pub priority: u8,
    pub estimated_duration: Duration,
    pub trigger: RotationTrigger,
}

impl RotationDecision {
    pub fn no(reason: impl Into<String>) -> Self {
        RotationDecision {
            should_rotate: false,
            reason: reason.into(),
            priority: 0,
            estimated_duration: Duration::ZERO,
            trigger: RotationTrigger::none(),
        }
    }

    pub fn yes(reason: impl Into<String>, priority: u8, trigger: RotationTrigger) -> Self {
        RotationDecision {
            should_rotate: true,
            reason: reason.into(),
            priority: priority.min(10),
            estimated_duration: Duration::from_millis(100),
            trigger,
        }
    }
}
