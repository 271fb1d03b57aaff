//! The rotation state machine: the legal transition table from spec §4.2,
//! a bounded journal of every transition, and a panic-swallowing transition
//! callback, mirroring the teacher's callback-broadcast idiom
//! (`callback::CallbackRegistry`) at a much smaller scale (a single
//! optional listener rather than a registry, since only the rotation
//! manager itself observes its own transitions).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationState {
    Idle,
    Checking,
    Preparing,
    PreCheck,
    Rotating,
    Compressing,
    Cleaning,
    Completing,
    Completed,
    Failed,
    Recovering,
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Start,
    CheckPassed,
    CheckFailed,
    PrepareDone,
    PreCheckPassed,
    PreCheckFailed,
    RotationSuccess,
    RotationFailed,
    CompressOk,
    CompressFail,
    CleanupDone,
    Complete,
    Fail,
    Recover,
    Rollback,
    Reset,
}

#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: RotationState,
    pub event: Event,
}

impl std::fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event {:?} is not legal from state {:?}", self.event, self.from)
    }
}

impl std::error::Error for IllegalTransition {}

/// Applies the transition table. `Any -> Fail` and `Any -> Reset` are legal
/// from every state; everything else is keyed on the specific source state.
fn next_state(from: RotationState, event: Event) -> Option<RotationState> {
    use Event::*;
    use RotationState::*;
    if event == Fail {
        return Some(Failed);
    }
    if event == Reset {
        return Some(Idle);
    }
    match (from, event) {
        (Idle, Start) => Some(Checking),
        (Checking, CheckPassed) => Some(Preparing),
        (Checking, CheckFailed) => Some(Failed),
        (Preparing, PrepareDone) => Some(PreCheck),
        (PreCheck, PreCheckPassed) => Some(Rotating),
        (PreCheck, PreCheckFailed) => Some(Failed),
        (Rotating, RotationSuccess) => Some(Compressing),
        (Rotating, RotationFailed) => Some(Failed),
        (Compressing, CompressOk) => Some(Cleaning),
        (Compressing, CompressFail) => Some(Cleaning),
        (Cleaning, CleanupDone) => Some(Completing),
        (Completing, Complete) => Some(Completed),
        (Failed, Recover) => Some(Recovering),
        (Failed, self::Event::Rollback) => Some(self::RotationState::Rollback),
        (Recovering, Complete) => Some(Idle),
        (Recovering, Fail) => Some(Failed),
        (self::RotationState::Rollback, Complete) => Some(Idle),
        (self::RotationState::Rollback, Fail) => Some(Failed),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub from: RotationState,
    pub to: RotationState,
    pub event: Event,
    pub at: Instant,
}

const JOURNAL_CAPACITY: usize = 1000;

type TransitionCallback = std::sync::Arc<dyn Fn(&JournalEntry) + Send + Sync>;

struct Inner {
    state: RotationState,
    journal: VecDeque<JournalEntry>,
    callback: Option<TransitionCallback>,
}

/// Owns the current `RotationState` and its journal under a single lock,
/// as spec §4.2 requires ("mutated only under its lock").
pub struct StateMachine {
    inner: Mutex<Inner>,
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine { inner: Mutex::new(Inner { state: RotationState::Idle, journal: VecDeque::new(), callback: None }) }
    }

    pub fn current(&self) -> RotationState {
        self.inner.lock().state
    }

    pub fn set_transition_callback(&self, callback: TransitionCallback) {
        self.inner.lock().callback = Some(callback);
    }

    /// Applies `event`. Returns the new state, or the illegal-transition
    /// error if `event` is not legal from the current state.
    pub fn fire(&self, event: Event) -> Result<RotationState, IllegalTransition> {
        let (entry, callback) = {
            let mut guard = self.inner.lock();
            let from = guard.state;
            let to = next_state(from, event).ok_or(IllegalTransition { from, event })?;
            guard.state = to;
            let entry = JournalEntry { from, to, event, at: Instant::now() };
            guard.journal.push_back(entry.clone());
            if guard.journal.len() > JOURNAL_CAPACITY {
                guard.journal.pop_front();
            }
            (entry, guard.callback.clone())
        };
        // Invoked after the lock is released: spec §5 requires the
        // rotation manager never call back into logger state under its own
        // lock.
        if let Some(cb) = callback {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&entry)));
        }
        Ok(entry.to)
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.lock().journal.iter().cloned().collect()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let sm = StateMachine::new();
        sm.fire(Event::Start).unwrap();
        sm.fire(Event::CheckPassed).unwrap();
        sm.fire(Event::PrepareDone).unwrap();
        sm.fire(Event::PreCheckPassed).unwrap();
        sm.fire(Event::RotationSuccess).unwrap();
        sm.fire(Event::CompressOk).unwrap();
        sm.fire(Event::CleanupDone).unwrap();
        sm.fire(Event::Complete).unwrap();
        assert_eq!(sm.current(), RotationState::Completed);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let sm = StateMachine::new();
        assert!(sm.fire(Event::Complete).is_err());
        assert_eq!(sm.current(), RotationState::Idle);
    }

    #[test]
    fn any_state_can_fail_and_reset() {
        let sm = StateMachine::new();
        sm.fire(Event::Start).unwrap();
        sm.fire(Event::Fail).unwrap();
        assert_eq!(sm.current(), RotationState::Failed);
        sm.fire(Event::Reset).unwrap();
        assert_eq!(sm.current(), RotationState::Idle);
    }

    #[test]
    fn journal_is_bounded() {
        let sm = StateMachine::new();
        for _ in 0..1500 {
            let _ = sm.fire(Event::Start);
            let _ = sm.fire(Event::Reset);
        }
        assert!(sm.journal().len() <= 1000);
    }

    #[test]
    fn rollback_path_returns_to_idle() {
        let sm = StateMachine::new();
        sm.fire(Event::Start).unwrap();
        sm.fire(Event::CheckFailed).unwrap();
        assert_eq!(sm.current(), RotationState::Failed);
        sm.fire(Event::Rollback).unwrap();
        assert_eq!(sm.current(), RotationState::Rollback);
        sm.fire(Event::Complete).unwrap();
        assert_eq!(sm.current(), RotationState::Idle);
    }

    #[test]
    fn transition_callback_fires() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        let sm = StateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        sm.set_transition_callback(Arc::new(move |_entry| {
            count2.fetch_add(1, Ordering::Relaxed);
        }));
        sm.fire(Event::Start).unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
