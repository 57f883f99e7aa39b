use sea_query::{LockBehavior, LockType, SelectStatement};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a lock acquisition does when the row is already held
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitDiscipline {
    /// Queue behind the holder, optionally bounded by a timeout.
    /// `SELECT ... FOR UPDATE`
    #[default]
    Blocking,
    /// Fail immediately. `SELECT ... FOR UPDATE NOWAIT`
    NoWait,
    /// Pass over the row; meant for walking many candidates and taking
    /// whichever is free. `SELECT ... FOR UPDATE SKIP LOCKED`
    Skip,
}

impl WaitDiscipline {
    /// The modifier appended after `FOR UPDATE`
    pub fn lock_behavior(&self) -> Option<LockBehavior> {
        match self {
            Self::Blocking => None,
            Self::NoWait => Some(LockBehavior::Nowait),
            Self::Skip => Some(LockBehavior::SkipLocked),
        }
    }

    /// Whether an acquisition may suspend the caller
    pub fn may_wait(&self) -> bool {
        matches!(self, Self::Blocking)
    }

    /// Add the exclusive row lock clause to a select
    pub fn apply(&self, stmt: &mut SelectStatement) {
        match self.lock_behavior() {
            None => stmt.lock_exclusive(),
            Some(behavior) => stmt.lock_with_behavior(LockType::Update, behavior),
        };
    }
}

/// How a single exclusive row lock should be acquired
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LockRequest {
    pub discipline: WaitDiscipline,
    /// Wait budget for [WaitDiscipline::Blocking]; ignored otherwise
    pub timeout: Option<Duration>,
}

impl LockRequest {
    pub fn blocking() -> Self {
        Self::default()
    }

    pub fn blocking_for(timeout: Duration) -> Self {
        Self {
            discipline: WaitDiscipline::Blocking,
            timeout: Some(timeout),
        }
    }

    pub fn no_wait() -> Self {
        Self {
            discipline: WaitDiscipline::NoWait,
            timeout: None,
        }
    }

    pub fn skip_locked() -> Self {
        Self {
            discipline: WaitDiscipline::Skip,
            timeout: None,
        }
    }

    /// The bound that actually applies to this request
    pub fn wait_budget(&self) -> Option<Duration> {
        if self.discipline.may_wait() {
            self.timeout
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discipline_to_behavior() {
        assert_eq!(WaitDiscipline::default(), WaitDiscipline::Blocking);
        assert_eq!(WaitDiscipline::Blocking.lock_behavior(), None);
        assert_eq!(
            WaitDiscipline::NoWait.lock_behavior(),
            Some(LockBehavior::Nowait)
        );
        assert_eq!(
            WaitDiscipline::Skip.lock_behavior(),
            Some(LockBehavior::SkipLocked)
        );
    }

    #[test]
    fn budget_only_applies_to_blocking() {
        let budget = Duration::from_millis(50);
        assert_eq!(LockRequest::blocking_for(budget).wait_budget(), Some(budget));
        assert_eq!(LockRequest::blocking().wait_budget(), None);

        let no_wait = LockRequest {
            timeout: Some(budget),
            ..LockRequest::no_wait()
        };
        assert_eq!(no_wait.wait_budget(), None);
    }
}
