//! Cooperative cancellation for long-running passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    deadline: Mutex<Option<Instant>>,
    parent: Option<CancelToken>,
}

/// A shared cancellation flag with an optional deadline.
///
/// Clones observe the same state. Workers poll [`CancelToken::is_cancelled`]
/// and stop without producing partial output. A [`CancelToken::child`] fires
/// with its parent but its own deadline and flag never reach the parent.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Creates a token that never fires on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that fires once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        token.set_deadline(Instant::now() + timeout);
        token
    }

    /// Creates a token that fires when `self` fires or on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(CancelState {
                parent: Some(self.clone()),
                ..CancelState::default()
            }),
        }
    }

    /// Sets or replaces the deadline.
    pub fn set_deadline(&self, deadline: Instant) {
        *self.state.deadline.lock() = Some(deadline);
    }

    /// Deadline set on this token, if any. Parent deadlines are not included.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        *self.state.deadline.lock()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancelled, past the deadline, or the parent fired.
    ///
    /// Passing the deadline does not latch: moving it later revives the token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::Acquire) {
            return true;
        }
        let expired = self
            .state
            .deadline
            .lock()
            .is_some_and(|deadline| Instant::now() >= deadline);
        expired || self.state.parent.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_deadline_fires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.deadline().is_some());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_deadline_does_not_latch() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        token.set_deadline(Instant::now() + Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_does_not_touch_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.set_deadline(Instant::now());
        assert!(child.is_cancelled());
        child.cancel();
        assert!(!parent.is_cancelled());
        assert_eq!(parent.deadline(), None);
    }

    #[test]
    fn test_far_deadline_does_not_fire() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
