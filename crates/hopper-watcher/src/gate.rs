//! The lifecycle lock.
//!
//! Start, Stop and every callback that can fire on its own (timer ticks,
//! OS notifications, locked-file retries) go through this one mutex. A
//! callback only acts if the watcher is started *and* the session it
//! belongs to hasn't been cancelled, so a late callback from a previous
//! session can never poke the current one.

use hopper_core::WatcherState;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<WatcherState>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes the lock. Callers flip the state while holding the guard.
    pub(crate) fn lock(&self) -> MutexGuard<'_, WatcherState> {
        // A panicking consumer is caught before it can poison us, but
        // don't let a poisoned lock wedge Stop either
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> WatcherState {
        *self.lock()
    }

    /// Runs `f` under the lock if the session owning `scope` is live.
    ///
    /// Returns `None` without calling `f` once Stop has begun.
    pub(crate) fn run_if_live<R>(&self, scope: &CancellationToken, f: impl FnOnce() -> R) -> Option<R> {
        let state = self.lock();
        if state.is_started() && !scope.is_cancelled() {
            Some(f())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_ignored_while_stopped() {
        let gate = Gate::new();
        let scope = CancellationToken::new();
        assert_eq!(gate.run_if_live(&scope, || 1), None);
    }

    #[test]
    fn test_callbacks_run_while_started() {
        let gate = Gate::new();
        let scope = CancellationToken::new();
        *gate.lock() = WatcherState::Started;
        assert_eq!(gate.run_if_live(&scope, || 1), Some(1));
    }

    #[test]
    fn test_stale_session_is_ignored() {
        let gate = Gate::new();
        let old = CancellationToken::new();
        old.cancel();

        // A new session started after the old one was cancelled
        *gate.lock() = WatcherState::Started;
        assert_eq!(gate.run_if_live(&old, || 1), None);
    }
}
