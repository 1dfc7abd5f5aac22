//! One-shot completion handle for asynchronous calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::Dynamic;
use crate::error::CallError;

/// Outcome delivered through a [`Completion`].
pub type CallOutcome = Result<Dynamic, CallError>;

enum State {
    Pending,
    Ready(CallOutcome),
    Observed,
    Abandoned,
}

struct Inner {
    state: Mutex<State>,
    ready: Condvar,
}

/// A one-shot channel carrying the result of a long-running call.
///
/// The first [`complete`](Completion::complete) wins; later calls return
/// `false` and drop their value. The result can be taken exactly once.
/// Once [`abandon`](Completion::abandon)ed, the handle silently drops any
/// late result.
///
/// Clones share the same slot, so the worker and the caller each hold one.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    /// Create a pending completion.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending),
                ready: Condvar::new(),
            }),
        }
    }

    /// Deliver the outcome. Returns `false` if the handle was already
    /// completed or abandoned.
    pub fn complete(&self, outcome: CallOutcome) -> bool {
        let mut state = self.inner.state.lock();
        match *state {
            State::Pending => {
                *state = State::Ready(outcome);
                self.inner.ready.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Drop interest in the outcome. Any value already delivered is
    /// discarded along with future ones.
    pub fn abandon(&self) {
        let mut state = self.inner.state.lock();
        *state = State::Abandoned;
        self.inner.ready.notify_all();
    }

    /// Take the outcome if it has arrived. Returns `Some` at most once.
    pub fn try_take(&self) -> Option<CallOutcome> {
        let mut state = self.inner.state.lock();
        Self::take_ready(&mut state)
    }

    /// Block until the outcome arrives or `timeout` elapses, then take it.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<CallOutcome> {
        let mut state = self.inner.state.lock();
        if matches!(*state, State::Pending) {
            let _ = self
                .inner
                .ready
                .wait_while_for(&mut state, |s| matches!(s, State::Pending), timeout);
        }
        Self::take_ready(&mut state)
    }

    /// Check whether the outcome has not arrived yet.
    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Pending)
    }

    /// Check whether the handle was abandoned.
    pub fn is_abandoned(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Abandoned)
    }

    fn take_ready(state: &mut State) -> Option<CallOutcome> {
        match std::mem::replace(state, State::Observed) {
            State::Ready(outcome) => Some(outcome),
            other => {
                *state = other;
                None
            }
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.inner.state.lock() {
            State::Pending => "Pending",
            State::Ready(_) => "Ready",
            State::Observed => "Observed",
            State::Abandoned => "Abandoned",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}
