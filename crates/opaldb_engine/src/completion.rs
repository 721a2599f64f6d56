//! One-shot completion handles.
//!
//! Every asynchronous engine operation hands back a [`Completion`]. The
//! engine keeps the paired [`Signal`] and settles it exactly once; the
//! consumer registers a single callback with [`Completion::on_settle`].
//! Registration and settling may happen in either order - an engine that
//! finishes synchronously simply settles before the consumer registers, and
//! the stored outcome is delivered at registration time.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::sync::Arc;

type Callback<T> = Box<dyn FnOnce(EngineResult<T>) + Send>;

enum State<T> {
    /// Neither side has acted yet.
    Pending,
    /// Consumer registered first; callback waits for the signal.
    Waiting(Callback<T>),
    /// Engine settled first; outcome waits for registration.
    Settled(EngineResult<T>),
    /// Outcome delivered to the callback.
    Delivered,
}

/// The consumer half of a completion handle.
///
/// Dropping a `Completion` without registering a callback discards the
/// outcome. Dropping the [`Signal`] without settling leaves a registered
/// callback uninvoked; the bridge in `opaldb_core` maps that case to
/// [`EngineError::Disconnected`].
pub struct Completion<T> {
    state: Arc<Mutex<State<T>>>,
}

/// The engine half of a completion handle.
pub struct Signal<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T: Send + 'static> Completion<T> {
    /// Creates a pending completion and its settling half.
    #[must_use]
    pub fn channel() -> (Self, Signal<T>) {
        let state = Arc::new(Mutex::new(State::Pending));
        (
            Self {
                state: Arc::clone(&state),
            },
            Signal { state },
        )
    }

    /// Creates a completion that is already settled with `result`.
    #[must_use]
    pub fn settled(result: EngineResult<T>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Settled(result))),
        }
    }

    /// Creates a completion that is already settled with `error`.
    #[must_use]
    pub fn failed(error: EngineError) -> Self {
        Self::settled(Err(error))
    }

    /// Registers the callback that receives the outcome.
    ///
    /// If the engine has already settled, the callback runs immediately on
    /// the current call stack. Consuming `self` guarantees at most one
    /// registration per handle.
    pub fn on_settle(self, callback: impl FnOnce(EngineResult<T>) + Send + 'static) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Delivered) {
            State::Pending => {
                *state = State::Waiting(Box::new(callback));
            }
            State::Settled(result) => {
                drop(state);
                callback(result);
            }
            // A handle is consumed on registration and a signal on settling,
            // so these states cannot be observed here again.
            State::Waiting(_) | State::Delivered => {}
        }
    }
}

impl<T: Send + 'static> Signal<T> {
    /// Settles the completion with a success result.
    pub fn success(self, value: T) {
        self.settle(Ok(value));
    }

    /// Settles the completion with a failure.
    pub fn failure(self, error: EngineError) {
        self.settle(Err(error));
    }

    fn settle(self, result: EngineResult<T>) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Delivered) {
            State::Pending => {
                *state = State::Settled(result);
            }
            State::Waiting(callback) => {
                drop(state);
                callback(result);
            }
            State::Settled(_) | State::Delivered => {}
        }
    }
}
