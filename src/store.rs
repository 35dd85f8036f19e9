//! The store contract consumed by the dispatch pipeline.

use crate::types::Action;
use serde_json::Value;
use tracing::trace;

/// An authoritative state container.
///
/// `dispatch` must settle every state change the action causes before
/// returning; the pipeline reads the post-state right after it.
pub trait Store {
    /// Snapshot of the current state. Must not have side effects.
    fn get_state(&self) -> Value;

    /// Run an action. `None` is forwarded untouched by the pipeline's
    /// escape hatch; the store decides what it means.
    fn dispatch(&mut self, action: Option<&Action>);
}

/// An in-memory store driven by a reducer function.
pub struct ReducerStore<R> {
    state: Value,
    reducer: R,
}

impl<R> ReducerStore<R>
where
    R: FnMut(&Value, &Action) -> Value,
{
    /// Create a store with an initial state.
    pub fn new(reducer: R, initial_state: Value) -> Self {
        Self {
            state: initial_state,
            reducer,
        }
    }

    /// Borrow the current state without cloning.
    pub fn state(&self) -> &Value {
        &self.state
    }
}

impl<R> Store for ReducerStore<R>
where
    R: FnMut(&Value, &Action) -> Value,
{
    fn get_state(&self) -> Value {
        self.state.clone()
    }

    fn dispatch(&mut self, action: Option<&Action>) {
        match action {
            Some(action) => self.state = (self.reducer)(&self.state, action),
            None => trace!("empty dispatch ignored"),
        }
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn get_state(&self) -> Value {
        (**self).get_state()
    }

    fn dispatch(&mut self, action: Option<&Action>) {
        (**self).dispatch(action)
    }
}
