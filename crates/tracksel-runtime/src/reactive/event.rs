#![forbid(unsafe_code)]

//! Versioned fire-and-forget notifications.
//!
//! An [`Event`] is one observable holding `{ count, data }` whose node is
//! flagged `is_event`. Every fire increments `count` by exactly one and
//! notifies exactly once; `data` is whatever the most recent fire left.

use std::fmt;

use tracksel_core::{Disposer, Node, NodeSource, Observable};

/// State held by an event's observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventState<T> {
    pub count: u64,
    pub data: Option<T>,
}

impl<T> Default for EventState<T> {
    fn default() -> Self {
        Self {
            count: 0,
            data: None,
        }
    }
}

/// Monotonically versioned notification channel with an optional payload.
///
/// Cloning an `Event` creates a new handle to the same channel.
pub struct Event<T> {
    state: Observable<EventState<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.state).finish()
    }
}

impl<T: Clone + 'static> Event<T> {
    pub fn new() -> Self {
        let state = Observable::new(EventState::default());
        state.node().mark_event();
        Self { state }
    }

    /// Bump the count, keeping the previous payload.
    pub fn fire(&self) {
        tracing::debug!(message = "event.fire", count = self.peek() + 1);
        self.state.modify(|state| state.count += 1);
    }

    /// Bump the count and replace the payload.
    pub fn fire_with(&self, data: T) {
        tracing::debug!(message = "event.fire", count = self.peek() + 1, payload = true);
        self.state.modify(|state| {
            state.count += 1;
            state.data = Some(data);
        });
    }

    /// Call `callback` with the payload of every future fire.
    pub fn on(&self, callback: impl Fn(Option<&T>) + 'static) -> Disposer {
        self.state.on_change(move |state| callback(state.data.as_ref()))
    }

    /// Number of fires so far; records a read in the active tracking frame.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.state.with(|state| state.count)
    }

    /// Number of fires so far, untracked.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.state.peek_with(|state| state.count)
    }

    /// Payload left by the most recent fire, untracked.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.state.peek().data
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        self.state.node()
    }
}

impl<T: Clone + 'static> NodeSource for Event<T> {
    fn node(&self) -> &Node {
        self.state.node()
    }
}

impl<T: Clone + 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}
