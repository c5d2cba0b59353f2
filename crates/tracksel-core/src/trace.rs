#![forbid(unsafe_code)]

//! Development-only trace hooks carried on a tracking frame.
//!
//! Hooks are attached either when the frame is opened
//! ([`begin_tracking`](crate::tracking::begin_tracking)) or from inside a
//! running evaluation via [`trace_listeners`] / [`trace_updates`]. Consumers
//! take them off the frame before use so they never leak into a later
//! evaluation, and only run them when
//! [`ExecutionMode::is_debug`](crate::config::ExecutionMode::is_debug).

use std::fmt;

use crate::node::UpdateFn;
use crate::tracking::{TrackedNodes, with_active_frame};

/// Receives the dependency set recorded by the frame.
pub type TraceListenersFn = Box<dyn FnOnce(&TrackedNodes)>;
/// Wraps the update callback before it is wired to the dependency set.
pub type TraceUpdatesFn = Box<dyn FnOnce(UpdateFn) -> UpdateFn>;

/// Optional instrumentation for one tracking frame.
#[derive(Default)]
pub struct TraceHooks {
    pub listeners: Option<TraceListenersFn>,
    pub updates: Option<TraceUpdatesFn>,
}

impl TraceHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_listeners(mut self, hook: impl FnOnce(&TrackedNodes) + 'static) -> Self {
        self.listeners = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_updates(mut self, hook: impl FnOnce(UpdateFn) -> UpdateFn + 'static) -> Self {
        self.updates = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_none() && self.updates.is_none()
    }

    /// Move the hooks out, leaving this set empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Run the listeners hook against `nodes` and pass `update` through the
    /// updates hook. Consumes the hooks.
    pub fn apply(self, nodes: &TrackedNodes, update: UpdateFn) -> UpdateFn {
        if let Some(listeners) = self.listeners {
            listeners(nodes);
        }
        match self.updates {
            Some(wrap) => wrap(update),
            None => update,
        }
    }
}

impl fmt::Debug for TraceHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHooks")
            .field("listeners", &self.listeners.is_some())
            .field("updates", &self.updates.is_some())
            .finish()
    }
}

/// Attach a listeners hook to the innermost active frame.
///
/// Returns `false` when no frame is active.
pub fn trace_listeners(hook: impl FnOnce(&TrackedNodes) + 'static) -> bool {
    with_active_frame(|frame| frame.hooks_mut().listeners = Some(Box::new(hook))).is_some()
}

/// Attach an updates hook to the innermost active frame.
///
/// Returns `false` when no frame is active.
pub fn trace_updates(hook: impl FnOnce(UpdateFn) -> UpdateFn + 'static) -> bool {
    with_active_frame(|frame| frame.hooks_mut().updates = Some(Box::new(hook))).is_some()
}
