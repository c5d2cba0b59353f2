#![forbid(unsafe_code)]

//! Selector resolution: value plus dependency set plus live subscription.
//!
//! # Pipeline
//!
//! 1. An `Observable` selector is peeked and subscribed directly; its node is
//!    the whole dependency set and no frame is opened.
//! 2. Any other selector is evaluated inside its own [`TrackingScope`]. The
//!    frame's trace hooks are taken off it and, in a debug
//!    [`ExecutionMode`](tracksel_core::ExecutionMode), run once.
//! 3. If the evaluation cancelled its [`ObserveEvent`], no subscription is
//!    created.
//! 4. Otherwise the dependency set and the (possibly trace-wrapped) update
//!    callback go to [`setup_tracking`].
//!
//! Each call is a clean begin/evaluate/end cycle; dependency sets from
//! earlier calls are never diffed against.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracksel_core::{
    Disposer, Node, Observable, TraceHooks, TrackedNodes, TrackingConfig, TrackingScope, UpdateFn,
};

use super::selector::{Computation, ObserveEvent, Selector, compute_selector};
use super::setup::setup_tracking;

/// Options forwarded to selector evaluation and listener setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Keep an observable produced by the selector instead of reading it.
    pub from_computed: bool,
    /// Invoke the update callback once right after wiring.
    pub immediate: bool,
}

/// Rebind path for a resolved selector.
///
/// Rebinding after the primary handle was disposed is well defined: it
/// creates a fresh subscription on the originally recorded dependency set.
#[derive(Clone)]
pub struct Resubscribe {
    rebind: Rc<dyn Fn() -> Disposer>,
}

impl Resubscribe {
    /// Attach again and return the new handle.
    pub fn rebind(&self) -> Disposer {
        (self.rebind)()
    }

    /// Rebind by running listener setup again, never firing immediately.
    fn tracked(nodes: TrackedNodes, update: UpdateFn) -> Self {
        Self {
            rebind: Rc::new(move || setup_tracking(Some(&nodes), Rc::clone(&update), false, false)),
        }
    }

    /// Second subscription on a single node, established eagerly. `rebind`
    /// hands out that live handle, re-subscribing only once it was disposed.
    fn attached(node: Node, update: UpdateFn) -> Self {
        let live = RefCell::new(node.subscribe(Rc::clone(&update)));
        Self {
            rebind: Rc::new(move || {
                let mut live = live.borrow_mut();
                if live.is_disposed() {
                    *live = node.subscribe(Rc::clone(&update));
                }
                live.clone()
            }),
        }
    }
}

impl fmt::Debug for Resubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resubscribe(..)")
    }
}

/// Output of [`track_selector`].
///
/// `value` is a snapshot taken at call time; later changes surface only
/// through the update callback.
#[derive(Debug)]
pub struct TrackedSelector<T> {
    pub value: T,
    /// Observable the selector linked to, when evaluated `from_computed`.
    pub linked: Option<Observable<T>>,
    /// Primary subscription. `None` when the evaluation was cancelled.
    pub dispose: Option<Disposer>,
    /// Independent rebind path, when requested and not cancelled.
    pub resubscribe: Option<Resubscribe>,
    /// Nodes the value was derived from.
    pub nodes: TrackedNodes,
    pub cancelled: bool,
}

impl<T> TrackedSelector<T> {
    /// Dispose the primary subscription, if any.
    pub fn dispose(&self) {
        if let Some(dispose) = &self.dispose {
            dispose.dispose();
        }
    }
}

/// Resolve `selector` and subscribe `update` to everything it read.
///
/// `observe_event` is handed to function selectors; its cancel flag decides
/// whether a subscription is created. With `create_resubscribe`, the result
/// also carries a [`Resubscribe`] for detach/reattach cycles.
///
/// A panic inside the selector propagates after the tracking frame has been
/// popped.
pub fn track_selector<T: Clone + 'static>(
    selector: &Selector<T>,
    update: UpdateFn,
    mut observe_event: Option<&mut ObserveEvent<T>>,
    options: ObserveOptions,
    create_resubscribe: bool,
) -> TrackedSelector<T> {
    if let Selector::Observable(obs) = selector {
        let mut nodes = TrackedNodes::new();
        nodes.record(obs.node());
        let dispose = obs.node().subscribe(Rc::clone(&update));
        let resubscribe =
            create_resubscribe.then(|| Resubscribe::attached(obs.node().clone(), update));
        tracing::trace!(
            message = "selector.resolve",
            kind = "observable",
            node = obs.node().id().get()
        );
        return TrackedSelector {
            value: obs.peek(),
            linked: None,
            dispose: Some(dispose),
            resubscribe,
            nodes,
            cancelled: false,
        };
    }

    let scope = TrackingScope::begin(TraceHooks::default());
    let computation = compute_selector(
        selector,
        observe_event.as_deref_mut(),
        options.from_computed,
    );
    let (nodes, hooks) = scope.finish().into_parts();

    let update = if TrackingConfig::current().mode.is_debug() && !hooks.is_empty() {
        hooks.apply(&nodes, update)
    } else {
        update
    };

    let (value, linked) = match computation {
        Computation::Value(value) => (value, None),
        Computation::Linked(obs) => (obs.peek(), Some(obs)),
    };

    let cancelled = observe_event.is_some_and(|event| event.is_cancelled());
    tracing::trace!(
        message = "selector.resolve",
        kind = "tracked",
        dependencies = nodes.len(),
        cancelled
    );
    if cancelled {
        return TrackedSelector {
            value,
            linked,
            dispose: None,
            resubscribe: None,
            nodes,
            cancelled,
        };
    }

    let dispose = setup_tracking(Some(&nodes), Rc::clone(&update), false, options.immediate);
    let resubscribe = create_resubscribe.then(|| Resubscribe::tracked(nodes.clone(), update));

    TrackedSelector {
        value,
        linked,
        dispose: Some(dispose),
        resubscribe,
        nodes,
        cancelled,
    }
}
