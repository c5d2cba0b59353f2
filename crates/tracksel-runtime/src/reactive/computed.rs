#![forbid(unsafe_code)]

//! Lazy computed values whose dependencies are discovered by tracking.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a [`Selector`] and its cached result in shared,
//! reference-counted storage. Each recomputation resolves the selector with
//! [`track_selector`], which records exactly the nodes read on that pass and
//! wires a listener to them; the previous pass's listener is disposed first.
//! Dependencies may therefore change from one pass to the next.
//!
//! A `Computed` owns a [`Node`] of its own. Reading it with
//! [`get`](Computed::get) inside another evaluation records that node, and
//! the node is notified when the cached value becomes stale, so computed
//! values compose.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value older than the last completed write to
//!    any dependency read on the previous pass.
//! 2. The selector runs at most once per dependency change cycle.
//! 3. Version increments by exactly 1 per recomputation.
//! 4. The node is notified on the clean-to-dirty transition only.
//!
//! # Failure Modes
//!
//! - **Selector panics**: the cached value remains from the last successful
//!   pass, the dirty flag stays set, and the tracking frame is popped. The
//!   next `get()` retries.
//! - **Linked observable**: a [`Selector::Linked`] result is followed; the
//!   linked observable becomes an extra dependency.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracksel_core::{Disposer, ListenerParams, Node, NodeSource, Observable, UpdateFn};

use super::resolver::{ObserveOptions, track_selector};
use super::selector::Selector;

struct ComputedInner<T> {
    node: Node,
    selector: Selector<T>,
    /// Cached result (None only before the first computation).
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    dependencies: Cell<usize>,
    /// Listener on the previous pass's dependency set.
    dispose: RefCell<Option<Disposer>>,
}

impl<T> ComputedInner<T> {
    fn mark_dirty(&self) {
        if !self.dirty.replace(true) {
            self.node.notify();
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.get_mut().take() {
            dispose.dispose();
        }
    }
}

/// A lazily-evaluated, memoized value derived from whatever observables its
/// selector reads.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .field("dependencies", &self.inner.dependencies.get())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value from an arbitrary selector.
    pub fn from_selector(selector: Selector<T>) -> Self {
        Self {
            inner: Rc::new(ComputedInner {
                node: Node::new(),
                selector,
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                version: Cell::new(0),
                dependencies: Cell::new(0),
                dispose: RefCell::new(None),
            }),
        }
    }

    /// Create a computed value from a derivation function. Every observable
    /// the function reads with `get` becomes a dependency.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::from_selector(Selector::from_fn(compute))
    }

    /// Create a computed value derived from a single observable.
    pub fn from_observable<S: Clone + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let source = source.clone();
        Self::new(move || source.with(|v| map(v)))
    }

    /// Create a computed value derived from two observables.
    pub fn from2<S1, S2>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        map: impl Fn(&S1, &S2) -> T + 'static,
    ) -> Self
    where
        S1: Clone + 'static,
        S2: Clone + 'static,
    {
        let s1 = s1.clone();
        let s2 = s2.clone();
        Self::new(move || s1.with(|v1| s2.with(|v2| map(v1, v2))))
    }

    fn refresh(&self) {
        let inner = &self.inner;
        if !inner.dirty.get() && inner.cached.borrow().is_some() {
            return;
        }

        let previous = inner.dispose.borrow_mut().take();
        if let Some(previous) = previous {
            previous.dispose();
        }

        let weak = Rc::downgrade(inner);
        let update: UpdateFn = Rc::new(move |_: &ListenerParams| {
            if let Some(inner) = weak.upgrade() {
                inner.mark_dirty();
            }
        });

        let options = ObserveOptions {
            from_computed: true,
            immediate: false,
        };
        let tracked = track_selector(&inner.selector, Rc::clone(&update), None, options, false);

        let mut dependencies = tracked.nodes.len();
        let mut disposers: Vec<Disposer> = tracked.dispose.into_iter().collect();
        if let Some(linked) = &tracked.linked {
            dependencies += 1;
            disposers.push(linked.node().subscribe(update));
        }

        *inner.cached.borrow_mut() = Some(tracked.value);
        *inner.dispose.borrow_mut() = Some(Disposer::all(disposers));
        inner.dependencies.set(dependencies);
        inner.dirty.set(false);
        inner.version.set(inner.version.get() + 1);
    }

    /// Get the current value, recomputing if any dependency has changed.
    /// Records a read of this computed's node.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.node.track_read();
        self.peek()
    }

    /// Like [`get`](Self::get), without recording a read.
    #[must_use]
    pub fn peek(&self) -> T {
        self.refresh();
        self.inner
            .cached
            .borrow()
            .clone()
            .unwrap_or_else(|| unreachable!("refresh always caches a value"))
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure forces a recomputation of this same `Computed`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.node.track_read();
        self.refresh();
        let cached = self.inner.cached.borrow();
        match cached.as_ref() {
            Some(value) => f(value),
            None => unreachable!("refresh always caches a value"),
        }
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force invalidation of the cached value. The next `get()` will
    /// recompute.
    pub fn invalidate(&self) {
        self.inner.mark_dirty();
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Size of the dependency set recorded on the last pass.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.get()
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        &self.inner.node
    }
}

impl<T: Clone + 'static> NodeSource for Computed<T> {
    fn node(&self) -> &Node {
        &self.inner.node
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
