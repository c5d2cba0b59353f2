#![forbid(unsafe_code)]

//! Typed observable storage on top of a [`Node`].
//!
//! # Design
//!
//! `Observable<T>` pairs a value in `Rc<..>` shared storage with the [`Node`]
//! that identifies it in dependency sets. Cloning an `Observable` creates a
//! new handle to the **same** cell.
//!
//! # Invariants
//!
//! 1. [`get`](Observable::get) and [`with`](Observable::with) record a read
//!    in the active tracking frame; [`peek`](Observable::peek) never does.
//! 2. [`set`](Observable::set) and [`update`](Observable::update) with a value
//!    equal to the current one are no-ops (no version bump, no notification).
//! 3. [`replace`](Observable::replace) and [`modify`](Observable::modify)
//!    always notify.
//! 4. The value is written before listeners run, and no borrow is held while
//!    they run, so a listener may read or write the same observable.
//! 5. [`on_change`](Observable::on_change) callbacks of one notification all
//!    see the value that write produced, even if an earlier callback wrote
//!    again in the meantime.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::node::{ListenerParams, Node, NodeSource};
use crate::subscription::{Disposer, Subscription};

struct ObservableInner<T> {
    node: Node,
    value: RefCell<T>,
    /// Values of the notifications in flight, keyed by the version each
    /// notification delivers. Innermost last.
    delivering: RefCell<Vec<(u64, Rc<T>)>>,
}

impl<T> ObservableInner<T> {
    fn delivered(&self, version: u64) -> Option<Rc<T>> {
        self.delivering
            .borrow()
            .iter()
            .rev()
            .find(|(v, _)| *v == version)
            .map(|(_, value)| Rc::clone(value))
    }
}

/// Pops the in-flight snapshot on every exit path, including unwinding.
struct Delivering<'a, T> {
    stack: &'a RefCell<Vec<(u64, Rc<T>)>>,
}

impl<T> Drop for Delivering<'_, T> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// A shared, version-tracked value with change notification.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("node", &self.inner.node.id())
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.node.version())
            .finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                node: Node::new(),
                value: RefCell::new(value),
                delivering: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The node identifying this observable in dependency sets.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    /// Number of notifying writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.node.version()
    }

    /// Current value; records a read in the active tracking frame.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.node.track_read();
        self.inner.value.borrow().clone()
    }

    /// Current value without recording a read.
    #[must_use]
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value; records a read.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.node.track_read();
        f(&*self.inner.value.borrow())
    }

    /// Borrow the current value without recording a read.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same observable.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Notify listeners, pinning the current value for this notification.
    fn notify(&self) {
        let inner = &self.inner;
        if inner.node.listener_count() == 0 {
            inner.node.notify();
            return;
        }
        let snapshot = Rc::new(inner.value.borrow().clone());
        inner
            .delivering
            .borrow_mut()
            .push((inner.node.version() + 1, snapshot));
        let _delivering = Delivering {
            stack: &inner.delivering,
        };
        inner.node.notify();
    }

    /// Store `value` and notify unconditionally.
    pub fn replace(&self, value: T) -> T {
        let previous = self.inner.value.replace(value);
        self.notify();
        previous
    }

    /// Mutate in place and notify unconditionally.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut *self.inner.value.borrow_mut());
        self.notify();
    }

    /// Call `callback` with the new value after every notifying write.
    ///
    /// The callback receives the value written by the write that triggered
    /// it, captured once when that write notified. A notification raised on
    /// the node directly delivers the value current at call time.
    pub fn on_change(&self, callback: impl Fn(&T) + 'static) -> Disposer {
        let weak: Weak<ObservableInner<T>> = Rc::downgrade(&self.inner);
        self.inner.node.on_change(move |params: &ListenerParams| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match inner.delivered(params.version) {
                Some(snapshot) => callback(&snapshot),
                None => {
                    let current = inner.value.borrow().clone();
                    callback(&current);
                }
            }
        })
    }

    /// Like [`on_change`](Self::on_change), but unsubscribes when the returned
    /// guard is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.on_change(callback).into_subscription()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Store `value`, notifying only if it differs from the current value.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.notify();
    }

    /// Compute the next value from the current one, then [`set`](Self::set) it.
    pub fn update(&self, updater: impl FnOnce(&T) -> T) {
        let next = updater(&*self.inner.value.borrow());
        self.set(next);
    }
}

impl<T: Clone + 'static> NodeSource for Observable<T> {
    fn node(&self) -> &Node {
        &self.inner.node
    }
}

impl<T: Clone + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::track;
    use std::cell::Cell;

    #[test]
    fn set_notifies_and_bumps_version() {
        let obs = Observable::new(1);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _d = obs.on_change(move |v| s.set(*v));

        obs.set(5);
        assert_eq!(seen.get(), 5);
        assert_eq!(obs.version(), 1);
        assert_eq!(obs.peek(), 5);
    }

    #[test]
    fn equal_set_is_noop() {
        let obs = Observable::new(3);
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let _d = obs.on_change(move |_| c.set(c.get() + 1));

        obs.set(3);
        obs.update(|v| *v);
        assert_eq!(calls.get(), 0);
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn update_uses_current_value() {
        let obs = Observable::new(10);
        obs.update(|v| v * 2);
        assert_eq!(obs.peek(), 20);
    }

    #[test]
    fn replace_and_modify_always_notify() {
        let obs = Observable::new(vec![1]);
        let calls = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&calls);
        let _d = obs.on_change(move |_| c.set(c.get() + 1));

        let old = obs.replace(vec![1]);
        assert_eq!(old, vec![1]);
        obs.modify(|v| v.push(2));
        assert_eq!(calls.get(), 2);
        assert_eq!(obs.peek(), vec![1, 2]);
    }

    #[test]
    fn get_is_tracked_peek_is_not() {
        let a = Observable::new(1);
        let b = Observable::new(2);
        let (sum, frame) = track(|| a.get() + b.peek());
        assert_eq!(sum, 3);
        assert!(frame.nodes().contains(a.node().id()));
        assert!(!frame.nodes().contains(b.node().id()));

        let (len, frame) = track(|| b.with(|v| *v));
        assert_eq!(len, 2);
        assert!(frame.nodes().contains(b.node().id()));
    }

    #[test]
    fn listener_may_write_back() {
        let obs = Observable::new(0);
        let writer = obs.clone();
        let _d = obs.on_change(move |v| {
            if *v < 3 {
                writer.set(v + 1);
            }
        });
        obs.set(1);
        assert_eq!(obs.peek(), 3);
    }

    #[test]
    fn later_listeners_see_the_value_of_their_own_write() {
        let obs = Observable::new(0);
        let writer = obs.clone();
        let _first = obs.on_change(move |v| {
            if *v == 1 {
                writer.set(2);
            }
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _second = obs.on_change(move |v| s.borrow_mut().push(*v));

        obs.set(1);
        // The nested write's notification completes first.
        assert_eq!(*seen.borrow(), vec![2, 1]);
        assert_eq!(obs.peek(), 2);
        assert!(obs.inner.delivering.borrow().is_empty());
    }

    #[test]
    fn in_flight_value_is_released_when_a_listener_panics() {
        let obs = Observable::new(0);
        let _d = obs.on_change(|v| assert!(*v < 5, "too large"));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| obs.set(9)));
        assert!(result.is_err());
        assert!(obs.inner.delivering.borrow().is_empty());
    }

    #[test]
    fn peek_with_is_untracked() {
        let obs = Observable::new(vec![1, 2, 3]);
        let (len, frame) = track(|| obs.peek_with(Vec::len));
        assert_eq!(len, 3);
        assert!(frame.nodes().is_empty());
    }

    #[test]
    fn subscription_guard_unsubscribes_on_drop() {
        let obs = Observable::new(0);
        let calls = Rc::new(Cell::new(0u32));
        {
            let c = Rc::clone(&calls);
            let _sub = obs.subscribe(move |_| c.set(c.get() + 1));
            obs.set(1);
        }
        obs.set(2);
        assert_eq!(calls.get(), 1);
        assert_eq!(obs.node().listener_count(), 0);
    }

    #[test]
    fn clone_shares_state() {
        let a = Observable::new(String::from("x"));
        let b = a.clone();
        b.set(String::from("y"));
        assert_eq!(a.peek(), "y");
        assert_eq!(a.node(), b.node());
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
    }
}
