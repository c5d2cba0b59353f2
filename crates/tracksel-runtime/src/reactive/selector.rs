#![forbid(unsafe_code)]

//! Selectors and their evaluation.
//!
//! A [`Selector`] is resolved at construction into one of four capabilities:
//! an observable reference, a derivation function, a function producing an
//! observable to link to, or a plain value with no dependencies.
//! [`compute_selector`] evaluates it once; callers wanting the dependency set
//! wrap that evaluation in a tracking scope (see
//! [`track_selector`](super::resolver::track_selector)).

use std::fmt;
use std::rc::Rc;

use tracksel_core::Observable;

/// Derivation function. Receives the observe event of the current pass.
pub type SelectorFn<T> = Rc<dyn Fn(&mut ObserveEvent<T>) -> T>;
/// Function returning the observable a computed value should link to.
pub type LinkFn<T> = Rc<dyn Fn(&mut ObserveEvent<T>) -> Observable<T>>;

/// Source of a value and, when reactive, of a dependency set.
pub enum Selector<T> {
    /// Dependency is the observable itself; no evaluation needed.
    Observable(Observable<T>),
    /// Dependencies are discovered by running the function.
    Function(SelectorFn<T>),
    /// Like `Function`, but yields an observable. Read through unless the
    /// caller is a computed value that wants the link itself.
    Linked(LinkFn<T>),
    /// Plain value. Never has dependencies.
    Value(T),
}

impl<T: Clone> Clone for Selector<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Observable(obs) => Self::Observable(obs.clone()),
            Self::Function(f) => Self::Function(Rc::clone(f)),
            Self::Linked(f) => Self::Linked(Rc::clone(f)),
            Self::Value(v) => Self::Value(v.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observable(obs) => f.debug_tuple("Observable").field(obs).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Linked(_) => f.write_str("Linked(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

impl<T: Clone + 'static> Selector<T> {
    pub fn function(f: impl Fn(&mut ObserveEvent<T>) -> T + 'static) -> Self {
        Self::Function(Rc::new(f))
    }

    /// A derivation that ignores the observe event.
    pub fn from_fn(f: impl Fn() -> T + 'static) -> Self {
        Self::Function(Rc::new(move |_: &mut ObserveEvent<T>| f()))
    }

    pub fn linked(f: impl Fn(&mut ObserveEvent<T>) -> Observable<T> + 'static) -> Self {
        Self::Linked(Rc::new(f))
    }

    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// Whether evaluating this selector can produce dependencies.
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

impl<T> From<Observable<T>> for Selector<T> {
    fn from(obs: Observable<T>) -> Self {
        Self::Observable(obs)
    }
}

impl<T> From<&Observable<T>> for Selector<T> {
    fn from(obs: &Observable<T>) -> Self {
        Self::Observable(obs.clone())
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// Per-pass context handed to selector functions.
///
/// `num` counts completed passes of the owning observation (0 on the first);
/// `previous` holds the value of the last pass. Calling
/// [`cancel`](Self::cancel) opts this pass out of live tracking.
pub struct ObserveEvent<T> {
    pub num: u64,
    pub previous: Option<T>,
    pub value: Option<T>,
    cancel: bool,
    cleanup: Option<Cleanup>,
}

impl<T> ObserveEvent<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::for_pass(0, None)
    }

    #[must_use]
    pub fn for_pass(num: u64, previous: Option<T>) -> Self {
        Self {
            num,
            previous,
            value: None,
            cancel: false,
            cleanup: None,
        }
    }

    /// Skip subscription setup for this pass.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }

    /// Run `f` before the next pass, or when the observation is disposed.
    /// A later registration in the same pass replaces an earlier one.
    pub fn on_cleanup(&mut self, f: impl FnOnce() + 'static) {
        self.cleanup = Some(Box::new(f));
    }

    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }
}

impl<T> Default for ObserveEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObserveEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveEvent")
            .field("num", &self.num)
            .field("previous", &self.previous)
            .field("value", &self.value)
            .field("cancel", &self.cancel)
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Result of one selector evaluation.
#[derive(Debug, Clone)]
pub enum Computation<T> {
    Value(T),
    /// The selector produced an observable and the caller asked to keep it.
    Linked(Observable<T>),
}

impl<T: Clone + 'static> Computation<T> {
    /// The computed value; a linked observable is peeked, not tracked.
    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Value(v) => v,
            Self::Linked(obs) => obs.peek(),
        }
    }
}

/// Evaluate `selector` once.
///
/// Function selectors receive `event`, or a scratch event when none is
/// given. With `from_computed`, an observable result (from an `Observable`
/// or `Linked` selector) is returned as [`Computation::Linked`] without being
/// read; otherwise it is read with `get`, recording it in the active frame.
pub fn compute_selector<T: Clone + 'static>(
    selector: &Selector<T>,
    event: Option<&mut ObserveEvent<T>>,
    from_computed: bool,
) -> Computation<T> {
    let read = |obs: Observable<T>| {
        if from_computed {
            Computation::Linked(obs)
        } else {
            Computation::Value(obs.get())
        }
    };

    match selector {
        Selector::Observable(obs) => read(obs.clone()),
        Selector::Function(f) => Computation::Value(call(f.as_ref(), event)),
        Selector::Linked(f) => read(call(f.as_ref(), event)),
        Selector::Value(v) => Computation::Value(v.clone()),
    }
}

fn call<T, R>(f: &dyn Fn(&mut ObserveEvent<T>) -> R, event: Option<&mut ObserveEvent<T>>) -> R {
    match event {
        Some(event) => f(event),
        None => f(&mut ObserveEvent::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracksel_core::tracking::track;

    #[test]
    fn plain_value_has_no_dependencies() {
        let selector = Selector::value(7);
        assert!(!selector.is_reactive());
        let (value, frame) = track(|| compute_selector(&selector, None, false).into_value());
        assert_eq!(value, 7);
        assert!(frame.nodes().is_empty());
    }

    #[test]
    fn function_reads_are_tracked() {
        let a = Observable::new(2);
        let b = Observable::new(3);
        let (a2, b2) = (a.clone(), b.clone());
        let selector = Selector::from_fn(move || a2.get() * b2.get());

        let (value, frame) = track(|| compute_selector(&selector, None, false).into_value());
        assert_eq!(value, 6);
        assert_eq!(frame.nodes().len(), 2);
        assert!(frame.nodes().contains(a.node().id()));
        assert!(frame.nodes().contains(b.node().id()));
    }

    #[test]
    fn event_is_forwarded() {
        let selector = Selector::function(|e: &mut ObserveEvent<u64>| {
            e.cancel();
            e.num * 10
        });
        let mut event = ObserveEvent::for_pass(4, None);
        let value = compute_selector(&selector, Some(&mut event), false).into_value();
        assert_eq!(value, 40);
        assert!(event.is_cancelled());
    }

    #[test]
    fn linked_result_depends_on_from_computed() {
        let target = Observable::new(String::from("linked"));
        let t = target.clone();
        let selector = Selector::linked(move |_| t.clone());

        let (computation, frame) = track(|| compute_selector(&selector, None, true));
        assert!(matches!(computation, Computation::Linked(ref obs) if obs.node() == target.node()));
        assert!(frame.nodes().is_empty());

        let (computation, frame) = track(|| compute_selector(&selector, None, false));
        assert_eq!(computation.into_value(), "linked");
        assert!(frame.nodes().contains(target.node().id()));
    }

    #[test]
    fn observable_selector_reads_through() {
        let obs = Observable::new(1);
        let selector = Selector::from(&obs);
        let (value, frame) = track(|| compute_selector(&selector, None, false).into_value());
        assert_eq!(value, 1);
        assert!(frame.nodes().contains(obs.node().id()));
    }

    #[test]
    fn cleanup_is_replaced() {
        let mut event: ObserveEvent<()> = ObserveEvent::new();
        event.on_cleanup(|| panic!("replaced cleanup must not run"));
        event.on_cleanup(|| {});
        if let Some(cleanup) = event.take_cleanup() {
            cleanup();
        }
        assert!(event.take_cleanup().is_none());
    }
}
