#![forbid(unsafe_code)]

//! Re-running observations.
//!
//! [`observe`] evaluates a selector, subscribes to whatever it read, and
//! evaluates it again on every change to that set. Each pass is resolved
//! with [`track_selector`] from scratch, so the dependency set follows the
//! selector's control flow. [`observe_with`] adds a reaction that receives
//! the pass's value.
//!
//! A pass that calls [`ObserveEvent::cancel`] (in the selector or the
//! reaction) ends the observation: no further passes run.
//!
//! The observation stays alive until its [`Disposer`] is called; dropping
//! the handle does not stop it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracksel_core::{Disposer, ListenerParams, UpdateFn};

use super::resolver::{ObserveOptions, track_selector};
use super::selector::{ObserveEvent, Selector};

type Reaction<T> = Box<dyn Fn(&mut ObserveEvent<T>)>;

struct ObserveState<T> {
    selector: Selector<T>,
    reaction: Option<Reaction<T>>,
    from_computed: bool,
    num: Cell<u64>,
    previous: RefCell<Option<T>>,
    dispose: RefCell<Option<Disposer>>,
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
    stopped: Cell<bool>,
}

fn detach<T>(state: &ObserveState<T>) {
    let dispose = state.dispose.borrow_mut().take();
    if let Some(dispose) = dispose {
        dispose.dispose();
    }
}

fn run_cleanup<T>(state: &ObserveState<T>) {
    let cleanup = state.cleanup.borrow_mut().take();
    if let Some(cleanup) = cleanup {
        cleanup();
    }
}

fn run<T: Clone + 'static>(state: &Rc<ObserveState<T>>) {
    if state.stopped.get() {
        return;
    }
    run_cleanup(state);
    detach(state);

    let num = state.num.get();
    let mut event = ObserveEvent::for_pass(num, state.previous.borrow().clone());

    let rerun = Rc::clone(state);
    let update: UpdateFn = Rc::new(move |_: &ListenerParams| run(&rerun));
    let options = ObserveOptions {
        from_computed: state.from_computed,
        immediate: false,
    };
    let tracked = track_selector(&state.selector, update, Some(&mut event), options, false);
    tracing::trace!(
        message = "observe.pass",
        num,
        dependencies = tracked.nodes.len(),
        cancelled = tracked.cancelled
    );

    // Store before the reaction runs: a reaction that writes to a dependency
    // re-enters `run`, which must find and detach this pass's listener and
    // run this pass's cleanup.
    *state.dispose.borrow_mut() = tracked.dispose;
    *state.cleanup.borrow_mut() = event.take_cleanup();
    state.num.set(num + 1);
    *state.previous.borrow_mut() = Some(tracked.value.clone());
    event.value = Some(tracked.value);

    if !event.is_cancelled()
        && let Some(reaction) = &state.reaction
    {
        reaction(&mut event);
    }

    if let Some(cleanup) = event.take_cleanup() {
        if state.num.get() == num + 1 && !state.stopped.get() {
            *state.cleanup.borrow_mut() = Some(cleanup);
        } else {
            // Superseded by a nested pass, or disposed from the reaction.
            cleanup();
        }
    }
    if event.is_cancelled() {
        state.stopped.set(true);
        detach(state);
    }
}

fn start<T: Clone + 'static>(
    selector: Selector<T>,
    reaction: Option<Reaction<T>>,
    options: ObserveOptions,
) -> Disposer {
    let state = Rc::new(ObserveState {
        selector,
        reaction,
        from_computed: options.from_computed,
        num: Cell::new(0),
        previous: RefCell::new(None),
        dispose: RefCell::new(None),
        cleanup: RefCell::new(None),
        stopped: Cell::new(false),
    });
    run(&state);

    Disposer::new(move || {
        state.stopped.set(true);
        detach(&state);
        run_cleanup(&state);
    })
}

/// Run `selector` now and again whenever anything it read changes.
pub fn observe<T: Clone + 'static>(
    selector: impl Fn(&mut ObserveEvent<T>) -> T + 'static,
) -> Disposer {
    start(Selector::function(selector), None, ObserveOptions::default())
}

/// Like [`observe`], for any [`Selector`], calling `reaction` with the value
/// of each pass in `event.value`.
///
/// The first pass always runs synchronously, so `options.immediate` has no
/// additional effect here.
pub fn observe_with<T: Clone + 'static>(
    selector: Selector<T>,
    reaction: impl Fn(&mut ObserveEvent<T>) + 'static,
    options: ObserveOptions,
) -> Disposer {
    start(selector, Some(Box::new(reaction)), options)
}
