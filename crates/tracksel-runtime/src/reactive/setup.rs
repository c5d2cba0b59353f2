#![forbid(unsafe_code)]

//! Listener setup: turn a dependency set plus an update callback into one
//! live subscription.

use std::rc::Rc;

use tracksel_core::{Disposer, ListenerParams, TrackedNodes, UpdateFn};

/// Subscribe `update` to every node in `nodes`.
///
/// - `nodes == None` or an empty set yields a handle that never fires.
/// - `subscribe_only` hides the change source: `update` receives
///   [`ListenerParams::synthetic`] instead of the node's params.
/// - `immediate` invokes `update` once, synchronously, after wiring.
///
/// The returned handle detaches every listener; calling it again is a no-op.
pub fn setup_tracking(
    nodes: Option<&TrackedNodes>,
    update: UpdateFn,
    subscribe_only: bool,
    immediate: bool,
) -> Disposer {
    let listener: UpdateFn = if subscribe_only {
        let inner = Rc::clone(&update);
        Rc::new(move |_: &ListenerParams| inner(&ListenerParams::synthetic()))
    } else {
        Rc::clone(&update)
    };

    let disposers: Vec<Disposer> = nodes
        .map(|nodes| {
            nodes
                .iter()
                .map(|tracked| tracked.node().subscribe(Rc::clone(&listener)))
                .collect()
        })
        .unwrap_or_default();

    if immediate {
        update(&ListenerParams::synthetic());
    }

    Disposer::all(disposers)
}
