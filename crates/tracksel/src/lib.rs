#![forbid(unsafe_code)]

//! tracksel public facade crate.
//!
//! Fine-grained dependency tracking: resolve a selector, learn exactly which
//! observables it read, and get called back when any of them change.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tracksel::prelude::*;
//!
//! let count = Observable::new(1);
//! let c = count.clone();
//! let fired = Rc::new(Cell::new(0));
//! let f = Rc::clone(&fired);
//!
//! let tracked = track_selector(
//!     &Selector::from_fn(move || c.get() * 2),
//!     Rc::new(move |_: &ListenerParams| f.set(f.get() + 1)),
//!     None,
//!     ObserveOptions::default(),
//!     false,
//! );
//! assert_eq!(tracked.value, 2);
//!
//! count.set(5);
//! assert_eq!(fired.get(), 1);
//! tracked.dispose();
//! ```

pub use tracksel_core as core;
pub use tracksel_runtime as runtime;

pub mod prelude {
    pub use tracksel_core::tracking::{track, untracked};
    pub use tracksel_core::{
        Disposer, ExecutionMode, ListenerParams, Node, NodeId, NodeSource, Observable,
        Subscription, TraceHooks, TrackedNodes, TrackingConfig, TrackingError, UpdateFn,
    };
    pub use tracksel_runtime::reactive::{
        Computed, Event, ObserveEvent, ObserveOptions, Resubscribe, Selector, TrackedSelector,
        observe, observe_with, setup_tracking, track_selector,
    };
}
