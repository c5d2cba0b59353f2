#![forbid(unsafe_code)]

//! Selector resolution and derived reactive values.
//!
//! This module turns reads of [`Observable`](tracksel_core::Observable)s into
//! live subscriptions:
//!
//! - [`Selector`]: an observable, a derivation function, a linking function,
//!   or a plain value.
//! - [`track_selector`]: resolve a selector to its value and the exact set of
//!   nodes it read, and subscribe an update callback to that set.
//! - [`setup_tracking`]: wire an update callback to a recorded node set.
//! - [`Event`]: versioned fire-and-forget notification with a payload.
//! - [`Computed`]: lazily-evaluated, memoized derivation with dynamic
//!   dependencies.
//! - [`observe`]: re-run a selector whenever its dependencies change.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc`/`RefCell`). Reads are recorded by the
//! per-thread tracking stack in `tracksel_core::tracking`; each resolution
//! pushes its own frame, so nested resolutions never see each other's reads.
//!
//! # Invariants
//!
//! 1. Resolving the same selector twice with no intervening writes yields
//!    equal values.
//! 2. A write to a node in the recorded set fires the update callback; a
//!    write to any other node never does.
//! 3. An empty dependency set is valid and never fires.
//! 4. Every disposer is idempotent.
//! 5. An event's count increases by exactly 1 per fire.

pub mod computed;
pub mod event;
pub mod observe;
pub mod resolver;
pub mod selector;
pub mod setup;

pub use computed::Computed;
pub use event::{Event, EventState};
pub use observe::{observe, observe_with};
pub use resolver::{ObserveOptions, Resubscribe, TrackedSelector, track_selector};
pub use selector::{Computation, ObserveEvent, Selector, compute_selector};
pub use setup::setup_tracking;
