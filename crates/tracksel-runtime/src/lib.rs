#![forbid(unsafe_code)]

//! Runtime: selector resolution, listener wiring, and derived reactive values.

pub mod reactive;

pub use reactive::{
    Computed, Event, ObserveEvent, ObserveOptions, Selector, TrackedSelector, observe,
    observe_with, setup_tracking, track_selector,
};
