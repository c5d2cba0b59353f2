#![forbid(unsafe_code)]

//! Core: observable nodes, the tracking context, and subscription handles.

pub mod config;
pub mod error;
pub mod node;
pub mod observable;
pub mod subscription;
pub mod trace;
pub mod tracking;

pub use config::{ExecutionMode, TrackingConfig};
pub use error::TrackingError;
pub use node::{ListenerParams, Node, NodeId, NodeSource, UpdateFn};
pub use observable::Observable;
pub use subscription::{Disposer, Subscription};
pub use trace::TraceHooks;
pub use tracking::{TrackedNodes, TrackingFrame, TrackingNode, TrackingScope};
