use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackingError>;

/// Failures of the tracking frame stack.
///
/// Both variants describe a begin/end pairing violation. With
/// [`TrackingScope`](crate::tracking::TrackingScope) they cannot occur; they
/// are only reachable through the raw [`begin_tracking`](crate::tracking::begin_tracking)
/// / [`end_tracking`](crate::tracking::end_tracking) pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error("end_tracking called with no active tracking frame")]
    NoActiveFrame,

    #[error("tracking frame stack unbalanced: expected depth {expected}, found {actual}")]
    UnbalancedFrame { expected: usize, actual: usize },
}
