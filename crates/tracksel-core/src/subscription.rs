#![forbid(unsafe_code)]

//! Subscription handles.
//!
//! - [`Disposer`]: an explicit, idempotent teardown handle. Dropping it does
//!   **not** unsubscribe; a listener whose disposer is never called lives as
//!   long as the node it is attached to.
//! - [`Subscription`]: RAII guard around a [`Disposer`] that disposes on drop.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;

/// Idempotent teardown handle for a live subscription.
///
/// Clones share state: disposing any clone disposes them all, and the
/// teardown runs at most once.
#[derive(Clone)]
#[must_use = "dropping a Disposer leaves the subscription attached"]
pub struct Disposer {
    teardown: Rc<RefCell<Option<Teardown>>>,
}

impl Disposer {
    /// Wrap a teardown closure.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Rc::new(RefCell::new(Some(Box::new(teardown)))),
        }
    }

    /// A handle with nothing to tear down. Reports itself as disposed.
    pub fn noop() -> Self {
        Self {
            teardown: Rc::new(RefCell::new(None)),
        }
    }

    /// Combine several handles into one that disposes each in order.
    pub fn all(disposers: Vec<Disposer>) -> Self {
        if disposers.is_empty() {
            return Self::noop();
        }
        Self::new(move || {
            for disposer in &disposers {
                disposer.dispose();
            }
        })
    }

    /// Tear the subscription down. Calling this again is a no-op.
    pub fn dispose(&self) {
        // Take first so a teardown that re-enters dispose() sees None.
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.teardown.borrow().is_none()
    }

    /// Tie this handle to a scope.
    pub fn into_subscription(self) -> Subscription {
        Subscription {
            disposer: Some(self),
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// RAII guard that disposes its subscription when dropped.
#[must_use = "dropping a Subscription immediately unsubscribes"]
#[derive(Debug)]
pub struct Subscription {
    disposer: Option<Disposer>,
}

impl Subscription {
    /// Detach the guard, leaving the subscription alive until the returned
    /// handle is disposed.
    pub fn into_disposer(mut self) -> Disposer {
        self.disposer.take().unwrap_or_else(Disposer::noop)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.disposer.as_ref().is_some_and(|d| !d.is_disposed())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer.dispose();
        }
    }
}
