#![forbid(unsafe_code)]

//! Tracking context: a per-thread stack of frames that records node reads.
//!
//! While a frame is on top of the stack, every [`Node::track_read`] (issued
//! by `Observable::get` and friends) lands in it. Nested evaluations push
//! their own frame, so an inner evaluation's reads never reach the outer one.
//!
//! # Scoped acquisition
//!
//! [`TrackingScope`] is the guard every caller should use. It pops its frame
//! on [`finish`](TrackingScope::finish) or on drop (early return, `?`, panic
//! unwinding), and always truncates the stack back to its own depth, so an
//! inner frame leaked by misbehaving code is discarded rather than left to
//! swallow every later read on the thread.
//!
//! [`begin_tracking`] / [`end_tracking`] are the raw operations. They are
//! kept for callers that cannot hold a guard across the evaluation and report
//! a mismatched pop as [`TrackingError::NoActiveFrame`].
//!
//! Evaluation inside a frame must be synchronous: a read issued after a
//! suspension point lands in whichever frame is on top at that time.

use std::cell::RefCell;

use ahash::AHashMap;

use crate::error::{Result, TrackingError};
use crate::node::{Node, NodeId};
use crate::trace::TraceHooks;

/// One distinct node read during a frame.
#[derive(Debug, Clone)]
pub struct TrackingNode {
    node: Node,
    reads: u32,
}

impl TrackingNode {
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// How many times the node was read during the frame.
    #[must_use]
    pub fn reads(&self) -> u32 {
        self.reads
    }
}

/// The dependency set recorded by a frame, keyed by node identity.
#[derive(Debug, Clone, Default)]
pub struct TrackedNodes {
    map: AHashMap<NodeId, TrackingNode>,
}

impl TrackedNodes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, node: &Node) {
        self.map
            .entry(node.id())
            .and_modify(|tracked| tracked.reads = tracked.reads.saturating_add(1))
            .or_insert_with(|| TrackingNode {
                node: node.clone(),
                reads: 1,
            });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.map.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&TrackingNode> {
        self.map.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackingNode> {
        self.map.values()
    }

    /// Node ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.map.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Record of one synchronous evaluation.
#[derive(Debug, Default)]
pub struct TrackingFrame {
    nodes: TrackedNodes,
    hooks: TraceHooks,
}

impl TrackingFrame {
    #[must_use]
    pub fn new(hooks: TraceHooks) -> Self {
        Self {
            nodes: TrackedNodes::default(),
            hooks,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &TrackedNodes {
        &self.nodes
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut TraceHooks {
        &mut self.hooks
    }

    /// Remove the trace hooks from the frame.
    pub fn take_hooks(&mut self) -> TraceHooks {
        self.hooks.take()
    }

    #[must_use]
    pub fn into_nodes(self) -> TrackedNodes {
        self.nodes
    }

    #[must_use]
    pub fn into_parts(self) -> (TrackedNodes, TraceHooks) {
        (self.nodes, self.hooks)
    }
}

thread_local! {
    static STACK: RefCell<Vec<TrackingFrame>> = const { RefCell::new(Vec::new()) };
}

fn push_frame(hooks: TraceHooks) -> usize {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(TrackingFrame::new(hooks));
        let depth = stack.len() - 1;
        tracing::trace!(message = "tracking.begin", depth);
        depth
    })
}

/// Pop every frame at or above `depth`, returning the frame at `depth`.
fn unwind_to(depth: usize) -> Option<TrackingFrame> {
    STACK
        .try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() <= depth {
                return None;
            }
            let leaked = stack.len() - depth - 1;
            if leaked > 0 {
                tracing::warn!(
                    message = "tracking.leaked_frames",
                    depth,
                    leaked
                );
                stack.truncate(depth + 1);
            }
            let frame = stack.pop();
            tracing::trace!(message = "tracking.end", depth);
            frame
        })
        .ok()
        .flatten()
}

/// Push a new, empty frame and make it the active one.
///
/// Every call must be paired with exactly one [`end_tracking`] on all exit
/// paths; prefer [`TrackingScope`], which enforces that.
pub fn begin_tracking(hooks: TraceHooks) {
    push_frame(hooks);
}

/// Pop the active frame and hand it to the caller.
pub fn end_tracking() -> Result<TrackingFrame> {
    STACK.with(|stack| {
        let frame = stack
            .borrow_mut()
            .pop()
            .ok_or(TrackingError::NoActiveFrame)?;
        tracing::trace!(message = "tracking.end", depth = stack.borrow().len());
        Ok(frame)
    })
}

/// Read hook invoked by [`Node::track_read`]. No-op outside tracking.
pub(crate) fn record_read(node: &Node) {
    STACK.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            frame.nodes.record(node);
        }
    });
}

/// Run `f` against the innermost frame, if one is active.
pub(crate) fn with_active_frame<R>(f: impl FnOnce(&mut TrackingFrame) -> R) -> Option<R> {
    STACK.with(|stack| stack.borrow_mut().last_mut().map(f))
}

/// Whether a frame is currently active on this thread.
#[must_use]
pub fn is_tracking() -> bool {
    STACK.with(|stack| !stack.borrow().is_empty())
}

/// Number of open frames on this thread.
#[must_use]
pub fn tracking_depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Guard owning one frame on the tracking stack.
#[must_use = "dropping a TrackingScope immediately discards its frame"]
#[derive(Debug)]
pub struct TrackingScope {
    depth: usize,
    open: bool,
}

impl TrackingScope {
    /// Push a frame carrying `hooks`.
    pub fn begin(hooks: TraceHooks) -> Self {
        Self {
            depth: push_frame(hooks),
            open: true,
        }
    }

    /// Depth of this scope's frame (0 = outermost).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pop the frame and return it.
    ///
    /// If the frame was already removed through [`end_tracking`], a
    /// `tracking.missing_frame` warning is logged and an empty frame is
    /// returned.
    pub fn finish(self) -> TrackingFrame {
        match self.try_finish() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(message = "tracking.missing_frame", error = %err);
                TrackingFrame::default()
            }
        }
    }

    /// Pop the frame, reporting a frame that vanished from under the scope.
    pub fn try_finish(mut self) -> Result<TrackingFrame> {
        self.open = false;
        unwind_to(self.depth).ok_or(TrackingError::UnbalancedFrame {
            expected: self.depth + 1,
            actual: tracking_depth(),
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            let _ = unwind_to(self.depth);
        }
    }
}

/// Evaluate `f` inside its own frame and return its result with the frame.
///
/// `R` may be a `Result`; the frame is popped before the caller sees an
/// error, and before a panic propagates.
pub fn track<R>(f: impl FnOnce() -> R) -> (R, TrackingFrame) {
    let scope = TrackingScope::begin(TraceHooks::default());
    let value = f();
    (value, scope.finish())
}

/// Evaluate `f` without recording its reads into the caller's frame.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = TrackingScope::begin(TraceHooks::default());
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_outside_tracking_are_ignored() {
        let node = Node::new();
        node.track_read();
        assert!(!is_tracking());
        assert_eq!(tracking_depth(), 0);
    }

    #[test]
    fn raw_begin_end_records_reads() {
        let a = Node::new();
        let b = Node::new();
        begin_tracking(TraceHooks::default());
        a.track_read();
        a.track_read();
        b.track_read();
        let frame = end_tracking().unwrap();

        let nodes = frame.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.get(a.id()).map(TrackingNode::reads), Some(2));
        assert_eq!(nodes.get(b.id()).map(TrackingNode::reads), Some(1));
        assert!(!is_tracking());
    }

    #[test]
    fn end_without_begin_is_an_error() {
        assert_eq!(end_tracking().unwrap_err(), TrackingError::NoActiveFrame);
    }

    #[test]
    fn nested_frames_are_isolated() {
        let outer_node = Node::new();
        let inner_node = Node::new();

        let ((), outer) = track(|| {
            outer_node.track_read();
            let ((), inner) = track(|| inner_node.track_read());
            assert!(inner.nodes().contains(inner_node.id()));
            assert!(!inner.nodes().contains(outer_node.id()));
        });

        assert_eq!(outer.nodes().ids(), vec![outer_node.id()]);
    }

    #[test]
    fn untracked_hides_reads() {
        let seen = Node::new();
        let hidden = Node::new();
        let ((), frame) = track(|| {
            seen.track_read();
            untracked(|| hidden.track_read());
        });
        assert!(frame.nodes().contains(seen.id()));
        assert!(!frame.nodes().contains(hidden.id()));
    }

    #[test]
    fn scope_pops_on_early_return() {
        fn evaluate(node: &Node, fail: bool) -> std::result::Result<u32, &'static str> {
            let _scope = TrackingScope::begin(TraceHooks::default());
            node.track_read();
            if fail {
                return Err("selector failed");
            }
            Ok(1)
        }
        assert!(evaluate(&Node::new(), true).is_err());
        assert_eq!(tracking_depth(), 0);
        assert_eq!(evaluate(&Node::new(), false), Ok(1));
        assert_eq!(tracking_depth(), 0);
    }

    #[test]
    fn scope_pops_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _scope = TrackingScope::begin(TraceHooks::default());
            panic!("selector panicked");
        });
        assert!(result.is_err());
        assert_eq!(tracking_depth(), 0);
    }

    #[test]
    fn scope_discards_leaked_inner_frames() {
        let node = Node::new();
        let scope = TrackingScope::begin(TraceHooks::default());
        begin_tracking(TraceHooks::default());
        begin_tracking(TraceHooks::default());
        assert_eq!(tracking_depth(), 3);

        let frame = scope.finish();
        assert_eq!(tracking_depth(), 0);
        assert!(frame.nodes().is_empty());

        // Tracking works normally afterwards.
        let ((), frame) = track(|| node.track_read());
        assert!(frame.nodes().contains(node.id()));
    }

    #[test]
    fn try_finish_reports_vanished_frame() {
        let scope = TrackingScope::begin(TraceHooks::default());
        assert_eq!(scope.depth(), 0);
        end_tracking().unwrap();
        let err = scope.try_finish().unwrap_err();
        assert_eq!(
            err,
            TrackingError::UnbalancedFrame {
                expected: 1,
                actual: 0
            }
        );
    }
}
