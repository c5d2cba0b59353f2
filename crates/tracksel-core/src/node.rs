#![forbid(unsafe_code)]

//! Reactive node identity and change-listener list.
//!
//! A [`Node`] is the dependency-graph key for one reactive storage cell. It
//! owns no value; it carries an identity, an `is_event` flag, a version
//! counter, and the ordered list of change listeners. [`Observable`] pairs a
//! node with typed storage.
//!
//! # Invariants
//!
//! 1. Node ids are process-unique and never reused.
//! 2. Listeners are notified in registration order.
//! 3. Notification iterates a snapshot: a listener disposed during a cycle
//!    is skipped for the rest of that cycle, a listener added during a cycle
//!    first fires on the next one.
//! 4. `version` increments exactly once per [`Node::notify`].
//!
//! [`Observable`]: crate::observable::Observable

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::subscription::Disposer;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Change-notification payload passed to every update callback.
///
/// `node == None` marks a synthetic call: an `immediate` fire at setup time
/// or a subscribe-only listener that deliberately carries no source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerParams {
    pub node: Option<NodeId>,
    pub version: u64,
    pub is_event: bool,
}

impl ListenerParams {
    /// Params with no source node.
    #[must_use]
    pub const fn synthetic() -> Self {
        Self {
            node: None,
            version: 0,
            is_event: false,
        }
    }

    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.node.is_none()
    }
}

/// Shared update callback.
pub type UpdateFn = Rc<dyn Fn(&ListenerParams)>;

struct ListenerSlot {
    id: u64,
    active: Cell<bool>,
    callback: UpdateFn,
}

struct NodeInner {
    id: NodeId,
    is_event: Cell<bool>,
    version: Cell<u64>,
    next_listener: Cell<u64>,
    listeners: RefCell<Vec<Rc<ListenerSlot>>>,
}

/// Identity and listener list for one reactive storage cell.
///
/// Cloning a `Node` creates a new handle to the same cell. Equality and
/// hashing are by [`NodeId`].
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                is_event: Cell::new(false),
                version: Cell::new(0),
                next_listener: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Whether this node backs an event rather than a value.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.inner.is_event.get()
    }

    pub fn mark_event(&self) {
        self.inner.is_event.set(true);
    }

    /// Number of notifications delivered so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Record a read of this node in the active tracking frame, if any.
    pub fn track_read(&self) {
        crate::tracking::record_read(self);
    }

    /// Attach a shared update callback. The returned handle detaches it.
    pub fn subscribe(&self, update: UpdateFn) -> Disposer {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);

        let slot = Rc::new(ListenerSlot {
            id,
            active: Cell::new(true),
            callback: update,
        });
        self.inner.listeners.borrow_mut().push(Rc::clone(&slot));

        let weak: Weak<NodeInner> = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            slot.active.set(false);
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|s| s.id != slot.id);
            }
        })
    }

    /// Attach a change callback.
    pub fn on_change(&self, callback: impl Fn(&ListenerParams) + 'static) -> Disposer {
        self.subscribe(Rc::new(callback))
    }

    /// Bump the version and notify every listener once.
    pub fn notify(&self) {
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);

        let params = ListenerParams {
            node: Some(self.inner.id),
            version,
            is_event: self.is_event(),
        };
        let snapshot: Vec<Rc<ListenerSlot>> = self.inner.listeners.borrow().clone();
        for slot in snapshot {
            if slot.active.get() {
                (slot.callback)(&params);
            }
        }
    }
}

/// Anything backed by a single [`Node`]: observables, events, computed
/// values. Lets callers wire listeners or detect events without knowing the
/// concrete value type.
pub trait NodeSource {
    fn node(&self) -> &Node;

    fn is_event(&self) -> bool {
        self.node().is_event()
    }
}

impl NodeSource for Node {
    fn node(&self) -> &Node {
        self
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("is_event", &self.is_event())
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
