//! Reactive Cell Capability
//!
//! Every reactive value, plain or derived, exposes the same small contract:
//! it has an identity, it can be subscribed to and unsubscribed from, and it
//! can say whether anyone is listening. Typed reads live on [`Readable`].
//!
//! Because expressions implement the same traits as signals, any consumer
//! of a plain cell can consume a derived one without knowing the difference.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// Identity of a reactive cell.
///
/// Dependency lists compare entries by this ID, never by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Generate a new unique cell ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// The untyped half of the reactive cell capability.
pub trait Observable {
    /// The cell's identity.
    fn id(&self) -> CellId;

    /// Register a change listener.
    ///
    /// Registering a subscriber whose ID is already present is a no-op.
    /// Fails only when the first subscription forces a derived cell to
    /// compute and that computation fails.
    fn subscribe(&self, subscriber: Subscriber) -> Result<()>;

    /// Remove a change listener. Unknown IDs are ignored.
    fn unsubscribe(&self, id: SubscriberId);

    /// Number of registered listeners.
    fn subscriber_count(&self) -> usize;

    /// Whether anyone is currently listening.
    fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

/// The typed half of the reactive cell capability.
pub trait Readable<T>: Observable {
    /// Read the current value.
    ///
    /// When a derivation is running this registers the cell as one of its
    /// dependencies.
    fn read(&self) -> Result<T>;
}

/// A shared handle to a cell, as stored in a dependency list.
///
/// Two handles are equal when they point at the same cell.
#[derive(Clone)]
pub struct Dependency(Rc<dyn Observable>);

impl Dependency {
    /// Wrap a shared cell.
    pub fn new(cell: Rc<dyn Observable>) -> Self {
        Self(cell)
    }

    /// The identity of the referenced cell.
    pub fn id(&self) -> CellId {
        self.0.id()
    }

    pub(crate) fn subscribe(&self, subscriber: Subscriber) -> Result<()> {
        self.0.subscribe(subscriber)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) {
        self.0.unsubscribe(id);
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Dependency {}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependency").field(&self.id()).finish()
    }
}

/// Ordered subscriber set shared by every cell implementation.
///
/// Notification order is subscription order. The set is snapshotted before
/// notifying, so callbacks may freely subscribe or unsubscribe.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<IndexMap<SubscriberId, Subscriber>>,
}

impl Subscribers {
    /// Insert a subscriber. Returns `false` if its ID was already present.
    pub(crate) fn insert(&self, subscriber: Subscriber) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&subscriber.id()) {
            return false;
        }
        entries.insert(subscriber.id(), subscriber);
        true
    }

    /// Remove a subscriber. Returns `false` if it was not present.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.entries.borrow_mut().shift_remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Notify every subscriber in order, stopping at the first failure.
    pub(crate) fn notify_all(&self) -> Result<()> {
        let snapshot: Vec<Subscriber> = self.entries.borrow().values().cloned().collect();
        for subscriber in snapshot {
            // Skip listeners removed by an earlier callback in this round.
            if self.contains(subscriber.id()) {
                subscriber.notify()?;
            }
        }
        Ok(())
    }
}
