//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything that wants to hear about changes to a cell:
//! an expression listening to one of its dependencies, or an external
//! listener such as an [`Observer`](super::Observer).

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// Unique identifier for a subscriber.
///
/// Cells key their subscriber sets by this ID, which makes registering the
/// same listener twice a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A change listener registered with a cell.
///
/// Cloning a subscriber shares its callback; both clones carry the same ID.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    /// Invoked synchronously from whatever mutation changed the cell.
    notify: Rc<dyn Fn() -> Result<()>>,
}

impl Subscriber {
    /// Create a new subscriber with a fresh ID and the given callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self::with_id(SubscriberId::new(), notify)
    }

    /// Create a subscriber with a caller-chosen ID.
    ///
    /// Expressions use this so that every dependency sees them under the
    /// same identity.
    pub fn with_id<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self {
            id,
            notify: Rc::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the subscriber that the cell it listens to changed.
    pub fn notify(&self) -> Result<()> {
        (self.notify)()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
