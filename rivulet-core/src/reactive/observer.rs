//! Observer Implementation
//!
//! An Observer is an external listener: a callback that runs every time a
//! cell notifies a change. Subscribing an observer to an expression is what
//! switches the expression into reactive mode.
//!
//! # Use Cases
//!
//! Observers connect reactive state with the outside world:
//!
//! - Updating a view when a derived value changes
//! - Logging state changes
//! - Keeping an expression live while something cares about it
//!
//! # Lifetime
//!
//! The subscription lasts until [`Observer::dispose`] is called or the
//! observer is dropped. Dropping the last observer of an expression sends
//! it back to dormant mode and releases its dependencies.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::cell::{CellId, Observable};
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// A callback subscribed to a reactive cell.
///
/// # Example
///
/// ```rust
/// use rivulet_core::reactive::{Observer, Signal};
///
/// let count = Signal::new(0);
/// let observer = Observer::new(&count, || {
///     println!("count changed");
///     Ok(())
/// })
/// .unwrap();
///
/// count.set(5).unwrap();
/// assert_eq!(observer.notification_count(), 1);
/// ```
pub struct Observer {
    /// The identity the observer is registered under.
    subscriber_id: SubscriberId,

    /// The observed cell. Holding it keeps a reactive expression alive.
    cell: Box<dyn Observable>,

    /// Whether the subscription has been released.
    disposed: Cell<bool>,

    /// Number of notifications received.
    notifications: Rc<Cell<usize>>,
}

impl Observer {
    /// Subscribe `callback` to `cell`.
    ///
    /// Fails if subscribing forces a dormant expression to compute and that
    /// computation fails; in that case nothing stays subscribed.
    pub fn new<C, F>(cell: &C, callback: F) -> Result<Self>
    where
        C: Observable + Clone + 'static,
        F: Fn() -> Result<()> + 'static,
    {
        let notifications = Rc::new(Cell::new(0));
        let subscriber = Subscriber::new({
            let notifications = notifications.clone();
            move || {
                notifications.set(notifications.get() + 1);
                callback()
            }
        });
        let subscriber_id = subscriber.id();

        cell.subscribe(subscriber)?;

        Ok(Self {
            subscriber_id,
            cell: Box::new(cell.clone()),
            disposed: Cell::new(false),
            notifications,
        })
    }

    /// Get the observer's subscriber ID.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// The ID of the observed cell.
    pub fn cell_id(&self) -> CellId {
        self.cell.id()
    }

    /// Release the subscription.
    ///
    /// After disposal, the callback will not run again.
    pub fn dispose(&self) {
        if !self.disposed.replace(true) {
            self.cell.unsubscribe(self.subscriber_id);
        }
    }

    /// Check if the observer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Get the number of notifications received.
    pub fn notification_count(&self) -> usize {
        self.notifications.get()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("subscriber_id", &self.subscriber_id)
            .field("cell", &self.cell_id())
            .field("notification_count", &self.notification_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
