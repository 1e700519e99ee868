//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! notifies its subscribers when that value changes.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an expression is computing, the signal
//!    records itself as a dependency of that computation.
//!
//! 2. The expression then subscribes to the signal.
//!
//! 3. When the signal's value changes, every subscriber is notified
//!    synchronously, in subscription order, before `set` returns.
//!
//! # Threading
//!
//! Signals are single-threaded (`Rc` + `RefCell`). Derivations run to
//! completion on the thread that triggered them.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::cell::{CellId, Dependency, Observable, Readable, Subscribers};
use super::context;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// A mutable reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use rivulet_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: CellId,
    value: RefCell<T>,
    subscribers: Subscribers,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: CellId::new(),
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If an expression is computing, this also records the signal as one
    /// of its dependencies.
    pub fn get(&self) -> T {
        context::record_read(Dependency::new(self.inner.clone()));
        self.get_untracked()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Setting a value equal to the current one does nothing. Errors raised
    /// by dependent expressions while they recompute are returned here.
    pub fn set(&self, value: T) -> Result<()> {
        {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return Ok(());
            }
            *slot = value;
        }

        self.inner.subscribers.notify_all()
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.inner.value.borrow());
        self.set(new_value)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Observable for SignalInner<T>
where
    T: 'static,
{
    fn id(&self) -> CellId {
        self.id
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<()> {
        self.subscribers.insert(subscriber);
        Ok(())
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(id);
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Observable for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> CellId {
        self.inner.id()
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<()> {
        self.inner.subscribe(subscriber)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.inner.unsubscribe(id);
    }

    fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn read(&self) -> Result<T> {
        Ok(self.get())
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
