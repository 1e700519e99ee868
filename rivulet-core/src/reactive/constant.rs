//! Constant cells.
//!
//! A constant satisfies the reactive cell contract but can never change, so
//! reading it is not recorded and subscribing to it never produces a
//! notification.

use std::fmt::{self, Debug};
use std::rc::Rc;

use super::cell::{CellId, Observable, Readable};
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// An immutable reactive cell.
pub struct Constant<T> {
    id: CellId,
    value: Rc<T>,
}

impl<T> Constant<T>
where
    T: Clone + 'static,
{
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            id: CellId::new(),
            value: Rc::new(value),
        }
    }

    /// Get the value.
    pub fn get(&self) -> T {
        (*self.value).clone()
    }
}

impl<T> Observable for Constant<T>
where
    T: Clone + 'static,
{
    fn id(&self) -> CellId {
        self.id
    }

    fn subscribe(&self, _subscriber: Subscriber) -> Result<()> {
        Ok(())
    }

    fn unsubscribe(&self, _id: SubscriberId) {}

    fn subscriber_count(&self) -> usize {
        0
    }
}

impl<T> Readable<T> for Constant<T>
where
    T: Clone + 'static,
{
    fn read(&self) -> Result<T> {
        Ok(self.get())
    }
}

impl<T> Clone for Constant<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: Debug> Debug for Constant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constant")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}
