//! Reactive Primitives
//!
//! This module implements the dependency-tracking and recomputation engine:
//! signals, constants, expressions, and observers. These primitives form
//! the foundation of Rivulet's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it while an expression
//! is computing records it as one of that expression's dependencies. Setting
//! it notifies every subscriber synchronously.
//!
//! ## Expressions
//!
//! An Expression is a value derived from other cells by a pure function. It
//! is dormant (evaluated on demand, nothing cached) until it gets its first
//! subscriber, and reactive (cached, kept current by push notifications)
//! from then until its last subscriber leaves.
//!
//! ## Observers
//!
//! An Observer is an external listener. It is what usually drives an
//! expression into reactive mode.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local stack of derivation frames to detect
//! dependencies automatically. When a cell is read, it checks whether a
//! frame is on top and, if so, records itself there. At the end of a
//! recomputation the recorded reads are compared positionally with the
//! previous dependency list; only when they differ is a set difference
//! computed and the subscriptions adjusted.

mod cell;
mod constant;
mod context;
mod diff;
mod expression;
mod observer;
mod signal;
mod subscriber;

pub use cell::{CellId, Dependency, Observable, Readable};
pub use constant::Constant;
pub use context::{current_derivation, is_tracking, record_read, untracked};
pub use expression::{Expression, NotifyPolicy};
pub use observer::Observer;
pub use signal::Signal;
pub use subscriber::{Subscriber, SubscriberId};
