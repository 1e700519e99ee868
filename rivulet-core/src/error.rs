//! Error Types
//!
//! Every fallible reactive operation returns [`Result`]. Failures are never
//! swallowed by the engine: they surface synchronously to whoever triggered
//! the work, whether that was a read, a subscription, or a `Signal::set`
//! whose notification reached a failing expression.

use std::fmt;

use crate::reactive::CellId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors produced by the reactive engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReactiveError {
    /// An expression's function failed while computing its value.
    #[error("computation failed: {0}")]
    Computation(#[from] ComputationError),

    /// An expression was asked to recompute while it was already recomputing.
    #[error("cyclic recomputation of cell {cell}")]
    Cycle {
        /// The expression that re-entered itself.
        cell: CellId,
    },
}

/// The failure raised by a fallible expression function.
///
/// The source error is kept behind an `Rc` so the same failure can be
/// handed to every caller the notification chain passes through.
#[derive(Clone)]
pub struct ComputationError {
    source: std::rc::Rc<dyn std::error::Error + 'static>,
}

impl ComputationError {
    /// Wrap an arbitrary error raised by an expression function.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            source: std::rc::Rc::new(error),
        }
    }

    /// Build a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The underlying error.
    pub fn inner(&self) -> &(dyn std::error::Error + 'static) {
        &*self.source
    }
}

impl fmt::Debug for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComputationError")
            .field(&self.source.to_string())
            .finish()
    }
}

impl fmt::Display for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for ComputationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);
