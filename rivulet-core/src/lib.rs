//! Rivulet Core
//!
//! This crate provides the core runtime for the Rivulet reactive data
//! library. It implements:
//!
//! - Reactive cells (signals and constants)
//! - Derived expressions with automatic dependency tracking
//! - Incremental subscription maintenance between recomputations
//! - Reactive sequences assembled from literal and reactive parts
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `sequence`: Builders that splice reactive sequences together
//! - `error`: The error type shared by every fallible operation
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::reactive::{Expression, Observer, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Expression::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Observe it
//! let _observer = Observer::new(&doubled, {
//!     let doubled = doubled.clone();
//!     move || {
//!         println!("Doubled: {}", doubled.get()?);
//!         Ok(())
//!     }
//! })
//! .unwrap();
//!
//! // Update the signal
//! count.set(5).unwrap();
//! // Observer runs synchronously, prints: "Doubled: 10"
//! ```

pub mod error;
pub mod reactive;
pub mod sequence;

pub use error::{ComputationError, ReactiveError, Result};
