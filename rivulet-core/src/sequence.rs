//! Reactive Sequences
//!
//! [`ItemsBuilder`] assembles a reactive sequence out of literal elements
//! and reactive subsequences. It only relies on the [`Readable`] capability,
//! so any cell producing a `Vec<E>` can be spliced in, including other
//! expressions.

use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::reactive::{Constant, Expression, Readable};

/// Builder for a reactive sequence.
///
/// Consecutive literal items are coalesced into a single constant
/// subsequence, so `push(1); push(2); push_reactive(xs); push(3)` yields
/// three subsequences: `[1, 2]`, `xs`, `[3]`.
///
/// # Example
///
/// ```rust
/// use rivulet_core::reactive::{Observer, Signal};
/// use rivulet_core::sequence::ItemsBuilder;
///
/// let middle = Signal::new(vec![2, 3]);
///
/// let mut builder = ItemsBuilder::new();
/// builder.push(1);
/// builder.push_reactive(middle.clone());
/// builder.push(4);
/// let items = builder.build();
///
/// let _observer = Observer::new(&items, || Ok(())).unwrap();
/// middle.set(vec![]).unwrap();
/// assert_eq!(items.get().unwrap(), vec![1, 4]);
/// ```
pub struct ItemsBuilder<E>
where
    E: Clone + PartialEq + 'static,
{
    subsequences: Vec<Rc<dyn Readable<Vec<E>>>>,
    pending: Vec<E>,
}

impl<E> ItemsBuilder<E>
where
    E: Clone + PartialEq + 'static,
{
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            subsequences: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Append a literal element.
    pub fn push(&mut self, item: E) -> &mut Self {
        self.pending.push(item);
        self
    }

    /// Append a reactive subsequence.
    pub fn push_reactive<R>(&mut self, items: R) -> &mut Self
    where
        R: Readable<Vec<E>> + 'static,
    {
        self.flush_pending();
        self.subsequences.push(Rc::new(items));
        self
    }

    /// Number of subsequences the built sequence will concatenate.
    pub fn subsequence_count(&self) -> usize {
        self.subsequences.len() + usize::from(!self.pending.is_empty())
    }

    /// Produce the concatenated sequence.
    pub fn build(mut self) -> Expression<Vec<E>> {
        self.flush_pending();
        let subsequences = self.subsequences;

        Expression::try_new(move || {
            let mut items = Vec::new();
            for subsequence in &subsequences {
                items.extend(subsequence.read()?);
            }
            Ok::<_, ReactiveError>(items)
        })
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let literals = std::mem::take(&mut self.pending);
            self.subsequences.push(Rc::new(Constant::new(literals)));
        }
    }
}

impl<E> Default for ItemsBuilder<E>
where
    E: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Extend<E> for ItemsBuilder<E>
where
    E: Clone + PartialEq + 'static,
{
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.pending.extend(iter);
    }
}

impl<E> fmt::Debug for ItemsBuilder<E>
where
    E: Clone + PartialEq + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemsBuilder")
            .field("subsequences", &self.subsequences.len())
            .field("pending", &self.pending)
            .finish()
    }
}

/// Concatenate reactive subsequences without any literals.
pub fn concat<E, I>(parts: I) -> Expression<Vec<E>>
where
    E: Clone + PartialEq + 'static,
    I: IntoIterator,
    I::Item: Readable<Vec<E>> + 'static,
{
    let mut builder = ItemsBuilder::new();
    for part in parts {
        builder.push_reactive(part);
    }
    builder.build()
}
