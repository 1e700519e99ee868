//! Derivation Context
//!
//! The derivation context tracks which expression is currently computing.
//! This enables automatic dependency tracking: when a cell is read, it
//! records itself against the derivation on top of the stack without the
//! reading code holding a reference back to the caller.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Recomputing an expression pushes
//! a derivation frame and pops it when the function returns, so nested
//! derivations (an expression whose function reads another expression that
//! recomputes) always hand the previous top back to their caller. Popping is
//! tied to a guard, which keeps the stack consistent when a function fails
//! or panics.
//!
//! The stack is per thread. Cells are `!Send`, so a derivation can never
//! observe reads made on another thread.
//!
//! # Recording reads
//!
//! A frame is seeded with the expression's previous dependency list and a
//! cursor. As long as reads arrive in the same order as last time the frame
//! only advances the cursor. The first read that disagrees switches the
//! frame into divergent mode: it copies the matched prefix into a growable
//! list and appends from then on. A cell that was already recorded in this
//! frame is ignored, so the resulting list never holds duplicates. Lists
//! longer than the inline capacity check membership through a hash set
//! built on first need.

use std::cell::RefCell;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use super::cell::{CellId, Dependency};

thread_local! {
    static DERIVATION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the derivation stack.
enum Frame {
    /// Reads are recorded into this derivation.
    Tracking(Derivation),
    /// Reads are ignored (see [`untracked`]).
    Untracked,
}

/// Inline capacity of the divergent list before it spills to the heap.
const INLINE_DEPENDENCIES: usize = 8;

/// The tracking state of one recomputation.
pub(crate) struct Derivation {
    /// The expression being computed.
    owner: Option<CellId>,
    /// Dependency list from the previous recomputation.
    previous: Rc<[Dependency]>,
    /// Number of leading entries of `previous` matched so far. Pinned past
    /// the end once the frame diverges.
    cursor: usize,
    /// Reads in order, materialized on the first mismatch.
    divergent: Option<SmallVec<[Dependency; INLINE_DEPENDENCIES]>>,
    /// IDs recorded so far, once the recorded list outgrows a linear scan.
    seen: Option<HashSet<CellId>>,
}

impl Derivation {
    pub(crate) fn new(owner: CellId, previous: Rc<[Dependency]>) -> Self {
        Self {
            owner: Some(owner),
            previous,
            cursor: 0,
            divergent: None,
            seen: None,
        }
    }

    fn record(&mut self, cell: Dependency) {
        if self.divergent.is_none() && self.previous.get(self.cursor) == Some(&cell) {
            self.cursor += 1;
            if let Some(seen) = self.seen.as_mut() {
                seen.insert(cell.id());
            }
            return;
        }

        if self.already_recorded(&cell) {
            return;
        }
        if let Some(seen) = self.seen.as_mut() {
            seen.insert(cell.id());
        }

        match self.divergent.as_mut() {
            Some(list) => list.push(cell),
            None => {
                let mut list: SmallVec<[Dependency; INLINE_DEPENDENCIES]> =
                    self.previous[..self.cursor].iter().cloned().collect();
                list.push(cell);
                self.divergent = Some(list);
                self.cursor = self.previous.len() + 1;
            }
        }
    }

    fn already_recorded(&mut self, cell: &Dependency) -> bool {
        if let Some(seen) = &self.seen {
            return seen.contains(&cell.id());
        }

        let recorded: &[Dependency] = match &self.divergent {
            Some(list) => list,
            None => &self.previous[..self.cursor],
        };
        if recorded.len() <= INLINE_DEPENDENCIES {
            return recorded.contains(cell);
        }

        let seen: HashSet<CellId> = recorded.iter().map(Dependency::id).collect();
        let hit = seen.contains(&cell.id());
        self.seen = Some(seen);
        hit
    }

    /// Whether the reads differed from the previous dependency list.
    pub(crate) fn dependencies_changed(&self) -> bool {
        self.cursor != self.previous.len()
    }

    /// The new dependency list, or `None` if it is unchanged.
    pub(crate) fn into_changed_dependencies(self) -> Option<Rc<[Dependency]>> {
        if !self.dependencies_changed() {
            return None;
        }
        match self.divergent {
            Some(list) => Some(list.into_iter().collect()),
            // Fewer reads than last time, all of them matching.
            None => Some(self.previous[..self.cursor].iter().cloned().collect()),
        }
    }
}

impl Default for Derivation {
    fn default() -> Self {
        Self {
            owner: None,
            previous: Rc::from(Vec::new()),
            cursor: 0,
            divergent: None,
            seen: None,
        }
    }
}

/// Guard that keeps a frame on top of the derivation stack.
///
/// The frame is popped by [`DerivationScope::exit`] or, on early return or
/// unwinding, when the guard is dropped.
pub(crate) struct DerivationScope {
    depth: usize,
    active: bool,
    _not_send: PhantomData<*const ()>,
}

impl DerivationScope {
    /// Push `derivation` as the new top frame.
    pub(crate) fn enter(derivation: Derivation) -> Self {
        Self::push(Frame::Tracking(derivation))
    }

    fn push(frame: Frame) -> Self {
        let depth = DERIVATION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(frame);
            stack.len()
        });
        Self {
            depth,
            active: true,
            _not_send: PhantomData,
        }
    }

    /// Pop the frame, restoring the previous top, and return what it recorded.
    pub(crate) fn exit(mut self) -> Derivation {
        match self.pop() {
            Some(Frame::Tracking(derivation)) => derivation,
            _ => Derivation::default(),
        }
    }

    fn pop(&mut self) -> Option<Frame> {
        if !self.active {
            return None;
        }
        self.active = false;
        DERIVATION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "derivation stack mismatch: expected depth {}, got {}",
                self.depth,
                stack.len()
            );
            stack.pop()
        })
    }
}

impl Drop for DerivationScope {
    fn drop(&mut self) {
        self.pop();
    }
}

/// Record a read of `cell` against the derivation on top of the stack.
///
/// Cell implementations call this from their value accessor. No-op when
/// nothing is computing, which is what keeps lazy reads untracked.
pub fn record_read(cell: Dependency) {
    DERIVATION_STACK.with(|stack| {
        if let Some(Frame::Tracking(derivation)) = stack.borrow_mut().last_mut() {
            derivation.record(cell);
        }
    });
}

/// Check if a derivation is recording reads right now.
pub fn is_tracking() -> bool {
    DERIVATION_STACK.with(|stack| matches!(stack.borrow().last(), Some(Frame::Tracking(_))))
}

/// The expression whose derivation is on top of the stack, if any.
pub fn current_derivation() -> Option<CellId> {
    DERIVATION_STACK.with(|stack| match stack.borrow().last() {
        Some(Frame::Tracking(derivation)) => derivation.owner,
        _ => None,
    })
}

/// Run `f` without attributing its reads to the enclosing derivation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = DerivationScope::push(Frame::Untracked);
    f()
}
