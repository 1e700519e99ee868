//! Expression Implementation
//!
//! An Expression is a reactive cell whose value is a pure function of other
//! reactive cells. Its dependencies are discovered by running the function,
//! never declared.
//!
//! # Two Modes
//!
//! - **Dormant** (no subscribers): reading the expression calls the function
//!   directly. Nothing is cached, nothing is subscribed, and the expression
//!   itself is not recorded as a dependency of whoever reads it. Reads made
//!   by the function land on the caller's derivation, if any.
//!
//! - **Reactive** (one or more subscribers): the value is cached and kept
//!   current by push notifications from the expression's dependencies.
//!   Reading returns the cache and records the expression as a dependency of
//!   the current derivation.
//!
//! The switch happens exactly at the 0 ↔ 1 subscriber boundary. Going
//! reactive computes the value once and subscribes to everything the
//! function read. Going dormant drops the cache and releases every
//! dependency, so subscription edges exist only while the expression is
//! reactive.
//!
//! # Recomputation
//!
//! 1. Push a derivation frame seeded with the current dependency list.
//! 2. Run the function; every tracked read is matched against the list.
//! 3. Pop the frame.
//! 4. If the reads differed, diff the old list against the new one and
//!    apply the minimal subscribe/unsubscribe set, then install the new list.
//! 5. Store the value.
//!
//! A failure in step 2 or 4 leaves the dependency list, the subscriptions,
//! and the cached value exactly as they were.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::cell::{CellId, Dependency, Observable, Readable, Subscribers};
use super::context::{self, Derivation, DerivationScope};
use super::diff::DependencyDiff;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::{ReactiveError, Result};

/// When a recomputed expression notifies its own subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyPolicy {
    /// Every upstream notification produces a downstream one.
    #[default]
    Always,

    /// Only notify when the recomputed value differs from the cached one.
    WhenChanged,
}

type ComputeFn<T> = dyn Fn() -> Result<T>;

/// A derived reactive value.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. `PartialEq` is the equatable
///   contract every reactive value satisfies; it is used by
///   [`NotifyPolicy::WhenChanged`].
///
/// # Example
///
/// ```rust
/// use rivulet_core::reactive::{Expression, Observer, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Expression::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// // Dormant: evaluated on demand.
/// assert_eq!(doubled.get().unwrap(), 4);
///
/// // Reactive once someone listens.
/// let observer = Observer::new(&doubled, || Ok(())).unwrap();
/// count.set(5).unwrap();
/// assert_eq!(doubled.get().unwrap(), 10);
/// assert_eq!(observer.notification_count(), 1);
/// ```
pub struct Expression<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<ExpressionInner<T>>,
}

struct ExpressionInner<T> {
    id: CellId,

    /// The wrapped function.
    compute: Box<ComputeFn<T>>,

    /// Cached value. Only meaningful while reactive.
    value: RefCell<Option<T>>,

    /// Cells read during the last successful recomputation, in first-read
    /// order. Always empty while dormant.
    dependencies: RefCell<Rc<[Dependency]>>,

    /// What this expression registers with each of its dependencies.
    listener: Subscriber,

    subscribers: Subscribers,
    policy: Cell<NotifyPolicy>,
    computing: Cell<bool>,
    notifying: Cell<bool>,
    recompute_count: Cell<u64>,
}

impl<T> Expression<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create an expression from an infallible function.
    ///
    /// Nothing is computed until the expression is read or subscribed to.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::try_new(move || Ok::<T, ReactiveError>(compute()))
    }

    /// Create an expression from a fallible function.
    ///
    /// Errors returned by the function surface from whichever operation
    /// caused it to run.
    pub fn try_new<F, E>(compute: F) -> Self
    where
        F: Fn() -> std::result::Result<T, E> + 'static,
        E: Into<ReactiveError>,
    {
        let compute: Box<ComputeFn<T>> = Box::new(move || compute().map_err(Into::into));

        let inner = Rc::new_cyclic(|this: &Weak<ExpressionInner<T>>| {
            let this = this.clone();
            ExpressionInner {
                id: CellId::new(),
                compute,
                value: RefCell::new(None),
                dependencies: RefCell::new(Rc::from(Vec::new())),
                listener: Subscriber::new(move || match this.upgrade() {
                    Some(expression) => expression.on_dependency_changed(),
                    None => Ok(()),
                }),
                subscribers: Subscribers::default(),
                policy: Cell::new(NotifyPolicy::default()),
                computing: Cell::new(false),
                notifying: Cell::new(false),
                recompute_count: Cell::new(0),
            }
        });

        Self { inner }
    }

    /// Set the notification policy.
    pub fn with_notify_policy(self, policy: NotifyPolicy) -> Self {
        self.inner.policy.set(policy);
        self
    }

    /// Get the expression's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// Dormant expressions evaluate their function; reactive ones return the
    /// cached value and record themselves as a dependency of the current
    /// derivation.
    ///
    /// Reading an expression from inside its own function, directly or
    /// through other expressions, fails with [`ReactiveError::Cycle`].
    pub fn get(&self) -> Result<T> {
        if self.inner.computing.get() {
            return Err(ReactiveError::Cycle { cell: self.inner.id });
        }

        // The cache is populated exactly while reactive.
        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => {
                context::record_read(Dependency::new(self.inner.clone()));
                Ok(value)
            }
            None => self.inner.evaluate(),
        }
    }

    /// Get the current value without recording any dependency.
    pub fn get_untracked(&self) -> Result<T> {
        context::untracked(|| self.get())
    }

    /// Whether the expression has subscribers and a live cached value.
    pub fn is_reactive(&self) -> bool {
        !self.inner.subscribers.is_empty()
    }

    /// The current notification policy.
    pub fn notify_policy(&self) -> NotifyPolicy {
        self.inner.policy.get()
    }

    /// IDs of the cells read during the last recomputation, in read order.
    pub fn dependency_ids(&self) -> Vec<CellId> {
        self.inner
            .dependencies
            .borrow()
            .iter()
            .map(Dependency::id)
            .collect()
    }

    /// Number of tracked recomputations performed so far.
    ///
    /// Dormant evaluations are not counted.
    pub fn recompute_count(&self) -> u64 {
        self.inner.recompute_count.get()
    }
}

impl<T> ExpressionInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn begin_computing(&self) -> Result<FlagGuard<'_>> {
        FlagGuard::raise(&self.computing, self.id)
    }

    /// Run the function without a frame of our own.
    fn evaluate(&self) -> Result<T> {
        let _computing = self.begin_computing()?;
        (self.compute)()
    }

    /// Recompute and converge subscriptions. Returns whether the value changed.
    fn recompute(&self) -> Result<bool> {
        let _computing = self.begin_computing()?;
        let previous = Rc::clone(&*self.dependencies.borrow());

        let scope = DerivationScope::enter(Derivation::new(self.id, Rc::clone(&previous)));
        let outcome = (self.compute)();
        let derivation = scope.exit();
        let value = outcome?;

        let changed = derivation.into_changed_dependencies();
        trace!(
            cell = %self.id,
            dependencies_changed = changed.is_some(),
            "expression recomputed"
        );

        if let Some(next) = changed {
            DependencyDiff::between(&previous, &next).apply(&self.listener)?;
            *self.dependencies.borrow_mut() = next;
        }

        self.recompute_count.set(self.recompute_count.get() + 1);

        let mut slot = self.value.borrow_mut();
        let value_changed = slot.as_ref() != Some(&value);
        *slot = Some(value);
        Ok(value_changed)
    }

    fn on_dependency_changed(&self) -> Result<()> {
        // A notification already in flight when we went dormant.
        if self.subscribers.is_empty() {
            return Ok(());
        }

        // Being notified again before our own round finished means the
        // notification went around a loop back to us.
        let _notifying = FlagGuard::raise(&self.notifying, self.id)?;

        let value_changed = self.recompute()?;
        if value_changed || self.policy.get() == NotifyPolicy::Always {
            self.subscribers.notify_all()?;
        }
        Ok(())
    }

    fn become_dormant(&self) {
        self.value.borrow_mut().take();
        let released = std::mem::replace(&mut *self.dependencies.borrow_mut(), Rc::from(Vec::new()));
        for dependency in released.iter() {
            dependency.unsubscribe(self.listener.id());
        }
        debug!(cell = %self.id, released = released.len(), "expression became dormant");
    }
}

impl<T> Observable for ExpressionInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> CellId {
        self.id
    }

    fn subscribe(&self, subscriber: Subscriber) -> Result<()> {
        if self.subscribers.contains(subscriber.id()) {
            return Ok(());
        }

        if self.subscribers.is_empty() {
            self.recompute()?;
            debug!(
                cell = %self.id,
                dependencies = self.dependencies.borrow().len(),
                "expression became reactive"
            );
        }

        self.subscribers.insert(subscriber);
        Ok(())
    }

    fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(id) && self.subscribers.is_empty() {
            self.become_dormant();
        }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Drop for ExpressionInner<T> {
    fn drop(&mut self) {
        for dependency in self.dependencies.get_mut().iter() {
            dependency.unsubscribe(self.listener.id());
        }
    }
}

/// Holds an in-progress flag raised until dropped.
struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    /// Raise `flag`, failing with a cycle on `cell` if it is already up.
    fn raise(flag: &'a Cell<bool>, cell: CellId) -> Result<Self> {
        if flag.replace(true) {
            return Err(ReactiveError::Cycle { cell });
        }
        Ok(Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T> Observable for Expression<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> CellId {
        self.inner.id
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

impl<T> Readable<T> for Expression<T>
where
    T: Clone + PartialEq + 'static,
{
    fn read(&self) -> Result<T> {
        self.get()
    }
}

impl<T> Clone for Expression<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Expression<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("id", &self.inner.id)
            .field("reactive", &self.is_reactive())
            .field("value", &*self.inner.value.borrow())
            .field("dependencies", &self.dependency_ids())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComputationError;
    use crate::reactive::Signal;

    type Log = Rc<RefCell<Vec<String>>>;

    /// An integer cell that logs every subscribe/unsubscribe it receives.
    #[derive(Clone)]
    struct Tap(Rc<TapInner>);

    struct TapInner {
        id: CellId,
        name: &'static str,
        signal: Signal<i32>,
        log: Log,
    }

    impl Tap {
        fn new(name: &'static str, value: i32, log: &Log) -> Self {
            Self(Rc::new(TapInner {
                id: CellId::new(),
                name,
                signal: Signal::new(value),
                log: log.clone(),
            }))
        }

        fn get(&self) -> i32 {
            context::record_read(Dependency::new(self.0.clone()));
            self.0.signal.get_untracked()
        }

        fn set(&self, value: i32) -> Result<()> {
            self.0.signal.set(value)
        }

        fn subscriber_count(&self) -> usize {
            self.0.signal.subscriber_count()
        }
    }

    impl Observable for TapInner {
        fn id(&self) -> CellId {
            self.id
        }

        fn subscribe(&self, subscriber: Subscriber) -> Result<()> {
            self.log.borrow_mut().push(format!("+{}", self.name));
            self.signal.subscribe(subscriber)
        }

        fn unsubscribe(&self, id: SubscriberId) {
            self.log.borrow_mut().push(format!("-{}", self.name));
            self.signal.unsubscribe(id);
        }

        fn subscriber_count(&self) -> usize {
            self.signal.subscriber_count()
        }
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.borrow_mut())
    }

    fn counting_subscriber() -> (Rc<Cell<u32>>, Subscriber) {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let subscriber = Subscriber::new(move || {
            calls_clone.set(calls_clone.get() + 1);
            Ok(())
        });
        (calls, subscriber)
    }

    fn noop() -> Subscriber {
        Subscriber::new(|| Ok(()))
    }

    #[test]
    fn dormant_reads_evaluate_fresh_without_subscribing() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let expr = Expression::new({
            let a = a.clone();
            move || a.get() * 2
        });

        assert_eq!(expr.get().unwrap(), 2);
        a.set(5).unwrap();
        assert_eq!(expr.get().unwrap(), 10);

        assert!(!expr.is_reactive());
        assert!(expr.dependency_ids().is_empty());
        assert_eq!(expr.recompute_count(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn first_subscriber_computes_once_and_subscribes_to_reads() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let runs = Rc::new(Cell::new(0));
        let expr = Expression::new({
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                a.get() + b.get()
            }
        });

        expr.subscribe(noop()).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(take(&log), vec!["+a", "+b"]);
        assert_eq!(expr.dependency_ids(), vec![a.0.id, b.0.id]);

        expr.subscribe(noop()).unwrap();
        assert_eq!(runs.get(), 1);
        assert!(log.borrow().is_empty());
        assert_eq!(expr.subscriber_count(), 2);
    }

    #[test]
    fn reactive_reads_return_cache() {
        let log = log();
        let a = Tap::new("a", 3, &log);
        let runs = Rc::new(Cell::new(0));
        let expr = Expression::new({
            let (a, runs) = (a.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                a.get()
            }
        });

        expr.subscribe(noop()).unwrap();
        for _ in 0..3 {
            assert_eq!(expr.get().unwrap(), 3);
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn stable_dependencies_cause_no_churn() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let expr = Expression::new({
            let (a, b) = (a.clone(), b.clone());
            move || a.get() * b.get()
        });

        expr.subscribe(noop()).unwrap();
        take(&log);

        a.set(10).unwrap();
        b.set(20).unwrap();

        assert_eq!(expr.get().unwrap(), 200);
        assert_eq!(expr.recompute_count(), 3);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn changed_dependencies_apply_exact_diff() {
        let log = log();
        let (a, b, c, d) = (
            Tap::new("a", 1, &log),
            Tap::new("b", 2, &log),
            Tap::new("c", 3, &log),
            Tap::new("d", 4, &log),
        );
        let use_b = Rc::new(Cell::new(true));
        let expr = Expression::new({
            let (a, b, c, d, use_b) = (a.clone(), b.clone(), c.clone(), d.clone(), use_b.clone());
            move || {
                let first = a.get();
                let middle = if use_b.get() { b.get() } else { d.get() };
                first + middle + c.get()
            }
        });

        expr.subscribe(noop()).unwrap();
        assert_eq!(take(&log), vec!["+a", "+b", "+c"]);

        use_b.set(false);
        a.set(10).unwrap();

        // `a` and `c` are neither released nor subscribed again.
        assert_eq!(take(&log), vec!["+d", "-b"]);
        assert_eq!(expr.dependency_ids(), vec![a.0.id, d.0.id, c.0.id]);
        assert_eq!(expr.get().unwrap(), 17);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn dropped_reads_release_their_subscriptions() {
        let log = log();
        let (a, b) = (Tap::new("a", 0, &log), Tap::new("b", 2, &log));
        let expr = Expression::new({
            let (a, b) = (a.clone(), b.clone());
            move || if a.get() > 0 { a.get() } else { a.get() + b.get() }
        });

        expr.subscribe(noop()).unwrap();
        take(&log);

        a.set(1).unwrap();
        assert_eq!(take(&log), vec!["-b"]);
        assert_eq!(expr.dependency_ids(), vec![a.0.id]);
    }

    #[test]
    fn dependency_change_propagates_once() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let expr = Expression::new({
            let a = a.clone();
            move || a.get() + 1
        });
        let (calls, subscriber) = counting_subscriber();
        expr.subscribe(subscriber).unwrap();

        a.set(5).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(expr.get().unwrap(), 6);

        a.set(6).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unchanged_value_still_notifies_by_default() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let parity = Expression::new({
            let a = a.clone();
            move || a.get() % 2
        });
        assert_eq!(parity.notify_policy(), NotifyPolicy::Always);

        let (calls, subscriber) = counting_subscriber();
        parity.subscribe(subscriber).unwrap();

        a.set(3).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn when_changed_policy_suppresses_equal_values() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let parity = Expression::new({
            let a = a.clone();
            move || a.get() % 2
        })
        .with_notify_policy(NotifyPolicy::WhenChanged);

        let (calls, subscriber) = counting_subscriber();
        parity.subscribe(subscriber).unwrap();

        a.set(3).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(parity.recompute_count(), 2);

        a.set(4).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn last_unsubscribe_releases_everything() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let expr = Expression::new({
            let (a, b) = (a.clone(), b.clone());
            move || a.get() + b.get()
        });

        let first = noop();
        let second = noop();
        expr.subscribe(first.clone()).unwrap();
        expr.subscribe(second.clone()).unwrap();
        take(&log);

        expr.unsubscribe(first.id());
        assert!(expr.is_reactive());
        assert!(log.borrow().is_empty());

        expr.unsubscribe(second.id());
        assert!(!expr.is_reactive());
        assert_eq!(take(&log), vec!["-a", "-b"]);
        assert!(expr.dependency_ids().is_empty());
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);

        // Back to lazy evaluation.
        a.set(40).unwrap();
        assert_eq!(expr.get().unwrap(), 42);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn resubscribing_starts_from_scratch() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let expr = Expression::new({
            let a = a.clone();
            move || a.get()
        });

        let subscriber = noop();
        expr.subscribe(subscriber.clone()).unwrap();
        expr.unsubscribe(subscriber.id());
        expr.subscribe(subscriber).unwrap();

        assert_eq!(take(&log), vec!["+a", "-a", "+a"]);
        assert_eq!(expr.recompute_count(), 2);
    }

    #[test]
    fn reactive_inner_is_a_single_dependency() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let inner = Expression::new({
            let b = b.clone();
            move || b.get() * 10
        });
        let outer = Expression::try_new({
            let (a, inner) = (a.clone(), inner.clone());
            move || Ok::<_, ReactiveError>(a.get() + inner.get()?)
        });

        inner.subscribe(noop()).unwrap();
        outer.subscribe(noop()).unwrap();
        assert_eq!(outer.dependency_ids(), vec![a.0.id, inner.id()]);
        assert_eq!(inner.dependency_ids(), vec![b.0.id]);

        b.set(3).unwrap();
        assert_eq!(inner.get().unwrap(), 30);
        assert_eq!(outer.get().unwrap(), 31);
    }

    #[test]
    fn dormant_inner_is_transparent() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let inner = Expression::new({
            let b = b.clone();
            move || b.get() * 10
        });
        let outer = Expression::try_new({
            let (a, inner) = (a.clone(), inner.clone());
            move || Ok::<_, ReactiveError>(a.get() + inner.get()?)
        });

        outer.subscribe(noop()).unwrap();
        assert!(!inner.is_reactive());
        assert_eq!(outer.dependency_ids(), vec![a.0.id, b.0.id]);

        b.set(4).unwrap();
        assert_eq!(outer.get().unwrap(), 41);
    }

    #[test]
    fn inner_recompute_during_outer_derivation_keeps_attribution() {
        let log = log();
        let (a, b, c) = (
            Tap::new("a", 1, &log),
            Tap::new("b", 2, &log),
            Tap::new("c", 3, &log),
        );
        let inner = Expression::new({
            let b = b.clone();
            move || b.get() * 10
        });
        let listener = noop();
        let outer = Expression::try_new({
            let (a, c, inner, listener) = (a.clone(), c.clone(), inner.clone(), listener.clone());
            move || {
                let first = a.get();
                // Forces `inner` to run its own derivation in the middle of ours.
                inner.subscribe(listener.clone())?;
                Ok::<_, ReactiveError>(first + inner.get()? + c.get())
            }
        });

        outer.subscribe(noop()).unwrap();

        assert_eq!(outer.get().unwrap(), 24);
        assert_eq!(outer.dependency_ids(), vec![a.0.id, inner.id(), c.0.id]);
        assert_eq!(inner.dependency_ids(), vec![b.0.id]);
        assert!(!context::is_tracking());
    }

    #[test]
    fn failed_first_computation_stays_dormant() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let expr: Expression<i32> = Expression::try_new({
            let a = a.clone();
            move || {
                a.get();
                Err(ComputationError::msg("boom"))
            }
        });

        let err = expr.subscribe(noop()).unwrap_err();
        assert!(matches!(err, ReactiveError::Computation(_)));
        assert!(!expr.is_reactive());
        assert!(log.borrow().is_empty());
        assert!(!context::is_tracking());
    }

    #[test]
    fn failed_recompute_leaves_state_untouched() {
        let log = log();
        let (a, b) = (Tap::new("a", 1, &log), Tap::new("b", 2, &log));
        let expr = Expression::try_new({
            let (a, b) = (a.clone(), b.clone());
            move || {
                let x = a.get();
                if x < 0 {
                    return Err(ComputationError::msg("negative input"));
                }
                Ok(x + b.get())
            }
        });

        expr.subscribe(noop()).unwrap();
        take(&log);

        let err = a.set(-1).unwrap_err();
        assert_eq!(err.to_string(), "computation failed: negative input");
        assert_eq!(expr.dependency_ids(), vec![a.0.id, b.0.id]);
        assert_eq!(expr.get().unwrap(), 3);
        assert!(log.borrow().is_empty());

        a.set(5).unwrap();
        assert_eq!(expr.get().unwrap(), 7);
    }

    #[test]
    fn self_triggering_expression_reports_cycle() {
        let s = Signal::new(5);
        let expr = Expression::try_new({
            let s = s.clone();
            move || {
                let v = s.get();
                if v < 3 {
                    s.set(v + 1)?;
                }
                Ok::<_, ReactiveError>(v)
            }
        });

        expr.subscribe(noop()).unwrap();

        let err = s.set(0).unwrap_err();
        assert!(matches!(err, ReactiveError::Cycle { cell } if cell == expr.id()));
        assert!(!context::is_tracking());
    }

    type Slot = Rc<RefCell<Option<Expression<i32>>>>;

    fn read_slot(slot: &Slot) -> Result<i32> {
        match slot.borrow().as_ref() {
            Some(expression) => expression.get(),
            None => Ok(0),
        }
    }

    #[test]
    fn reactive_self_read_reports_cycle() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let me: Slot = Rc::new(RefCell::new(None));
        let expr = Expression::try_new({
            let (a, me) = (a.clone(), me.clone());
            move || {
                let v = a.get();
                if v > 1 {
                    return Ok(v + read_slot(&me)?);
                }
                Ok::<_, ReactiveError>(v)
            }
        });
        *me.borrow_mut() = Some(expr.clone());

        expr.subscribe(noop()).unwrap();
        assert_eq!(expr.get().unwrap(), 1);

        let err = a.set(2).unwrap_err();
        assert!(matches!(err, ReactiveError::Cycle { cell } if cell == expr.id()));
        assert_eq!(expr.dependency_ids(), vec![a.0.id]);
        assert_eq!(expr.subscriber_count(), 1);
        assert_eq!(expr.get().unwrap(), 1);
        assert!(!context::is_tracking());

        me.borrow_mut().take();
    }

    #[test]
    fn mutually_dependent_expressions_report_cycle() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let other: Slot = Rc::new(RefCell::new(None));
        let x = Expression::try_new({
            let (a, other) = (a.clone(), other.clone());
            move || {
                let v = a.get();
                if v > 1 {
                    return Ok(v + read_slot(&other)?);
                }
                Ok::<_, ReactiveError>(v)
            }
        });
        let y = Expression::try_new({
            let x = x.clone();
            move || Ok::<_, ReactiveError>(x.get()? * 10)
        });
        *other.borrow_mut() = Some(y.clone());

        x.subscribe(noop()).unwrap();
        y.subscribe(noop()).unwrap();
        assert_eq!(y.dependency_ids(), vec![x.id()]);

        // `x` starts reading `y`, so each one now notifies the other.
        let err = a.set(2).unwrap_err();
        assert!(matches!(err, ReactiveError::Cycle { cell } if cell == x.id()));
        assert!(!context::is_tracking());

        other.borrow_mut().take();
    }

    #[test]
    fn dropping_reactive_expression_releases_dependencies() {
        let log = log();
        let a = Tap::new("a", 1, &log);
        let expr = Expression::new({
            let a = a.clone();
            move || a.get()
        });

        expr.subscribe(noop()).unwrap();
        assert_eq!(a.subscriber_count(), 1);

        drop(expr);
        assert_eq!(a.subscriber_count(), 0);
    }
}
