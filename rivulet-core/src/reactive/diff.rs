//! Dependency Diff
//!
//! Turns an old and a new dependency list into the minimal set of
//! subscribe/unsubscribe calls. Only used when a derivation reports that its
//! dependencies changed; the stable case never gets here.
//!
//! Applying a diff is all-or-nothing. Subscriptions are added first because
//! subscribing is the only fallible step (it may force a dormant expression
//! to compute). If one fails, the ones already added are released again and
//! nothing is removed. Removals run last and cannot fail.

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::{trace, warn};

use super::cell::{CellId, Dependency};
use super::subscriber::Subscriber;
use crate::error::Result;

/// Subscription changes between two dependency lists.
#[derive(Debug, Default)]
pub(crate) struct DependencyDiff {
    added: SmallVec<[Dependency; 4]>,
    removed: SmallVec<[Dependency; 4]>,
}

impl DependencyDiff {
    /// Compute `next \ previous` and `previous \ next` by cell identity.
    pub(crate) fn between(previous: &[Dependency], next: &[Dependency]) -> Self {
        let previous_ids: HashSet<CellId> = previous.iter().map(Dependency::id).collect();
        let next_ids: HashSet<CellId> = next.iter().map(Dependency::id).collect();

        Self {
            added: next
                .iter()
                .filter(|dep| !previous_ids.contains(&dep.id()))
                .cloned()
                .collect(),
            removed: previous
                .iter()
                .filter(|dep| !next_ids.contains(&dep.id()))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Converge `subscriber`'s subscriptions onto the new list.
    pub(crate) fn apply(&self, subscriber: &Subscriber) -> Result<()> {
        for (applied, dep) in self.added.iter().enumerate() {
            if let Err(err) = dep.subscribe(subscriber.clone()) {
                warn!(
                    subscriber = %subscriber.id(),
                    cell = %dep.id(),
                    rolled_back = applied,
                    "dependency subscription failed, rolling back"
                );
                for dep in &self.added[..applied] {
                    dep.unsubscribe(subscriber.id());
                }
                return Err(err);
            }
        }

        for dep in &self.removed {
            dep.unsubscribe(subscriber.id());
        }

        trace!(
            subscriber = %subscriber.id(),
            added = self.added.len(),
            removed = self.removed.len(),
            "dependency diff applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::{ComputationError, ReactiveError};
    use crate::reactive::cell::Observable;
    use crate::reactive::subscriber::SubscriberId;

    /// Cell that logs subscription traffic and can be told to refuse.
    struct Recorder {
        id: CellId,
        log: Rc<RefCell<Vec<String>>>,
        refuse: bool,
    }

    impl Observable for Recorder {
        fn id(&self) -> CellId {
            self.id
        }

        fn subscribe(&self, _subscriber: Subscriber) -> Result<()> {
            if self.refuse {
                return Err(ComputationError::msg("refused").into());
            }
            self.log.borrow_mut().push(format!("+{}", self.id));
            Ok(())
        }

        fn unsubscribe(&self, _id: SubscriberId) {
            self.log.borrow_mut().push(format!("-{}", self.id));
        }

        fn subscriber_count(&self) -> usize {
            0
        }
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, refuse: bool) -> Dependency {
        Dependency::new(Rc::new(Recorder {
            id: CellId::new(),
            log: log.clone(),
            refuse,
        }))
    }

    #[test]
    fn diff_touches_only_changed_cells() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, c, d) = (
            recorder(&log, false),
            recorder(&log, false),
            recorder(&log, false),
            recorder(&log, false),
        );

        let diff = DependencyDiff::between(
            &[a.clone(), b.clone(), c.clone()],
            &[a.clone(), d.clone(), c.clone()],
        );
        diff.apply(&Subscriber::new(|| Ok(()))).unwrap();

        assert_eq!(*log.borrow(), vec![format!("+{}", d.id()), format!("-{}", b.id())]);
    }

    #[test]
    fn reordering_is_not_churn() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (recorder(&log, false), recorder(&log, false));

        let diff = DependencyDiff::between(&[a.clone(), b.clone()], &[b, a]);
        assert!(diff.is_empty());
        diff.apply(&Subscriber::new(|| Ok(()))).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failed_subscription_rolls_back() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b, bad) = (
            recorder(&log, false),
            recorder(&log, false),
            recorder(&log, true),
        );

        let diff = DependencyDiff::between(&[a.clone()], &[b.clone(), bad]);
        let err = diff.apply(&Subscriber::new(|| Ok(()))).unwrap_err();

        assert!(matches!(err, ReactiveError::Computation(_)));
        // `b` was added then released; `a` was never removed.
        assert_eq!(*log.borrow(), vec![format!("+{}", b.id()), format!("-{}", b.id())]);
    }
}
