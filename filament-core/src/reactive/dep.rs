//! Dependencies: addressable notification points.
//!
//! A [`Dep`] represents one observed piece of reactive state. Watchers
//! subscribe to it while evaluating; writers call [`Dep::notify`] to fan a
//! change out to every subscriber.
//!
//! Subscribers are held weakly. Dropping every handle to a watcher silences
//! it without any bookkeeping; dead entries are pruned on the next notify.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::reactive::runtime::Runtime;
use crate::reactive::watcher::{WatcherId, WatcherInner};

/// Unique identifier for a dependency, scoped to one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

struct Sub {
    id: WatcherId,
    watcher: Weak<WatcherInner>,
}

/// One observed reactive value's notification point.
pub struct Dep {
    id: DepId,
    runtime: Runtime,
    subs: Mutex<Vec<Sub>>,
}

impl Dep {
    pub(crate) fn new(runtime: &Runtime) -> Arc<Self> {
        Arc::new(Self {
            id: runtime.next_dep_id(),
            runtime: runtime.clone(),
            subs: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> DepId {
        self.id
    }

    /// Number of live subscriptions.
    pub fn sub_count(&self) -> usize {
        self.subs
            .lock()
            .iter()
            .filter(|s| s.watcher.strong_count() > 0)
            .count()
    }

    /// Register a watcher for notifications. Duplicate registrations for the
    /// same watcher id are ignored.
    pub(crate) fn add_sub(&self, watcher: &Arc<WatcherInner>) {
        let mut subs = self.subs.lock();
        if subs.iter().any(|s| s.id == watcher.id()) {
            return;
        }
        subs.push(Sub {
            id: watcher.id(),
            watcher: Arc::downgrade(watcher),
        });
    }

    pub(crate) fn remove_sub(&self, id: WatcherId) {
        self.subs.lock().retain(|s| s.id != id);
    }

    /// Subscribe the currently evaluating watcher, if there is one.
    pub fn depend(self: &Arc<Self>) {
        if let Some(target) = self.runtime.targets().current() {
            target.add_dep(self);
        }
    }

    /// Deliver an update to every live subscriber, in subscription order.
    pub fn notify(&self) {
        // Collect strong handles first so no subscriber runs with the list
        // borrowed; prune dead entries in the same pass.
        let watchers: Vec<Arc<WatcherInner>> = {
            let mut subs = self.subs.lock();
            subs.retain(|s| s.watcher.strong_count() > 0);
            subs.iter().filter_map(|s| s.watcher.upgrade()).collect()
        };

        for watcher in watchers {
            watcher.update();
        }
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("sub_count", &self.sub_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Expr, Runtime, Scope, Value, Watcher, WatcherKind};

    fn idle_watcher(scope: &Scope, kind: WatcherKind) -> Watcher {
        Watcher::new(scope, Expr::func(|_| Ok(Value::Null)), kind).unwrap()
    }

    #[test]
    fn add_sub_ignores_duplicates() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        let watcher = idle_watcher(&scope, WatcherKind::Effect);
        let dep = Dep::new(&runtime);

        dep.add_sub(watcher.inner());
        dep.add_sub(watcher.inner());

        assert_eq!(dep.sub_count(), 1);
    }

    #[test]
    fn remove_sub_unsubscribes() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        let watcher = idle_watcher(&scope, WatcherKind::Effect);
        let dep = Dep::new(&runtime);

        dep.add_sub(watcher.inner());
        assert_eq!(dep.sub_count(), 1);

        dep.remove_sub(watcher.id());
        assert_eq!(dep.sub_count(), 0);
    }

    #[test]
    fn notify_marks_lazy_subscribers_dirty() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        let first = idle_watcher(&scope, WatcherKind::Computed);
        let second = idle_watcher(&scope, WatcherKind::Computed);

        first.evaluate().unwrap();
        second.evaluate().unwrap();
        assert!(!first.dirty());
        assert!(!second.dirty());

        let dep = Dep::new(&runtime);
        dep.add_sub(first.inner());
        dep.add_sub(second.inner());

        dep.notify();

        assert!(first.dirty());
        assert!(second.dirty());
    }

    #[test]
    fn notify_prunes_dropped_watchers() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        let dep = Dep::new(&runtime);

        {
            let transient = idle_watcher(&scope, WatcherKind::Computed);
            dep.add_sub(transient.inner());
            assert_eq!(dep.sub_count(), 1);
        }

        dep.notify();
        assert_eq!(dep.sub_count(), 0);
    }

    #[test]
    fn depend_without_active_target_is_a_no_op() {
        let runtime = Runtime::new();
        let dep = Dep::new(&runtime);

        dep.depend();
        assert_eq!(dep.sub_count(), 0);
    }
}
