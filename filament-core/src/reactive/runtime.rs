//! Reactive runtime instances.
//!
//! A [`Runtime`] owns everything watchers share: the id generators for
//! watchers and dependencies, the active-target stack, and the batching
//! scheduler. Keeping these on an instance rather than in process-wide
//! statics means independent runtimes neither share nor race on ids, and
//! tests can spin up isolated reactive worlds.
//!
//! Handles are cheap clones of the same instance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::reactive::context::TargetStack;
use crate::reactive::dep::DepId;
use crate::reactive::scheduler::Scheduler;
use crate::reactive::watcher::{Watcher, WatcherId};

/// The coordinator for one reactive world.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    watcher_ids: AtomicU64,
    dep_ids: AtomicU64,
    targets: TargetStack,
    scheduler: Scheduler,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                watcher_ids: AtomicU64::new(0),
                dep_ids: AtomicU64::new(0),
                targets: TargetStack::new(),
                scheduler: Scheduler::new(),
            }),
        }
    }

    pub(crate) fn next_watcher_id(&self) -> WatcherId {
        WatcherId::from_raw(self.inner.watcher_ids.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_dep_id(&self) -> DepId {
        DepId::from_raw(self.inner.dep_ids.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn targets(&self) -> &TargetStack {
        &self.inner.targets
    }

    /// Whether a watcher evaluation is currently in progress.
    pub fn is_tracking(&self) -> bool {
        self.inner.targets.depth() > 0
    }

    pub(crate) fn queue(&self, watcher: Watcher) {
        self.inner.scheduler.queue_watcher(watcher);
    }

    /// Watchers queued for the next flush.
    pub fn pending_watchers(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Run every queued watcher once, in ascending-id order. Called by the
    /// embedder once per logical tick.
    pub fn flush(&self) {
        self.inner.scheduler.flush();
    }
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("pending_watchers", &self.pending_watchers())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}
