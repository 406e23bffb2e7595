//! Batching scheduler.
//!
//! Change notifications do not re-run watchers directly; they queue them
//! here. A flush then runs each queued watcher exactly once, in ascending-id
//! order. Ids are assigned in creation order, so ancestors run before the
//! watchers they created and redundant intermediate work is avoided.
//!
//! Watchers queued while a flush is running are spliced into the current
//! batch at their sorted position, so a flush drains fully. A watcher that
//! keeps re-queueing itself trips a bounded circuit breaker instead of
//! keeping the flush alive forever.
//!
//! Flushing is explicitly driven by the embedder via
//! [`Runtime::flush`](super::Runtime::flush); there is no implicit tick.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::error::Error;
use crate::reactive::watcher::{Watcher, WatcherId};

/// How many times one watcher may re-queue itself within a single flush
/// before it is dropped from the batch.
const MAX_UPDATE_COUNT: u32 = 100;

pub(crate) struct Scheduler {
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    queue: Vec<Watcher>,
    has: HashSet<WatcherId>,
    circular: HashMap<WatcherId, u32>,
    flushing: bool,
    index: usize,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                queue: Vec::new(),
                has: HashSet::new(),
                circular: HashMap::new(),
                flushing: false,
                index: 0,
            }),
        }
    }

    /// Watchers queued and not yet run.
    pub(crate) fn pending(&self) -> usize {
        let state = self.state.lock();
        state.queue.len() - state.index
    }

    /// Enqueue a watcher for the next flush. At most one pending entry per
    /// watcher id, no matter how many notifications arrive.
    pub(crate) fn queue_watcher(&self, watcher: Watcher) {
        let id = watcher.id();
        let mut state = self.state.lock();
        if state.has.contains(&id) {
            return;
        }
        state.has.insert(id);

        if !state.flushing {
            state.queue.push(watcher);
        } else {
            // Splice into the running batch at the sorted position, past the
            // watcher currently being run.
            let mut i = state.queue.len();
            while i > state.index && state.queue[i - 1].id() > id {
                i -= 1;
            }
            state.queue.insert(i, watcher);
        }
        tracing::trace!(watcher = id.raw(), "queued watcher");
    }

    /// Run every queued watcher once, in ascending-id order.
    ///
    /// One watcher's failure is logged and does not prevent its siblings
    /// from running.
    pub(crate) fn flush(&self) {
        {
            let mut state = self.state.lock();
            if state.flushing || state.queue.is_empty() {
                return;
            }
            state.flushing = true;
            state.queue.sort_by_key(Watcher::id);
            tracing::trace!(batch = state.queue.len(), "flushing watcher queue");
        }

        loop {
            let next = {
                let mut state = self.state.lock();
                if state.index >= state.queue.len() {
                    None
                } else {
                    let watcher = state.queue[state.index].clone();
                    state.index += 1;
                    // Cleared before the run so the watcher can queue itself
                    // again from its own callback.
                    state.has.remove(&watcher.id());
                    Some(watcher)
                }
            };
            let watcher = match next {
                Some(watcher) => watcher,
                None => break,
            };
            let id = watcher.id();

            if let Err(err) = watcher.run() {
                if matches!(err, Error::UserCallback { .. }) {
                    tracing::error!(
                        watcher = id.raw(),
                        expression = watcher.expression(),
                        error = %err,
                        "error in user watch handler"
                    );
                } else {
                    tracing::error!(
                        watcher = id.raw(),
                        expression = watcher.expression(),
                        error = %err,
                        "watcher failed during flush"
                    );
                }
            }

            // A watcher that re-queued itself while running is making no
            // progress once it exceeds the update budget.
            let mut state = self.state.lock();
            if state.has.contains(&id) {
                let count = {
                    let entry = state.circular.entry(id).or_insert(0);
                    *entry += 1;
                    *entry
                };
                if count > MAX_UPDATE_COUNT {
                    state.has.remove(&id);
                    let from = state.index;
                    if let Some(pos) = state.queue[from..].iter().position(|w| w.id() == id) {
                        state.queue.remove(from + pos);
                    }
                    tracing::error!(
                        watcher = id.raw(),
                        expression = watcher.expression(),
                        "possible infinite update loop; dropping watcher from batch"
                    );
                }
            }
        }

        let mut state = self.state.lock();
        state.queue.clear();
        state.has.clear();
        state.circular.clear();
        state.index = 0;
        state.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Expr, Runtime, Scope, Value, Watcher, WatcherKind};
    use parking_lot::Mutex as PMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn repeated_updates_produce_one_run_per_flush() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        scope.set("x", 0).unwrap();

        let evals = Arc::new(AtomicUsize::new(0));
        let count = evals.clone();
        let _watcher = Watcher::new(
            &scope,
            Expr::func(move |scope| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(scope.get("x")?)
            }),
            WatcherKind::Effect,
        )
        .unwrap();

        assert_eq!(evals.load(Ordering::SeqCst), 1);

        scope.set("x", 1).unwrap();
        scope.set("x", 2).unwrap();
        scope.set("x", 3).unwrap();
        assert_eq!(runtime.pending_watchers(), 1);

        runtime.flush();
        assert_eq!(evals.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.pending_watchers(), 0);
    }

    #[test]
    fn flush_runs_watchers_in_ascending_id_order() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        scope.set("x", 0).unwrap();

        let order = Arc::new(PMutex::new(Vec::new()));

        let log = order.clone();
        let first = Watcher::new(
            &scope,
            Expr::func(move |scope| {
                log.lock().push("first");
                Ok(scope.get("x")?)
            }),
            WatcherKind::Effect,
        )
        .unwrap();

        let log = order.clone();
        let second = Watcher::new(
            &scope,
            Expr::func(move |scope| {
                log.lock().push("second");
                Ok(scope.get("x")?)
            }),
            WatcherKind::Effect,
        )
        .unwrap();

        assert!(first.id() < second.id());
        order.lock().clear();

        // Queue out of creation order.
        second.update();
        first.update();
        runtime.flush();

        assert_eq!(order.lock().as_slice(), &["first", "second"]);
    }

    #[test]
    fn one_failing_watcher_does_not_stop_its_siblings() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        scope.set("fail", false).unwrap();
        scope.set("x", 0).unwrap();

        let failing = Watcher::new(
            &scope,
            Expr::func(|scope| {
                if scope.get("fail")?.as_bool().unwrap_or(false) {
                    Err("expression blew up".into())
                } else {
                    Ok(Value::Null)
                }
            }),
            WatcherKind::Effect,
        )
        .unwrap();

        let evals = Arc::new(AtomicUsize::new(0));
        let count = evals.clone();
        let healthy = Watcher::new(
            &scope,
            Expr::func(move |scope| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(scope.get("x")?)
            }),
            WatcherKind::Effect,
        )
        .unwrap();

        scope.set("fail", true).unwrap();
        failing.update();
        healthy.update();
        runtime.flush();

        // The failing watcher ran first (lower id) and erred; the healthy
        // one still ran.
        assert_eq!(evals.load(Ordering::SeqCst), 2);
        assert_eq!(runtime.pending_watchers(), 0);
    }

    #[test]
    fn watcher_queued_mid_flush_runs_in_the_same_batch() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        scope.set("x", 0).unwrap();
        scope.set("y", 0).unwrap();

        // The first watcher's callback writes `y`, which the second watches.
        let _writer = Watcher::with_callback(
            &scope,
            Expr::path("x"),
            WatcherKind::Effect,
            |scope, new, _old| {
                scope.set("y", new.clone())?;
                Ok(())
            },
        )
        .unwrap();

        let y_runs = Arc::new(AtomicUsize::new(0));
        let count = y_runs.clone();
        let _reader = Watcher::with_callback(
            &scope,
            Expr::path("y"),
            WatcherKind::Effect,
            move |_, _, _| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        scope.set("x", 5).unwrap();
        assert_eq!(runtime.pending_watchers(), 1);

        runtime.flush();

        // One flush handled both the write and the knock-on update.
        assert_eq!(y_runs.load(Ordering::SeqCst), 1);
        assert_eq!(scope.peek("y").unwrap(), Value::Number(5.0));
        assert_eq!(runtime.pending_watchers(), 0);
    }

    #[test]
    fn self_requeueing_watcher_trips_the_circuit_breaker() {
        let runtime = Runtime::new();
        let scope = Scope::new(&runtime);
        scope.set("x", 0).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let count = runs.clone();
        let _watcher = Watcher::with_callback(
            &scope,
            Expr::path("x"),
            WatcherKind::Effect,
            move |scope, new, _old| {
                count.fetch_add(1, Ordering::SeqCst);
                let n = new.as_number().unwrap_or(0.0);
                scope.set("x", n + 1.0)?;
                Ok(())
            },
        )
        .unwrap();

        scope.set("x", 1).unwrap();
        // Must terminate despite the watcher incrementing its own source.
        runtime.flush();

        let total = runs.load(Ordering::SeqCst);
        assert!(total > MAX_UPDATE_COUNT as usize);
        assert!(total <= MAX_UPDATE_COUNT as usize + 2);
        assert_eq!(runtime.pending_watchers(), 0);
    }
}
