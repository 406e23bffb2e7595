//! Evaluation-target tracking.
//!
//! While a watcher's getter runs, reads of reactive state must be attributed
//! to that watcher and to no other. The target stack records which watcher is
//! currently evaluating; dependencies consult its top when they are read.
//!
//! The stack is owned by a [`Runtime`](super::Runtime) instance rather than
//! by the process, so independent runtimes do not observe each other's
//! evaluations.
//!
//! # Reentrancy
//!
//! A getter may trigger the evaluation of another watcher (reading a stale
//! computed does exactly that). Entries therefore form a stack, and exiting
//! an inner evaluation restores the outer watcher as the active target.
//! [`TargetGuard`] ties the pop to scope exit so the stack is restored on
//! every path out of an evaluation, including getter errors and panics.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::reactive::watcher::{WatcherId, WatcherInner};

/// The stack of currently evaluating watchers.
pub(crate) struct TargetStack {
    stack: Mutex<Vec<Weak<WatcherInner>>>,
}

impl TargetStack {
    pub(crate) fn new() -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
        }
    }

    /// The watcher reads should currently be attributed to, if any.
    pub(crate) fn current(&self) -> Option<Arc<WatcherInner>> {
        self.stack.lock().last().and_then(Weak::upgrade)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    fn push(&self, watcher: Weak<WatcherInner>) {
        self.stack.lock().push(watcher);
    }

    fn pop(&self) -> Option<Weak<WatcherInner>> {
        self.stack.lock().pop()
    }
}

/// Guard marking a watcher as the active evaluation target.
///
/// Dropping the guard restores whatever target was active before the
/// corresponding push.
pub(crate) struct TargetGuard<'a> {
    stack: &'a TargetStack,
    id: WatcherId,
}

impl<'a> TargetGuard<'a> {
    pub(crate) fn enter(stack: &'a TargetStack, watcher: &Arc<WatcherInner>) -> Self {
        stack.push(Arc::downgrade(watcher));
        Self {
            stack,
            id: watcher.id(),
        }
    }
}

impl Drop for TargetGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.pop();

        // Catch mismatched enter/exit pairs early.
        if let Some(entry) = popped.as_ref().and_then(Weak::upgrade) {
            debug_assert_eq!(
                entry.id(),
                self.id,
                "target stack mismatch: expected {:?}, got {:?}",
                self.id,
                entry.id()
            );
        }
    }
}
