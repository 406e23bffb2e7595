//! Watchers: reactive computation nodes.
//!
//! A [`Watcher`] binds a getter to a [`Scope`], evaluates it, and records
//! which pieces of reactive state the evaluation read. When any of those
//! change, the watcher either re-runs through the runtime's scheduler
//! (effects) or marks its cached value stale for the next pull (computed).
//!
//! # Evaluation cycle
//!
//! `get()` makes this watcher the active target, runs the getter, and
//! restores the previous target on success and failure alike. Dependency
//! collection happens as a side effect: every tracked read during the getter
//! lands in [`WatcherInner::add_dep`] via the dep's `depend()`. After the
//! getter returns, the dependencies read this pass replace the previous
//! set, and the watcher unsubscribes from anything it no longer reads.
//!
//! # Kinds
//!
//! - [`WatcherKind::Effect`]: eager; change notifications queue a re-run.
//! - [`WatcherKind::UserEffect`]: same, but callback failures are reported
//!   as user-code errors.
//! - [`WatcherKind::Computed`]: lazy; notifications only set a dirty flag,
//!   and consumers pull through [`Watcher::computed_value`].

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::{BoxError, Error, Result};
use crate::reactive::context::TargetGuard;
use crate::reactive::dep::{Dep, DepId};
use crate::reactive::path::path_getter;
use crate::reactive::runtime::Runtime;
use crate::reactive::scope::{Scope, ScopeInner};
use crate::reactive::value::Value;

/// Unique identifier for a watcher, scoped to one runtime.
///
/// Ids are assigned in creation order; the scheduler flushes in ascending-id
/// order so ancestors run before the watchers they created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl WatcherId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Getter signature: evaluate an expression against the scope.
pub type GetterFn =
    dyn Fn(&Scope) -> std::result::Result<Value, BoxError> + Send + Sync;

/// Change callback signature: `(scope, new_value, old_value)`.
pub type CallbackFn =
    dyn Fn(&Scope, &Value, &Value) -> std::result::Result<(), BoxError> + Send + Sync;

/// What a watcher evaluates: a dotted path into the scope, or a closure.
///
/// Both resolve into one uniform getter at construction, so evaluation never
/// branches on the expression form.
pub enum Expr {
    Path(String),
    Func(Box<GetterFn>),
}

impl Expr {
    pub fn path(path: impl Into<String>) -> Self {
        Expr::Path(path.into())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Scope) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    {
        Expr::Func(Box::new(f))
    }
}

impl From<&str> for Expr {
    fn from(path: &str) -> Self {
        Expr::Path(path.to_string())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Expr::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// The role a watcher plays in the reactive graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    /// Framework-owned eager watcher (view bindings).
    Effect,
    /// User-authored eager watch.
    UserEffect,
    /// Pull-based cached computation.
    Computed,
}

impl WatcherKind {
    pub fn is_lazy(self) -> bool {
        matches!(self, WatcherKind::Computed)
    }

    pub fn is_user(self) -> bool {
        matches!(self, WatcherKind::UserEffect)
    }
}

type DepList = SmallVec<[Arc<Dep>; 4]>;

struct WatcherState {
    value: Value,
    /// Meaningful only for computed watchers.
    dirty: bool,
    active: bool,
    /// Dependencies as of the latest completed evaluation, in
    /// first-subscribed order.
    deps: DepList,
    dep_ids: HashSet<DepId>,
    /// Dependencies read by the evaluation currently in progress.
    new_deps: DepList,
    new_dep_ids: HashSet<DepId>,
}

pub(crate) struct WatcherInner {
    id: WatcherId,
    runtime: Runtime,
    scope: Weak<ScopeInner>,
    kind: WatcherKind,
    /// Diagnostic label: the path text, or `"<fn>"` for closure getters.
    expression: String,
    getter: Box<GetterFn>,
    callback: Option<Box<CallbackFn>>,
    state: Mutex<WatcherState>,
}

/// A reactive computation node.
///
/// Clones share the same underlying watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher without a callback (dependency-side-effect only).
    pub fn new(scope: &Scope, expr: Expr, kind: WatcherKind) -> Result<Watcher> {
        Self::build(scope, expr, None, kind)
    }

    /// Create a watcher whose callback fires on value change with
    /// `(scope, new_value, old_value)`.
    pub fn with_callback<F>(
        scope: &Scope,
        expr: Expr,
        kind: WatcherKind,
        callback: F,
    ) -> Result<Watcher>
    where
        F: Fn(&Scope, &Value, &Value) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::build(scope, expr, Some(Box::new(callback)), kind)
    }

    fn build(
        scope: &Scope,
        expr: Expr,
        callback: Option<Box<CallbackFn>>,
        kind: WatcherKind,
    ) -> Result<Watcher> {
        let runtime = scope.runtime().clone();
        let (expression, getter) = match expr {
            Expr::Func(f) => ("<fn>".to_string(), f),
            Expr::Path(path) => {
                let getter = path_getter(&path)?;
                (path, getter)
            }
        };

        let inner = Arc::new(WatcherInner {
            id: runtime.next_watcher_id(),
            runtime,
            scope: scope.downgrade(),
            kind,
            expression,
            getter,
            callback,
            state: Mutex::new(WatcherState {
                value: Value::Null,
                dirty: kind.is_lazy(),
                active: true,
                deps: DepList::new(),
                dep_ids: HashSet::new(),
                new_deps: DepList::new(),
                new_dep_ids: HashSet::new(),
            }),
        });

        // Eager first evaluation: `value` is populated even for computed
        // watchers, whose dirty flag stays set until the first pull.
        let value = inner.get()?;
        inner.state.lock().value = value;

        Ok(Watcher { inner })
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn kind(&self) -> WatcherKind {
        self.inner.kind
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The last computed result.
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    /// Whether the cached value is stale. Always `false` for non-computed
    /// watchers.
    pub fn dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Number of dependencies subscribed as of the latest evaluation.
    pub fn dep_count(&self) -> usize {
        self.inner.state.lock().deps.len()
    }

    /// Snapshot of the subscribed dependency ids, in subscription order.
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.inner.state.lock().deps.iter().map(|d| d.id()).collect()
    }

    /// Notification entry point; what a dep delivers on change.
    pub fn update(&self) {
        self.inner.update();
    }

    /// Re-evaluate and fire the callback if the value changed. Normally
    /// invoked by the scheduler during a flush.
    pub fn run(&self) -> Result<()> {
        self.inner.run()
    }

    /// Recompute a computed watcher's value unconditionally and clear its
    /// dirty flag. Never fires a callback.
    pub fn evaluate(&self) -> Result<()> {
        self.inner.evaluate()
    }

    /// Subscribe the currently evaluating watcher to every dependency this
    /// watcher holds.
    pub fn depend(&self) {
        self.inner.depend();
    }

    /// Read a computed watcher the way a consuming evaluation would:
    /// refresh if stale, then forward this watcher's dependencies to the
    /// active target so the consumer is invalidated together with it.
    pub fn computed_value(&self) -> Result<Value> {
        if self.inner.state.lock().dirty {
            self.inner.evaluate()?;
        }
        if self.inner.runtime.targets().current().is_some() {
            self.inner.depend();
        }
        Ok(self.value())
    }

    /// Unsubscribe from every dependency and deactivate. Idempotent; a torn
    /// down watcher never runs again.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub(crate) fn inner(&self) -> &Arc<WatcherInner> {
        &self.inner
    }

    pub(crate) fn from_inner(inner: Arc<WatcherInner>) -> Watcher {
        Watcher { inner }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("expression", &self.inner.expression)
            .field("dep_count", &state.deps.len())
            .field("dirty", &state.dirty)
            .field("active", &state.active)
            .finish()
    }
}

impl WatcherInner {
    pub(crate) fn id(&self) -> WatcherId {
        self.id
    }

    fn scope(&self) -> Result<Scope> {
        self.scope
            .upgrade()
            .map(Scope::from_inner)
            .ok_or_else(|| Error::ScopeGone {
                expression: self.expression.clone(),
            })
    }

    /// Evaluate the getter with this watcher as the active target,
    /// re-collecting dependencies.
    pub(crate) fn get(self: &Arc<Self>) -> Result<Value> {
        let scope = self.scope()?;

        {
            let mut state = self.state.lock();
            state.new_deps.clear();
            state.new_dep_ids.clear();
        }

        let result = {
            let _target = TargetGuard::enter(self.runtime.targets(), self);
            (self.getter)(&scope)
        };

        // The dependency swap happens whether the getter succeeded or not,
        // so a failing evaluation still tracks exactly what it read.
        self.commit_deps();

        result.map_err(|source| Error::Eval {
            expression: self.expression.clone(),
            source,
        })
    }

    /// Record a dependency read during the current evaluation. Idempotent
    /// per dependency id; already-subscribed deps are not re-registered.
    pub(crate) fn add_dep(self: &Arc<Self>, dep: &Arc<Dep>) {
        let needs_sub = {
            let mut state = self.state.lock();
            if state.new_dep_ids.contains(&dep.id()) {
                return;
            }
            state.new_dep_ids.insert(dep.id());
            state.new_deps.push(dep.clone());
            !state.dep_ids.contains(&dep.id())
        };
        if needs_sub {
            dep.add_sub(self);
        }
    }

    /// Swap in the dependencies read this pass and unsubscribe from every
    /// dep the evaluation no longer touched.
    fn commit_deps(&self) {
        let stale: Vec<Arc<Dep>> = {
            let mut state = self.state.lock();
            let stale = state
                .deps
                .iter()
                .filter(|d| !state.new_dep_ids.contains(&d.id()))
                .cloned()
                .collect();

            let mut swapped_deps = std::mem::take(&mut state.new_deps);
            let mut swapped_ids = std::mem::take(&mut state.new_dep_ids);
            std::mem::swap(&mut state.deps, &mut swapped_deps);
            std::mem::swap(&mut state.dep_ids, &mut swapped_ids);

            stale
        };

        for dep in stale {
            dep.remove_sub(self.id);
        }
    }

    /// Notification entry point. Computed watchers only go stale; everything
    /// else is handed to the scheduler.
    pub(crate) fn update(self: &Arc<Self>) {
        if self.kind.is_lazy() {
            self.state.lock().dirty = true;
        } else {
            self.runtime.queue(Watcher::from_inner(self.clone()));
        }
    }

    pub(crate) fn run(self: &Arc<Self>) -> Result<()> {
        if !self.state.lock().active {
            return Ok(());
        }

        let value = self.get()?;

        let old = {
            let mut state = self.state.lock();
            if value != state.value {
                Some(std::mem::replace(&mut state.value, value.clone()))
            } else {
                None
            }
        };

        let old = match old {
            Some(old) => old,
            None => return Ok(()),
        };
        let callback = match &self.callback {
            Some(callback) => callback,
            None => return Ok(()),
        };

        let scope = self.scope()?;
        callback(&scope, &value, &old).map_err(|source| {
            if self.kind.is_user() {
                Error::UserCallback {
                    expression: self.expression.clone(),
                    source,
                }
            } else {
                Error::Callback {
                    expression: self.expression.clone(),
                    source,
                }
            }
        })
    }

    pub(crate) fn evaluate(self: &Arc<Self>) -> Result<()> {
        debug_assert!(
            self.kind.is_lazy(),
            "evaluate() is only meaningful for computed watchers"
        );
        let value = self.get()?;
        let mut state = self.state.lock();
        state.value = value;
        state.dirty = false;
        Ok(())
    }

    pub(crate) fn depend(&self) {
        let deps: Vec<Arc<Dep>> = self.state.lock().deps.iter().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    pub(crate) fn teardown(&self) {
        let deps: Vec<Arc<Dep>> = {
            let mut state = self.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.dep_ids.clear();
            state.new_deps.clear();
            state.new_dep_ids.clear();
            state.deps.drain(..).collect()
        };

        for dep in deps {
            dep.remove_sub(self.id);
        }
    }
}
