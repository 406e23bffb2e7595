//! Reactive state store.
//!
//! A [`Scope`] is the mutable context watchers evaluate against. It holds a
//! root map of [`Value`]s and lazily creates one [`Dep`] per dotted path the
//! first time that path is touched.
//!
//! Reads performed through [`Scope::get`] (or through a path getter) are
//! tracked: every path prefix traversed registers the currently evaluating
//! watcher with that prefix's dep. Writes through [`Scope::set`] replace the
//! value at a path and notify the affected deps. [`Scope::peek`] reads
//! without tracking.
//!
//! Scopes are cheap clones of shared state; watchers hold them weakly and do
//! not control their lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::reactive::dep::Dep;
use crate::reactive::path::parse_path;
use crate::reactive::runtime::Runtime;
use crate::reactive::value::{Value, ValueMap};

/// A reactive evaluation context.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

pub(crate) struct ScopeInner {
    runtime: Runtime,
    root: RwLock<ValueMap>,
    deps: Mutex<HashMap<String, Arc<Dep>>>,
}

impl Scope {
    /// Create an empty scope bound to a runtime.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                runtime: runtime.clone(),
                root: RwLock::new(ValueMap::new()),
                deps: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a scope whose root fields come from a JSON object.
    pub fn from_json(runtime: &Runtime, json: &serde_json::Value) -> Result<Self> {
        let fields = match json {
            serde_json::Value::Object(fields) => fields,
            _ => return Err(Error::InvalidRoot),
        };
        let scope = Scope::new(runtime);
        {
            let mut root = scope.inner.root.write();
            for (key, value) in fields {
                root.insert(key.clone(), Value::from_json(value));
            }
        }
        Ok(scope)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub(crate) fn from_inner(inner: Arc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
        Arc::downgrade(&self.inner)
    }

    /// Tracked read of a dotted path.
    ///
    /// Registers the active watcher (if any) on every path prefix traversed,
    /// then returns the value at the path, or `Null` if the walk hits a
    /// missing or non-map segment.
    pub fn get(&self, path: &str) -> Result<Value> {
        let segments = parse_path(path)?;
        Ok(self.get_segments(&segments))
    }

    /// Untracked read of a dotted path.
    pub fn peek(&self, path: &str) -> Result<Value> {
        let segments = parse_path(path)?;
        Ok(self.walk(&segments, false))
    }

    pub(crate) fn get_segments(&self, segments: &[String]) -> Value {
        self.walk(segments, true)
    }

    fn walk(&self, segments: &[String], track: bool) -> Value {
        let mut prefix = String::new();
        let mut current: Option<Value> = None;

        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                prefix.push('.');
            }
            prefix.push_str(segment);

            if track {
                self.dep_for(&prefix).depend();
            }

            let next = if i == 0 {
                self.inner.root.read().get(segment.as_str()).cloned()
            } else {
                match &current {
                    Some(Value::Map(m)) => m.read().get(segment.as_str()).cloned(),
                    _ => None,
                }
            };

            match next {
                Some(value) => current = Some(value),
                None => return Value::Null,
            }
        }

        current.unwrap_or(Value::Null)
    }

    /// Write a value at a dotted path and notify watchers of that path.
    ///
    /// Missing intermediate maps are created (and their paths notified, since
    /// a watcher may have observed them as absent). A write whose new value
    /// is strictly equal to the old one notifies nobody. Writing through an
    /// existing non-map segment fails.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let segments = parse_path(path)?;
        let (leaf, init) = match segments.split_last() {
            Some(split) => split,
            None => return Err(Error::InvalidPath(path.to_string())),
        };

        let mut created: Vec<String> = Vec::new();
        let changed_leaf;

        if init.is_empty() {
            let mut root = self.inner.root.write();
            let previous = root.insert(leaf.clone(), value.clone());
            changed_leaf = previous.map_or(true, |p| p != value);
        } else {
            let mut prefix = String::new();
            let mut current: Option<Arc<RwLock<ValueMap>>> = None;

            for (i, segment) in init.iter().enumerate() {
                if i > 0 {
                    prefix.push('.');
                }
                prefix.push_str(segment);

                let existing = if i == 0 {
                    self.inner.root.read().get(segment.as_str()).cloned()
                } else {
                    match &current {
                        Some(map) => map.read().get(segment.as_str()).cloned(),
                        None => None,
                    }
                };

                let next = match existing {
                    Some(Value::Map(m)) => m,
                    Some(_) => return Err(Error::NotAMap(prefix)),
                    None => {
                        let fresh = Arc::new(RwLock::new(ValueMap::new()));
                        if i == 0 {
                            self.inner
                                .root
                                .write()
                                .insert(segment.clone(), Value::Map(fresh.clone()));
                        } else if let Some(map) = &current {
                            map.write()
                                .insert(segment.clone(), Value::Map(fresh.clone()));
                        }
                        created.push(prefix.clone());
                        fresh
                    }
                };
                current = Some(next);
            }

            changed_leaf = match &current {
                Some(map) => {
                    let previous = map.write().insert(leaf.clone(), value.clone());
                    previous.map_or(true, |p| p != value)
                }
                None => false,
            };
        }

        for prefix in &created {
            self.notify_path(prefix);
        }
        if changed_leaf {
            self.notify_path(path);
        }
        Ok(())
    }

    /// Untracked snapshot of the whole scope as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.inner
                .root
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// The dep for a path, created on first touch.
    pub(crate) fn dep_for(&self, path: &str) -> Arc<Dep> {
        let mut deps = self.inner.deps.lock();
        deps.entry(path.to_string())
            .or_insert_with(|| Dep::new(&self.inner.runtime))
            .clone()
    }

    fn existing_dep(&self, path: &str) -> Option<Arc<Dep>> {
        self.inner.deps.lock().get(path).cloned()
    }

    fn notify_path(&self, path: &str) {
        if let Some(dep) = self.existing_dep(path) {
            dep.notify();
        }
    }

    /// Live subscriptions on a path's dep. Zero for paths never read.
    pub fn watcher_count(&self, path: &str) -> usize {
        self.existing_dep(path).map_or(0, |dep| dep.sub_count())
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("fields", &self.inner.root.read().len())
            .field("tracked_paths", &self.inner.deps.lock().len())
            .finish()
    }
}
