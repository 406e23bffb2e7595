//! Reactive Core
//!
//! This module implements the engine beneath watch expressions and view
//! bindings: watchers, dependency tracking, and batched re-evaluation.
//!
//! # Concepts
//!
//! ## Scopes
//!
//! A [`Scope`] is the mutable context expressions evaluate against. Every
//! dotted path in a scope has an associated [`Dep`], created the first time
//! the path is touched.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter (a dotted path or a closure) against a
//! scope. While the getter runs, the watcher is the *active target*: every
//! tracked read registers it with that value's dep. Reads are attributed
//! correctly even when evaluations nest, because targets form a stack.
//!
//! ## Updates
//!
//! Writing a scope path notifies its dep, which delivers `update()` to each
//! subscribed watcher. Eager watchers queue with the runtime's scheduler and
//! re-run on the next [`Runtime::flush`], each at most once per flush, in
//! creation order. Computed watchers only mark themselves stale and are
//! re-evaluated on demand through [`Watcher::computed_value`].
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::reactive::{Expr, Runtime, Scope, Watcher, WatcherKind};
//!
//! let runtime = Runtime::new();
//! let scope = Scope::new(&runtime);
//! scope.set("count", 1)?;
//!
//! let watcher = Watcher::with_callback(
//!     &scope,
//!     Expr::path("count"),
//!     WatcherKind::UserEffect,
//!     |_scope, new, old| {
//!         println!("count: {old:?} -> {new:?}");
//!         Ok(())
//!     },
//! )?;
//!
//! scope.set("count", 2)?; // queues the watcher
//! runtime.flush();        // callback fires once with (2, 1)
//! ```

mod context;
mod dep;
mod path;
mod runtime;
mod scheduler;
mod scope;
mod value;
mod watcher;

pub use dep::{Dep, DepId};
pub use runtime::Runtime;
pub use scope::Scope;
pub use value::{Value, ValueList, ValueMap};
pub use watcher::{CallbackFn, Expr, GetterFn, Watcher, WatcherId, WatcherKind};
