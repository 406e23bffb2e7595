//! Filament Core
//!
//! This crate provides the reactive engine for the Filament UI runtime:
//!
//! - Reactive scopes holding dynamically typed state
//! - Watchers with automatic dependency tracking
//! - Computed (pull-based) and effect (push-based) evaluation
//! - A batching scheduler with deterministic flush order
//!
//! # Architecture
//!
//! The crate is organized around two modules:
//!
//! - `reactive`: scopes, values, watchers, dependency tracking, scheduling
//! - `error`: the crate-wide error taxonomy
//!
//! Everything shared between watchers (id generation, the active-target
//! stack, the scheduler) is owned by a [`reactive::Runtime`] instance, so
//! independent runtimes are fully isolated from each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::reactive::{Expr, Runtime, Scope, Watcher, WatcherKind};
//!
//! let runtime = Runtime::new();
//! let scope = Scope::new(&runtime);
//! scope.set("user.name", "ada")?;
//!
//! // A computed watcher: re-evaluated only when pulled.
//! let greeting = Watcher::new(
//!     &scope,
//!     Expr::func(|scope| {
//!         let name = scope.get("user.name")?;
//!         Ok(format!("hello, {}", name.as_str().unwrap_or("stranger")).into())
//!     }),
//!     WatcherKind::Computed,
//! )?;
//!
//! scope.set("user.name", "grace")?;   // marks the computed stale
//! let value = greeting.computed_value()?; // "hello, grace"
//! ```

pub mod error;
pub mod reactive;

pub use error::{BoxError, Error, Result};
