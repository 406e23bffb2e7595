//! Error types for the reactive engine.
//!
//! Failures fall into a small taxonomy:
//!
//! - Expression resolution failures are fatal at watcher construction; no
//!   watcher is produced.
//! - Getter failures propagate out of `get()`/`run()`/`evaluate()` after the
//!   evaluation context has been restored.
//! - Callback failures are wrapped so embedders can tell a failing
//!   user-authored watch handler apart from a failing framework binding.
//!
//! User-supplied getters and callbacks report their own failures as a
//! [`BoxError`]; the watcher wraps them with the expression they belong to.

use thiserror::Error;

/// Boxed error produced by user-supplied getters and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the reactive engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A watch expression failed to resolve into a path accessor.
    #[error("invalid watch path `{0}`")]
    InvalidPath(String),

    /// The getter failed while evaluating against the scope.
    #[error("evaluation of `{expression}` failed: {source}")]
    Eval {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// A framework-owned watcher callback failed.
    #[error("callback for watcher `{expression}` failed: {source}")]
    Callback {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// A user-authored watch callback failed. Kept separate from
    /// [`Error::Callback`] so it can be surfaced as an error in user code
    /// rather than in the runtime.
    #[error("callback for user watcher `{expression}` failed: {source}")]
    UserCallback {
        expression: String,
        #[source]
        source: BoxError,
    },

    /// The scope a watcher evaluates against has been dropped.
    #[error("scope for watcher `{expression}` no longer exists")]
    ScopeGone { expression: String },

    /// A write traversed a path segment holding a non-map value.
    #[error("cannot write through non-map value at `{0}`")]
    NotAMap(String),

    /// A scope was constructed from JSON that is not an object.
    #[error("scope roots must be JSON objects")]
    InvalidRoot,
}

pub type Result<T> = std::result::Result<T, Error>;
