//! Dynamic value model for reactive state.
//!
//! Scopes store [`Value`]s and getters produce them. Lists and maps are
//! shared references: cloning a `Value` clones the handle, not the contents,
//! so a map read out of a scope and the map inside the scope are the same
//! object.
//!
//! # Equality
//!
//! `PartialEq` implements strict (identity) equality:
//!
//! - primitives compare by value (`Number` uses `f64` equality, so
//!   `NaN != NaN`),
//! - lists and maps compare by reference identity (`Arc::ptr_eq`).
//!
//! Mutating a list or map in place therefore never makes it "unequal" to
//! itself, which is exactly what change detection in
//! [`Watcher::run`](super::Watcher::run) relies on.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Insertion-ordered map of field name to value.
pub type ValueMap = IndexMap<String, Value>;

/// Ordered list of values.
pub type ValueList = Vec<Value>;

/// A dynamically typed reactive value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Arc<RwLock<ValueList>>),
    Map(Arc<RwLock<ValueMap>>),
}

impl Value {
    /// Create an empty shared map.
    pub fn map() -> Value {
        Value::Map(Arc::new(RwLock::new(ValueMap::new())))
    }

    /// Create a shared map from existing entries.
    pub fn map_from(entries: ValueMap) -> Value {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    /// Create an empty shared list.
    pub fn list() -> Value {
        Value::List(Arc::new(RwLock::new(ValueList::new())))
    }

    /// Create a shared list from existing items.
    pub fn list_from(items: ValueList) -> Value {
        Value::List(Arc::new(RwLock::new(items)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field on a map value. Returns `None` for non-maps and
    /// missing keys. Does not register any dependency.
    pub fn key(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(m) => m.read().get(key).cloned(),
            _ => None,
        }
    }

    /// Write a field on a map value in place. Returns `false` for non-maps.
    ///
    /// This mutates the shared contents without replacing the handle, so it
    /// is invisible to identity comparison.
    pub fn set_key(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match self {
            Value::Map(m) => {
                m.write().insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Append to a list value in place. Returns `false` for non-lists.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        match self {
            Value::List(l) => {
                l.write().push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Build a value tree from JSON. Arrays and objects become fresh shared
    /// containers.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::list_from(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::map_from(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Deep snapshot as JSON. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => {
                serde_json::Value::Array(l.read().iter().map(Value::to_json).collect())
            }
            Value::Map(m) => serde_json::Value::Object(
                m.read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // f64 equality: NaN is unequal to itself.
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(l) => f.debug_list().entries(l.read().iter()).finish(),
            Value::Map(m) => f.debug_map().entries(m.read().iter()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Bool(true), Value::Bool(true));
        assert_ne!(Value::Bool(true), Value::Bool(false));
        assert_eq!(Value::Number(2.0), Value::Number(2.0));
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::from("a"), Value::from("b"));
    }

    #[test]
    fn nan_is_unequal_to_itself() {
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn cross_variant_comparison_is_false() {
        assert_ne!(Value::Null, Value::Bool(false));
        assert_ne!(Value::Number(0.0), Value::from("0"));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::map();
        let b = a.clone();
        let c = Value::map();

        assert_eq!(a, b);
        assert_ne!(a, c);

        // In-place mutation does not break identity equality.
        a.set_key("k", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn clones_share_contents() {
        let list = Value::list();
        let alias = list.clone();

        list.push(1);
        list.push(2);

        match alias {
            Value::List(items) => assert_eq!(items.read().len(), 2),
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({
            "flag": true,
            "count": 3.0,
            "name": "widget",
            "nested": { "items": [1.0, 2.0, 3.0] },
            "nothing": null,
        });

        let value = Value::from_json(&json);
        assert_eq!(value.key("count"), Some(Value::Number(3.0)));
        assert_eq!(
            value.key("nested").and_then(|n| n.key("items")).map(|_| ()),
            Some(())
        );
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn non_finite_numbers_serialize_as_null() {
        assert_eq!(Value::Number(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::Number(f64::INFINITY).to_json(),
            serde_json::Value::Null
        );
    }
}
