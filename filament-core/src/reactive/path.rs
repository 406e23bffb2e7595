//! Dotted-path accessors for watch expressions.
//!
//! A path expression like `"user.address.city"` resolves at watcher
//! construction into a getter that performs a tracked walk of the scope.
//! Resolution is the only place a path can fail; the walk itself never
//! does: a missing or non-map segment simply yields `Null`.

use crate::error::{Error, Result};
use crate::reactive::scope::Scope;
use crate::reactive::watcher::GetterFn;

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Split and validate a dotted path. Segments are `[A-Za-z0-9_$]+`;
/// anything else bails out as an invalid expression.
pub(crate) fn parse_path(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    let mut segments = Vec::new();
    for segment in path.split('.') {
        if segment.is_empty() || !segment.chars().all(is_segment_char) {
            return Err(Error::InvalidPath(path.to_string()));
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

/// Resolve a path expression into a uniform getter.
pub(crate) fn path_getter(path: &str) -> Result<Box<GetterFn>> {
    let segments = parse_path(path)?;
    Ok(Box::new(move |scope: &Scope| {
        Ok(scope.get_segments(&segments))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_and_nested_paths() {
        assert_eq!(parse_path("x").unwrap(), vec!["x"]);
        assert_eq!(parse_path("a.b.c").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(parse_path("$data._private0").unwrap(), vec!["$data", "_private0"]);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", ".", "a..b", ".a", "a.", "a b", "a.b!", "a[0]", "a-b"] {
            assert!(
                matches!(parse_path(bad), Err(Error::InvalidPath(_))),
                "expected `{bad}` to be rejected"
            );
        }
    }
}
