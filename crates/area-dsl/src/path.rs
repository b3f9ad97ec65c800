// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Minimal JSON path reader used by filters, mappings and templates.
//!
//! Grammar: an optional leading `$.`, `$` or `.`, then dot-separated segments.
//! Each segment may carry one or more `[n]` index suffixes, e.g.
//! `data.items[0].tags[2]`. Lookups never fail loudly: any type mismatch,
//! malformed index or out-of-range access yields `None`.

use serde_json::{Map, Value};

/// Strip the optional root marker from a path expression.
fn normalize(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("$.").unwrap_or(path);
    let path = path.strip_prefix('$').unwrap_or(path);
    path.strip_prefix('.').unwrap_or(path)
}

/// Resolve `path` against `data`.
///
/// An empty path returns `data` itself.
///
/// ```
/// use serde_json::json;
/// use area_dsl::path::extract;
///
/// let data = json!({"items": [{"id": 7}]});
/// assert_eq!(extract(&data, "$.items[0].id"), Some(&json!(7)));
/// assert_eq!(extract(&data, "items[3]"), None);
/// ```
pub fn extract<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let path = normalize(path);
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = walk_segment(current, segment)?;
    }
    Some(current)
}

fn walk_segment<'a>(mut current: &'a Value, segment: &str) -> Option<&'a Value> {
    let mut key = segment;
    loop {
        let Some(bracket) = key.find('[') else {
            if !key.is_empty() {
                current = current.as_object()?.get(key)?;
            }
            return Some(current);
        };

        if bracket > 0 {
            current = current.as_object()?.get(&key[..bracket])?;
        }

        let rest = &key[bracket..];
        let end = rest.find(']')?;
        let index: i64 = rest[1..end].parse().ok()?;
        let index = usize::try_from(index).ok()?;
        current = current.as_array()?.get(index)?;

        key = &rest[end + 1..];
        if key.is_empty() {
            return Some(current);
        }
    }
}

/// Write `value` at a dotted object path, creating intermediate objects.
///
/// Index segments are not supported. Returns `false` when the path is empty,
/// contains an empty segment, or `data` is not an object.
pub fn set(data: &mut Value, path: &str, value: Value) -> bool {
    let path = path.trim();
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return false;
    }
    let Some(mut current) = data.as_object_mut() else {
        return false;
    };

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry.as_object_mut() {
            Some(map) => map,
            None => return false,
        };
    }
    current.insert(last.to_string(), value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_path_returns_root() {
        let data = json!({"a": 1});
        assert_eq!(extract(&data, ""), Some(&data));
        assert_eq!(extract(&data, "$"), Some(&data));
        assert_eq!(extract(&data, "  $.  "), Some(&data));
    }

    #[test]
    fn test_nested_fields_and_indexes() {
        let data = json!({
            "data": {
                "items": [
                    {"id": "a", "tags": ["x", "y"]},
                    {"id": "b", "matrix": [[1, 2], [3, 4]]}
                ]
            }
        });
        assert_eq!(extract(&data, "data.items[0].id"), Some(&json!("a")));
        assert_eq!(extract(&data, "$.data.items[0].tags[1]"), Some(&json!("y")));
        assert_eq!(extract(&data, ".data.items[1].matrix[1][0]"), Some(&json!(3)));
    }

    #[test]
    fn test_mismatches_are_not_found() {
        let data = json!({"items": [1, 2], "name": "x"});
        assert_eq!(extract(&data, "items[2]"), None);
        assert_eq!(extract(&data, "items[-1]"), None);
        assert_eq!(extract(&data, "items[a]"), None);
        assert_eq!(extract(&data, "items[0"), None);
        assert_eq!(extract(&data, "name.first"), None);
        assert_eq!(extract(&data, "name[0]"), None);
        assert_eq!(extract(&data, "items..x"), None);
        assert_eq!(extract(&data, "missing"), None);
    }

    #[test]
    fn test_null_values_are_found() {
        let data = json!({"value": null});
        assert_eq!(extract(&data, "value"), Some(&Value::Null));
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut data = json!({"keep": true, "nested": "scalar"});
        assert!(set(&mut data, "a.b.c", json!(1)));
        assert!(set(&mut data, "nested.value", json!("v")));
        assert_eq!(
            data,
            json!({"keep": true, "a": {"b": {"c": 1}}, "nested": {"value": "v"}})
        );
    }

    #[test]
    fn test_set_rejects_invalid_paths() {
        let mut data = json!({});
        assert!(!set(&mut data, "", json!(1)));
        assert!(!set(&mut data, "a..b", json!(1)));
        let mut scalar = json!(3);
        assert!(!set(&mut scalar, "a", json!(1)));
    }
}
