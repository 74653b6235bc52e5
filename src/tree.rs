//! Navigation over nested configuration values.
//!
//! Every store keeps its data as a `serde_json::Value` whose root is an
//! object. These helpers implement the read/write/remove rules shared by
//! all stores; deep merging lives in [`crate::merge`].

use serde_json::{Map, Value};

/// Create an empty mapping value.
pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// Walk `path` from `root`.
///
/// Returns `None` when a segment is missing or when the walk reaches a
/// scalar before the path is exhausted. Arrays may be indexed with a
/// numeric segment.
pub fn get_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut target = root;
    for segment in path {
        target = match target {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(target)
}

/// Assign `value` at `path`, creating intermediate mappings.
///
/// Any non-mapping intermediate node is replaced with an empty mapping.
/// Replacing the root requires a mapping; anything else is rejected and
/// leaves `root` untouched.
pub fn set_at(root: &mut Value, path: &[String], value: Value) -> bool {
    let Some((leaf, parents)) = path.split_last() else {
        if !value.is_object() {
            return false;
        }
        *root = value;
        return true;
    };

    let target = descend_creating(root, parents);
    target.insert(leaf.clone(), value);
    true
}

/// Remove the leaf or subtree at `path`.
///
/// Returns `false` without touching anything when an intermediate node is
/// absent or not a mapping. Clearing the root empties the tree.
pub fn clear_at(root: &mut Value, path: &[String]) -> bool {
    let Some((leaf, parents)) = path.split_last() else {
        *root = empty();
        return true;
    };

    let mut target = match root.as_object_mut() {
        Some(map) => map,
        None => return false,
    };
    for segment in parents {
        target = match target.get_mut(segment).and_then(Value::as_object_mut) {
            Some(map) => map,
            None => return false,
        };
    }
    target.remove(leaf);
    true
}

/// Walk to the mapping at `path`, creating or overwriting nodes as needed.
pub(crate) fn descend_creating<'a>(
    root: &'a mut Value,
    path: &[String],
) -> &'a mut Map<String, Value> {
    let mut target = ensure_object(root);
    for segment in path {
        let slot = target.entry(segment.clone()).or_insert_with(empty);
        target = ensure_object(slot);
    }
    target
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = empty();
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("non-object replaced above"),
    }
}
