//! Deep merge of configuration values.
//!
//! Mappings merge key-by-key; arrays, scalars and `null` are atomic and
//! replace whatever they land on. A mapping merged onto a non-mapping slot
//! (including `null` and arrays) replaces it.

use crate::tree;
use serde_json::{Map, Value};

/// Merge `value` into `root` at `path`.
///
/// Non-mapping values are assigned exactly as [`tree::set_at`] would.
/// For a mapping, intermediate nodes are created as for `set_at`, and the
/// mapping is merged property by property into the existing node when that
/// node is itself a mapping.
pub fn merge_at(root: &mut Value, path: &[String], value: Value) -> bool {
    let Value::Object(incoming) = value else {
        return tree::set_at(root, path, value);
    };

    match path.split_last() {
        None => merge_into(tree::descend_creating(root, &[]), incoming),
        Some((leaf, parents)) => {
            let parent = tree::descend_creating(root, parents);
            if let Some(Value::Object(existing)) = parent.get_mut(leaf) {
                merge_into(existing, incoming);
            } else {
                parent.insert(leaf.clone(), Value::Object(incoming));
            }
        }
    }
    true
}

fn merge_into(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        let Value::Object(nested) = value else {
            target.insert(key, value);
            continue;
        };
        if let Some(Value::Object(existing)) = target.get_mut(&key) {
            merge_into(existing, nested);
        } else {
            target.insert(key, Value::Object(nested));
        }
    }
}

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans and nulls in overlay replace base
///
/// # Example
/// ```
/// use serde_json::json;
/// use hierconf::merge::deep_merge;
///
/// let base = json!({
///     "server": { "port": 8080, "host": "localhost" },
///     "features": ["a", "b"]
/// });
/// let overlay = json!({
///     "server": { "port": 9000 },
///     "features": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(
///     result,
///     json!({ "server": { "port": 9000, "host": "localhost" }, "features": ["c"] })
/// );
/// ```
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    match overlay {
        Value::Object(_) => {
            merge_at(&mut base, &[], overlay);
            base
        }
        other => other,
    }
}

/// Merge values in order, with later values taking precedence.
///
/// Starts from an empty mapping, so the result of an empty input is `{}`.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(tree::empty(), deep_merge)
}
