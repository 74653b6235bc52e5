//! In-process configuration tree.
//!
//! [`Memory`] is both the `memory` store kind and the data plane embedded
//! by every other built-in store.

use super::{Capabilities, Store};
use crate::error::Result;
use crate::key_path;
use crate::merge;
use crate::tree;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Options for a `memory` store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryOptions {
    pub read_only: bool,
}

/// A nested mapping with modification times.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Value,
    mtimes: HashMap<String, DateTime<Utc>>,
    read_only: bool,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: tree::empty(),
            mtimes: HashMap::new(),
            read_only: false,
        }
    }

    pub fn from_options(options: MemoryOptions) -> Self {
        Self::new().with_read_only(options.read_only)
    }

    /// Seed the tree. A non-mapping seed yields an empty tree.
    pub fn with_data(mut self, data: Value) -> Self {
        self.replace(data);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn mtimes(&self) -> &HashMap<String, DateTime<Utc>> {
        &self.mtimes
    }

    /// Replace the whole tree, bypassing the read-only flag.
    ///
    /// Used by backends when hydrating. Modification times are cleared.
    pub fn replace(&mut self, data: Value) {
        self.data = if data.is_object() { data } else { tree::empty() };
        self.mtimes.clear();
    }

    pub fn get(&self, path: &[String]) -> Option<Value> {
        tree::get_at(&self.data, path).cloned()
    }

    pub fn set(&mut self, path: &[String], value: Value) -> bool {
        if self.read_only {
            return false;
        }
        let updated = tree::set_at(&mut self.data, path, value);
        if updated {
            self.touch(path);
        }
        updated
    }

    pub fn clear(&mut self, path: &[String]) -> bool {
        if self.read_only {
            return false;
        }
        self.mtimes.remove(&key_path::key(path));
        tree::clear_at(&mut self.data, path)
    }

    pub fn merge(&mut self, path: &[String], value: Value) -> bool {
        if self.read_only {
            return false;
        }
        let updated = merge::merge_at(&mut self.data, path, value);
        if updated {
            self.touch(path);
        }
        updated
    }

    pub fn reset(&mut self) -> bool {
        if self.read_only {
            return false;
        }
        self.data = tree::empty();
        self.mtimes.clear();
        true
    }

    fn touch(&mut self, path: &[String]) {
        self.mtimes.insert(key_path::key(path), Utc::now());
    }
}

#[async_trait]
impl Store for Memory {
    fn kind(&self) -> &str {
        "memory"
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IN_MEMORY
    }

    fn data(&self) -> Value {
        self.data.clone()
    }

    fn mtimes(&self) -> HashMap<String, DateTime<Utc>> {
        self.mtimes.clone()
    }

    fn get(&self, path: &[String]) -> Option<Value> {
        Memory::get(self, path)
    }

    fn set(&mut self, path: &[String], value: Value) -> bool {
        Memory::set(self, path, value)
    }

    fn clear(&mut self, path: &[String]) -> bool {
        Memory::clear(self, path)
    }

    fn merge(&mut self, path: &[String], value: Value) -> bool {
        Memory::merge(self, path, value)
    }

    fn reset(&mut self) -> bool {
        Memory::reset(self)
    }

    fn load_sync(&mut self) -> Result<Value> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(key: &str) -> Vec<String> {
        key_path::path(Some(key), ":")
    }

    #[test]
    fn test_falsy_values_are_distinguishable() {
        let mut store = Memory::new();
        assert!(store.set(&p("foo:bar:bazz"), json!("buzz")));
        assert!(store.set(&p("falsy:number"), json!(0)));
        assert!(store.set(&p("falsy:string:empty"), json!("")));
        assert!(store.set(&p("falsy:boolean"), json!(false)));
        assert!(store.set(&p("falsy:object"), Value::Null));

        assert_eq!(store.get(&p("falsy:number")), Some(json!(0)));
        assert_eq!(store.get(&p("falsy:string:empty")), Some(json!("")));
        assert_eq!(store.get(&p("falsy:boolean")), Some(json!(false)));
        assert_eq!(store.get(&p("falsy:object")), Some(Value::Null));
        assert_eq!(store.get(&p("falsy:missing")), None);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut store = Memory::new()
            .with_data(json!({"a": 1}))
            .with_read_only(true);
        assert!(!store.set(&p("a"), json!(2)));
        assert!(!store.merge(&p("b"), json!({"c": 1})));
        assert!(!store.clear(&p("a")));
        assert!(!store.reset());
        assert_eq!(store.data(), &json!({"a": 1}));
    }

    #[test]
    fn test_mtimes_track_writes() {
        let mut store = Memory::new();
        store.set(&p("a:b"), json!(1));
        assert!(store.mtimes().contains_key("a:b"));
        store.clear(&p("a:b"));
        assert!(!store.mtimes().contains_key("a:b"));
        store.merge(&p("c"), json!({"d": 1}));
        assert!(store.mtimes().contains_key("c"));
        store.reset();
        assert!(store.mtimes().is_empty());
    }

    #[test]
    fn test_merge_into_existing_object() {
        let mut store = Memory::new();
        store.set(
            &p("merge:object"),
            json!({"prop1": 2, "prop2": "prop2", "prop3": {"bazz": "bazz"}, "prop4": ["foo", "bar"]}),
        );
        store.merge(
            &p("merge:object"),
            json!({"prop1": 1, "prop2": [1, 2, 3], "prop3": {"foo": "bar", "bar": "foo"}}),
        );

        assert_eq!(store.get(&p("merge:object:prop1")), Some(json!(1)));
        assert_eq!(store.get(&p("merge:object:prop2")), Some(json!([1, 2, 3])));
        assert_eq!(
            store.get(&p("merge:object:prop3")),
            Some(json!({"foo": "bar", "bar": "foo", "bazz": "bazz"}))
        );
        assert_eq!(store.get(&p("merge:object:prop4")), Some(json!(["foo", "bar"])));
    }

    #[test]
    fn test_merge_overrides_literal_and_array() {
        let mut store = Memory::new();
        let value = json!({"prop1": 1});
        store.set(&p("merge:literal"), json!("string-value"));
        store.merge(&p("merge:literal"), value.clone());
        assert_eq!(store.get(&p("merge:literal")), Some(value.clone()));

        store.set(&p("merge:array"), json!([1, 2, 3, 4]));
        store.merge(&p("merge:array"), value.clone());
        assert_eq!(store.get(&p("merge:array")), Some(value));
    }

    #[test]
    fn test_load_sync_returns_data() {
        let mut store = Memory::new().with_data(json!({"x": true}));
        assert_eq!(Store::load_sync(&mut store).unwrap(), json!({"x": true}));
    }
}
