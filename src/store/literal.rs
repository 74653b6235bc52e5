//! Store seeded from a fixed value.
//!
//! Backs the provider's `literal`, `overrides` and `defaults` helpers.

use super::{Capabilities, Memory, Store, memory_backed};
use crate::error::Result;
use crate::tree;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for a `literal` store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteralOptions {
    /// The mapping to expose.
    pub store: Value,
    pub read_only: bool,
}

impl Default for LiteralOptions {
    fn default() -> Self {
        Self {
            store: tree::empty(),
            read_only: true,
        }
    }
}

impl From<Value> for LiteralOptions {
    fn from(store: Value) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralStore {
    seed: Value,
    memory: Memory,
}

impl LiteralStore {
    pub fn new(options: LiteralOptions) -> Self {
        let memory = Memory::new()
            .with_data(options.store.clone())
            .with_read_only(options.read_only);
        Self {
            seed: options.store,
            memory,
        }
    }
}

#[async_trait]
impl Store for LiteralStore {
    memory_backed!(memory);

    fn kind(&self) -> &str {
        "literal"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IN_MEMORY
    }

    /// Restore the seeded value.
    fn load_sync(&mut self) -> Result<Value> {
        self.memory.replace(self.seed.clone());
        Ok(self.memory.data().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_exposes_values() {
        let store = LiteralStore::new(json!({"foo": "bar", "one": 2}).into());
        assert_eq!(store.kind(), "literal");
        assert!(store.read_only());
        assert_eq!(store.get(&["foo".to_string()]), Some(json!("bar")));
        assert_eq!(store.get(&["one".to_string()]), Some(json!(2)));
    }

    #[test]
    fn test_writable_literal_reloads_seed() {
        let mut store = LiteralStore::new(LiteralOptions {
            store: json!({"a": 1}),
            read_only: false,
        });
        assert!(store.set(&["a".to_string()], json!(5)));
        assert_eq!(store.load_sync().unwrap(), json!({"a": 1}));
    }
}
