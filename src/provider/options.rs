//! Declarative provider descriptions.
//!
//! ```yaml
//! separator: ":"
//! stores:
//!   - name: overrides
//!     type: literal
//!     store: { always: true }
//!   - type: env
//!     separator: "__"
//!   - name: user
//!     type: file
//!     path: ~/.app/config.yaml
//! sources:
//!   - type: file
//!     path: /etc/app/defaults.json
//! ```

use crate::error::{Error, Result};
use crate::key_path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// One store entry in a description.
///
/// `type` stays a string so unknown kinds are reported with the store name
/// rather than as a generic decoding failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoreSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Explicit name, or the store type.
    pub fn store_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

fn default_separator() -> String {
    key_path::DEFAULT_SEPARATOR.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub stores: Vec<StoreSpec>,
    #[serde(default)]
    pub sources: Vec<StoreSpec>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            stores: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl ProviderOptions {
    /// Parse a YAML (or JSON) description.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read a description file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}
