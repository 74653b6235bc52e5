//! Serialization formats for file-backed stores.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// On-disk format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON, pretty-printed with two-space indentation on save.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl Format {
    /// Pick a format from a file extension (`.yaml`/`.yml` → YAML, else JSON).
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }

    /// Decode text. A leading UTF-8 byte-order mark is ignored.
    ///
    /// Empty or whitespace-only input decodes to an empty mapping.
    pub fn parse(&self, text: &str) -> Result<Value, String> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Ok(crate::tree::empty());
        }
        match self {
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// Encode a value.
    pub fn stringify(&self, value: &Value) -> Result<String, String> {
        match self {
            Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}
