//! Store hydrated from environment variables.
//!
//! Variable names become keys. Names are split on `:` and, when a
//! `separator` is configured, on that separator too, so
//! `DATABASE__HOST` with separator `__` reads as `DATABASE:HOST`.
//! Values stay strings unless `parse_values` is set, in which case
//! JSON literals (`true`, `null`, `3600`, `[1,2]`, ...) are decoded.

use super::{Capabilities, Memory, Store, memory_backed};
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type TransformFn = dyn Fn(String, Value) -> Option<(String, Value)> + Send + Sync;

/// Rewrites or drops a `(key, value)` entry while a store hydrates.
///
/// Returning `None` drops the entry.
#[derive(Clone)]
pub struct Transform(Arc<TransformFn>);

impl Transform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(String, Value) -> Option<(String, Value)> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, key: String, value: Value) -> Option<(String, Value)> {
        (self.0)(key, value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}

/// Options for an `env` store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOptions {
    /// Names always accepted.
    pub whitelist: Vec<String>,
    /// Regular expression a name may match to be accepted.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    /// Only names starting with this prefix are read; the prefix is removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Extra segment separator inside names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    pub lower_case: bool,
    pub parse_values: bool,
    pub read_only: bool,
    #[serde(skip)]
    pub transform: Option<Transform>,
    /// Variables to read instead of the process environment.
    #[serde(skip)]
    pub vars: Option<Vec<(String, String)>>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            match_pattern: None,
            prefix: None,
            separator: None,
            lower_case: false,
            parse_values: false,
            read_only: true,
            transform: None,
            vars: None,
        }
    }
}

impl EnvOptions {
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// Decode a raw string the way `parse_values` does.
///
/// `undefined` yields `None`; text that is not a JSON literal stays a string.
pub(super) fn parse_value(raw: &str) -> Option<Value> {
    if raw == "undefined" {
        return None;
    }
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}

/// Split a name on `:` and on the optional extra separator.
pub(super) fn split_key(key: &str, separator: Option<&str>) -> Vec<String> {
    key.split(crate::key_path::DEFAULT_SEPARATOR)
        .flat_map(|part| match separator {
            Some(sep) if !sep.is_empty() => part.split(sep).map(str::to_string).collect(),
            _ => vec![part.to_string()],
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct EnvStore {
    options: EnvOptions,
    pattern: Option<Regex>,
    memory: Memory,
}

impl EnvStore {
    pub fn new(options: EnvOptions) -> Result<Self> {
        let pattern = options
            .match_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::InvalidOption {
                kind: "env".to_string(),
                message: format!("invalid match pattern: {e}"),
            })?;
        let memory = Memory::new().with_read_only(options.read_only);
        Ok(Self {
            options,
            pattern,
            memory,
        })
    }

    fn accepts(&self, name: &str) -> bool {
        if self.options.whitelist.is_empty() && self.pattern.is_none() {
            return true;
        }
        self.options
            .whitelist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
            || self.pattern.as_ref().is_some_and(|re| re.is_match(name))
    }

    fn variables(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = match &self.options.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };
        vars.sort();
        vars
    }
}

#[async_trait]
impl Store for EnvStore {
    memory_backed!(memory);

    fn kind(&self) -> &str {
        "env"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IN_MEMORY
    }

    fn load_sync(&mut self) -> Result<Value> {
        let mut memory = Memory::new();

        for (name, raw) in self.variables() {
            if !self.accepts(&name) {
                continue;
            }
            let key = match &self.options.prefix {
                Some(prefix) => match name.strip_prefix(prefix.as_str()) {
                    Some(rest) if !rest.is_empty() => rest.to_string(),
                    _ => continue,
                },
                None => name,
            };
            let key = if self.options.lower_case {
                key.to_lowercase()
            } else {
                key
            };

            let mut entry = Some((key, Value::String(raw)));
            if let Some(transform) = &self.options.transform {
                entry = entry.and_then(|(k, v)| transform.apply(k, v));
            }
            let Some((key, value)) = entry else {
                continue;
            };

            let value = match value {
                Value::String(s) if self.options.parse_values => match parse_value(&s) {
                    Some(v) => v,
                    None => continue,
                },
                other => other,
            };

            memory.set(&split_key(&key, self.options.separator.as_deref()), value);
        }

        self.memory = memory.with_read_only(self.options.read_only);
        Ok(self.memory.data().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn k(key: &str) -> Vec<String> {
        crate::key_path::path(Some(key), ":")
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("foobar"), Some(json!("foobar")));
        assert_eq!(parse_value("true"), Some(json!(true)));
        assert_eq!(parse_value("null"), Some(Value::Null));
        assert_eq!(parse_value("undefined"), None);
        assert_eq!(parse_value("3600"), Some(json!(3600)));
        assert_eq!(parse_value("0.5"), Some(json!(0.5)));
        assert_eq!(parse_value("5.1a"), Some(json!("5.1a")));
        assert_eq!(parse_value("[\"foo\",\"bar\"]"), Some(json!(["foo", "bar"])));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("a:b", None), vec!["a", "b"]);
        assert_eq!(split_key("NESTED__VALUE", Some("__")), vec!["NESTED", "VALUE"]);
        assert_eq!(split_key("NESTED__VALUE", None), vec!["NESTED__VALUE"]);
    }

    #[test]
    fn test_defaults() {
        let store = EnvStore::new(EnvOptions::default()).unwrap();
        assert_eq!(store.kind(), "env");
        assert!(store.read_only());
        assert!(store.options.whitelist.is_empty());
        assert!(store.options.separator.is_none());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let options = EnvOptions {
            match_pattern: Some("(unclosed".into()),
            ..Default::default()
        };
        assert!(matches!(
            EnvStore::new(options),
            Err(Error::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_separator_nests_values() {
        let options = EnvOptions::default()
            .with_separator("__")
            .with_vars([("NESTED__VALUE", "nested"), ("NESTED__OTHER", "x")]);
        let mut store = EnvStore::new(options).unwrap();
        store.load_sync().unwrap();
        assert_eq!(
            store.get(&k("NESTED")),
            Some(json!({"VALUE": "nested", "OTHER": "x"}))
        );
    }

    #[test]
    fn test_prefix_is_stripped() {
        let options = EnvOptions::default()
            .with_prefix("APP_")
            .with_vars([("APP_PORT", "80"), ("OTHER", "x"), ("APP_", "empty")]);
        let mut store = EnvStore::new(options).unwrap();
        assert_eq!(store.load_sync().unwrap(), json!({"PORT": "80"}));
    }
}
