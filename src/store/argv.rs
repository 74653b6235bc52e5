//! Store hydrated from command-line arguments.
//!
//! The tokenizer is deliberately loose: it accepts any option without a
//! declared schema.
//!
//! | argument          | result                         |
//! |-------------------|--------------------------------|
//! | `--key value`     | `key = "value"`                |
//! | `--key=value`     | `key = "value"`                |
//! | `--flag`          | `flag = true`                  |
//! | `--no-flag`       | `flag = false`                 |
//! | `-k value`        | `k = "value"`                  |
//! | `-abc`            | `a = b = c = true`             |
//! | `positional`      | appended to `_`                |
//! | `--`              | everything after is positional |
//!
//! A key given more than once collects its values into an array.

use super::env::{parse_value, split_key};
use super::{Capabilities, Memory, Store, Transform, memory_backed};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ffi::OsString;

/// Key under which positional arguments are collected.
pub const POSITIONAL_KEY: &str = "_";

/// A declared option: an alias and a default value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Options for an `argv` store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgvOptions {
    /// Arguments to parse instead of the process arguments (without the
    /// program name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<ArgSpec>,
    /// Extra segment separator inside option names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    pub parse_values: bool,
    pub read_only: bool,
    #[serde(skip)]
    pub transform: Option<Transform>,
}

impl Default for ArgvOptions {
    fn default() -> Self {
        Self {
            args: None,
            specs: Vec::new(),
            separator: None,
            parse_values: false,
            read_only: true,
            transform: None,
        }
    }
}

impl ArgvOptions {
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_spec(mut self, spec: ArgSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }
}

fn looks_like_value(arg: &str) -> bool {
    !arg.starts_with('-') || arg.len() == 1 || arg[1..].starts_with(|c: char| c.is_ascii_digit())
}

fn push(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Tokenize arguments into a flat mapping of option name to value.
fn tokenize(args: &[String]) -> Map<String, Value> {
    let mut options = Map::new();
    let mut positionals = Vec::new();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            positionals.extend(iter.by_ref().map(|a| Value::String(a.clone())));
            break;
        }

        if let Some(long) = arg.strip_prefix("--") {
            if let Some((key, value)) = long.split_once('=') {
                push(&mut options, key.to_string(), Value::String(value.to_string()));
            } else if let Some(negated) = long.strip_prefix("no-") {
                push(&mut options, negated.to_string(), Value::Bool(false));
            } else if let Some(value) = iter.next_if(|next| looks_like_value(next)) {
                push(&mut options, long.to_string(), Value::String(value.clone()));
            } else {
                push(&mut options, long.to_string(), Value::Bool(true));
            }
            continue;
        }

        if !looks_like_value(arg) {
            let short = &arg[1..];
            let mut chars = short.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                let key = c.to_string();
                if let Some(value) = iter.next_if(|next| looks_like_value(next)) {
                    push(&mut options, key, Value::String(value.clone()));
                } else {
                    push(&mut options, key, Value::Bool(true));
                }
            } else {
                for c in short.chars() {
                    push(&mut options, c.to_string(), Value::Bool(true));
                }
            }
            continue;
        }

        positionals.push(Value::String(arg.clone()));
    }

    if !positionals.is_empty() {
        options.insert(POSITIONAL_KEY.to_string(), Value::Array(positionals));
    }
    options
}

/// Mirror aliased values under both names and fill in defaults.
fn apply_specs(options: &mut Map<String, Value>, specs: &[ArgSpec]) {
    for spec in specs {
        let value = options
            .get(&spec.name)
            .or_else(|| spec.alias.as_ref().and_then(|alias| options.get(alias)))
            .cloned()
            .or_else(|| spec.default.clone());

        if let Some(value) = value {
            if let Some(alias) = &spec.alias {
                options.insert(alias.clone(), value.clone());
            }
            options.insert(spec.name.clone(), value);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArgvStore {
    options: ArgvOptions,
    memory: Memory,
}

impl ArgvStore {
    pub fn new(options: ArgvOptions) -> Self {
        let memory = Memory::new().with_read_only(options.read_only);
        Self { options, memory }
    }

    fn arguments(&self) -> Vec<String> {
        match &self.options.args {
            Some(args) => args.clone(),
            None => lossy_arguments(std::env::args_os().skip(1)),
        }
    }
}

/// Convert OS arguments, replacing invalid UTF-8 rather than failing.
fn lossy_arguments(args: impl IntoIterator<Item = OsString>) -> Vec<String> {
    args.into_iter()
        .map(|arg| arg.into_string().unwrap_or_else(|raw| raw.to_string_lossy().into_owned()))
        .collect()
}

#[async_trait]
impl Store for ArgvStore {
    memory_backed!(memory);

    fn kind(&self) -> &str {
        "argv"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IN_MEMORY
    }

    fn load_sync(&mut self) -> Result<Value> {
        let mut parsed = tokenize(&self.arguments());
        apply_specs(&mut parsed, &self.options.specs);

        let mut memory = Memory::new();
        for (key, value) in parsed {
            let entry = match &self.options.transform {
                Some(transform) => transform.apply(key, value),
                None => Some((key, value)),
            };
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

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_arguments_are_lossy() {
        use std::os::unix::ffi::OsStringExt;

        let raw = vec![
            OsString::from("--name"),
            OsString::from_vec(vec![b'a', 0xff, b'b']),
            OsString::from("--port=80"),
        ];
        let converted = lossy_arguments(raw);
        assert_eq!(converted, vec!["--name", "a\u{fffd}b", "--port=80"]);

        let parsed = tokenize(&converted);
        assert_eq!(parsed.get("name"), Some(&json!("a\u{fffd}b")));
        assert_eq!(parsed.get("port"), Some(&json!("80")));
    }

    #[test]
    fn test_tokenize_forms() {
        let parsed = tokenize(&args(&[
            "--name", "app", "--port=80", "--verbose", "--no-color", "-x", "1", "serve",
        ]));
        assert_eq!(
            Value::Object(parsed),
            json!({
                "name": "app",
                "port": "80",
                "verbose": true,
                "color": false,
                "x": "1",
                "_": ["serve"]
            })
        );
    }

    #[test]
    fn test_flag_before_option_stays_boolean() {
        let parsed = tokenize(&args(&["--debug", "--level", "3"]));
        assert_eq!(parsed.get("debug"), Some(&json!(true)));
        assert_eq!(parsed.get("level"), Some(&json!("3")));
    }

    #[test]
    fn test_short_cluster_and_negative_number() {
        let parsed = tokenize(&args(&["-abc", "--offset", "-5"]));
        assert_eq!(parsed.get("a"), Some(&json!(true)));
        assert_eq!(parsed.get("c"), Some(&json!(true)));
        assert_eq!(parsed.get("offset"), Some(&json!("-5")));
    }

    #[test]
    fn test_repeated_keys_collect() {
        let parsed = tokenize(&args(&["--tag", "a", "--tag", "b", "--tag=c"]));
        assert_eq!(parsed.get("tag"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_double_dash_ends_options() {
        let parsed = tokenize(&args(&["--a", "1", "--", "--b", "x"]));
        assert_eq!(parsed.get("_"), Some(&json!(["--b", "x"])));
        assert!(parsed.get("b").is_none());
    }

    #[test]
    fn test_specs_alias_and_default() {
        let mut parsed = tokenize(&args(&["-v"]));
        apply_specs(
            &mut parsed,
            &[
                ArgSpec::new("verbose").alias("v"),
                ArgSpec::new("port").default_value(json!(8080)),
                ArgSpec::new("host"),
            ],
        );
        assert_eq!(parsed.get("verbose"), Some(&json!(true)));
        assert_eq!(parsed.get("v"), Some(&json!(true)));
        assert_eq!(parsed.get("port"), Some(&json!(8080)));
        assert!(parsed.get("host").is_none());
    }

    #[test]
    fn test_load_splits_and_parses() {
        let options = ArgvOptions {
            parse_values: true,
            ..ArgvOptions::default()
                .with_args(["--db__port", "5432", "--db:host", "local"])
                .with_separator("__")
        };
        let mut store = ArgvStore::new(options);
        assert_eq!(
            store.load_sync().unwrap(),
            json!({"db": {"port": 5432, "host": "local"}})
        );
        assert!(store.read_only());
    }
}
