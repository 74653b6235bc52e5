//! Integration tests for the built-in store kinds.
//!
//! Environment and argument stores are fed injected variable and argument
//! lists so the tests never touch process state.

use hierconf::store::{FileStore, create};
use hierconf::{
    ArgSpec, ArgvOptions, EnvOptions, Error, FileOptions, Format, Provider, Store, StoreOptions,
    Transform, load_files, load_files_async,
};
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn segments(key: &str) -> Vec<String> {
    hierconf::key_path::path(Some(key), ":")
}

fn env_provider(options: EnvOptions) -> Provider {
    let mut provider = Provider::new();
    provider.env(options).unwrap();
    provider
}

// ============================================================================
// env
// ============================================================================

#[test]
fn test_env_reads_all_variables_without_filters() {
    let provider = env_provider(EnvOptions::default().with_vars([("FOO", "1"), ("BAR", "two")]));
    assert_eq!(provider.get("FOO"), Some(json!("1")));
    assert_eq!(provider.get("BAR"), Some(json!("two")));
}

#[test]
fn test_env_whitelist_and_match() {
    let options = EnvOptions {
        whitelist: vec!["FOO".into()],
        match_pattern: Some("^BA[Z]$".into()),
        ..EnvOptions::default().with_vars([("FOO", "1"), ("BAR", "2"), ("BAZ", "3")])
    };
    let provider = env_provider(options);

    assert_eq!(provider.get("FOO"), Some(json!("1")));
    assert_eq!(provider.get("BAR"), None);
    assert_eq!(provider.get("BAZ"), Some(json!("3")));
}

#[test]
fn test_env_lower_case_keys() {
    let options = EnvOptions {
        lower_case: true,
        ..EnvOptions::default().with_vars([("NCONF_foo", "bar")])
    };
    let provider = env_provider(options);
    assert_eq!(provider.get("nconf_foo"), Some(json!("bar")));
    assert_eq!(provider.get("NCONF_foo"), None);
}

#[test]
fn test_env_parse_values() {
    let options = EnvOptions {
        parse_values: true,
        ..EnvOptions::default().with_vars([
            ("NUM", "3600"),
            ("FLAG", "true"),
            ("NOTHING", "undefined"),
            ("NIL", "null"),
            ("LIST", "[1, 2]"),
            ("TEXT", "hello"),
        ])
    };
    let provider = env_provider(options);

    assert_eq!(provider.get("NUM"), Some(json!(3600)));
    assert_eq!(provider.get("FLAG"), Some(json!(true)));
    assert_eq!(provider.get("NOTHING"), None);
    assert_eq!(provider.get("NIL"), Some(Value::Null));
    assert_eq!(provider.get("LIST"), Some(json!([1, 2])));
    assert_eq!(provider.get("TEXT"), Some(json!("hello")));
}

#[test]
fn test_env_separator_nests_and_transform_rewrites() {
    let options = EnvOptions {
        transform: Some(Transform::new(|key, value| {
            if key == "SECRET" {
                return None;
            }
            Some((key.replace("OLD__", "NEW__"), value))
        })),
        ..EnvOptions::default()
            .with_separator("__")
            .with_vars([("OLD__PORT", "80"), ("SECRET", "x"), ("APP__NAME", "demo")])
    };
    let provider = env_provider(options);

    assert_eq!(provider.get("NEW:PORT"), Some(json!("80")));
    assert_eq!(provider.get("OLD:PORT"), None);
    assert_eq!(provider.get("SECRET"), None);
    assert_eq!(provider.get("APP"), Some(json!({"NAME": "demo"})));
}

#[test]
fn test_env_store_is_read_only() {
    let mut provider = env_provider(EnvOptions::default().with_vars([("A", "1")]));
    assert!(!provider.set("A", json!(2)));

    provider.memory().unwrap();
    assert!(provider.set("A", json!(2)));
    assert_eq!(provider.get("A"), Some(json!("1")));
}

#[test]
fn test_env_invalid_match_is_option_error() {
    let options = EnvOptions {
        match_pattern: Some("[".into()),
        ..Default::default()
    };
    let err = Provider::new().env(options).map(|_| ()).unwrap_err();
    assert!(matches!(err.root_cause(), Error::InvalidOption { .. }));
}

// ============================================================================
// argv
// ============================================================================

#[test]
fn test_argv_store_through_provider() {
    let options = ArgvOptions {
        parse_values: true,
        ..ArgvOptions::default()
            .with_args(["serve", "--port", "8080", "--db:host", "x", "-v"])
            .with_spec(ArgSpec::new("verbose").alias("v"))
            .with_spec(ArgSpec::new("mode").default_value(json!("dev")))
    };
    let mut provider = Provider::new();
    provider.argv(options).unwrap();

    assert_eq!(provider.get("port"), Some(json!(8080)));
    assert_eq!(provider.get("db:host"), Some(json!("x")));
    assert_eq!(provider.get("verbose"), Some(json!(true)));
    assert_eq!(provider.get("v"), Some(json!(true)));
    assert_eq!(provider.get("mode"), Some(json!("dev")));
    assert_eq!(provider.get("_"), Some(json!(["serve"])));
    assert!(provider.store("argv").unwrap().read_only());
}

#[test]
fn test_argv_values_stay_strings_without_parsing() {
    let mut provider = Provider::new();
    provider
        .argv(ArgvOptions::default().with_args(["--count=3", "--no-color"]))
        .unwrap();

    assert_eq!(provider.get("count"), Some(json!("3")));
    assert_eq!(provider.get("color"), Some(json!(false)));
}

// ============================================================================
// file
// ============================================================================

#[test]
fn test_yaml_file_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("settings.yaml");
    fs::write(&path, "server:\n  port: 80\nname: app\n").unwrap();

    let mut store = FileStore::new(FileOptions::new(&path));
    assert_eq!(store.format(), Format::Yaml);
    assert_eq!(
        store.load_sync().unwrap(),
        json!({"server": {"port": 80}, "name": "app"})
    );

    assert!(store.set(&segments("server:host"), json!("0.0.0.0")));
    store.save_sync().unwrap();

    let reread: Value = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        reread,
        json!({"server": {"port": 80, "host": "0.0.0.0"}, "name": "app"})
    );
}

#[test]
fn test_file_bom_and_empty_content() {
    let temp = TempDir::new().unwrap();
    let bom = temp.path().join("bom.json");
    fs::write(&bom, "\u{feff}{\"a\": 1}").unwrap();
    let empty = temp.path().join("empty.json");
    fs::write(&empty, "").unwrap();

    let mut provider = Provider::new();
    provider
        .file_named("bom", bom.as_path())
        .unwrap()
        .file_named("empty", empty.as_path())
        .unwrap();
    assert_eq!(provider.get("a"), Some(json!(1)));
    assert_eq!(provider.store("empty").unwrap().data(), json!({}));
}

#[test]
fn test_read_only_file_store_rejects_writes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fixed.json");
    fs::write(&path, r#"{"a": 1}"#).unwrap();

    let mut store = create(StoreOptions::File(FileOptions::new(&path).with_read_only(true))).unwrap();
    store.load_sync().unwrap();
    assert!(store.read_only());
    assert!(!store.set(&segments("a"), json!(2)));
    assert_eq!(store.get(&segments("a")), Some(json!(1)));
}

#[tokio::test]
async fn test_file_async_load_and_save() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("async.json");
    fs::write(&path, r#"{"x": true}"#).unwrap();

    let mut store = FileStore::new(FileOptions::new(&path));
    assert_eq!(store.load().await.unwrap(), json!({"x": true}));
    store.set(&segments("y"), json!(1));
    store.save().await.unwrap();

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({"x": true, "y": 1}));
}

#[test]
fn test_load_files_merges_later_over_earlier() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("base.json");
    fs::write(&first, r#"{"a": 1, "shared": {"x": 1, "y": 1}}"#).unwrap();
    let second = temp.path().join("local.yaml");
    fs::write(&second, "shared:\n  y: 2\nb: 2\n").unwrap();

    let merged = load_files(&[&first, &second]).unwrap();
    assert_eq!(merged, json!({"a": 1, "b": 2, "shared": {"x": 1, "y": 2}}));

    let err = load_files(&[temp.path().join("absent.json")]).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[tokio::test]
async fn test_load_files_async_matches_blocking() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("one.json");
    fs::write(&first, r#"{"a": {"b": 1}}"#).unwrap();
    let second = temp.path().join("two.json");
    fs::write(&second, r#"{"a": {"c": 2}}"#).unwrap();

    let paths = [first, second];
    let merged = load_files_async(&paths).await.unwrap();
    assert_eq!(merged, json!({"a": {"b": 1, "c": 2}}));
    assert_eq!(merged, load_files(&paths).unwrap());
}

// ============================================================================
// watch
// ============================================================================

#[test]
fn test_watch_store_behaves_like_file_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("watched.json");
    fs::write(&path, r#"{"level": "info"}"#).unwrap();

    let mut provider = Provider::new();
    provider
        .add("watched", StoreOptions::Watch(FileOptions::new(&path)))
        .unwrap();
    assert_eq!(provider.get("level"), Some(json!("info")));

    assert!(provider.set("level", json!("debug")));
    provider.save().unwrap();
    assert!(provider.remove("watched"));

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({"level": "debug"}));
}
