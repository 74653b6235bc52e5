//! File store that reloads itself when the file changes on disk.
//!
//! The parent directory is watched (so editors that replace the file are
//! seen) and events are filtered down to the store's file name. Reloads run
//! on a background thread and swap the tree in through an [`ArcSwap`];
//! each successful reload bumps a generation counter that callers can
//! observe with [`WatchStore::subscribe`].

use super::file::{FileOptions, read_file, read_file_async, write_file, write_file_async};
use super::{Capabilities, Memory, Store};
use crate::error::Result;
use crate::format::Format;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify_debouncer_mini::{DebouncedEventKind, Debouncer, new_debouncer};
use serde_json::Value;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

type DebounceResult = std::result::Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>;

pub struct WatchStore {
    path: PathBuf,
    format: Format,
    memory: Arc<ArcSwap<Memory>>,
    generation: watch::Receiver<u64>,
    debouncer: Option<Debouncer<notify::RecommendedWatcher>>,
}

impl fmt::Debug for WatchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchStore")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("watching", &self.debouncer.is_some())
            .field("generation", &*self.generation.borrow())
            .finish()
    }
}

impl WatchStore {
    pub fn new(options: FileOptions) -> Result<Self> {
        Self::with_debounce(options, DEFAULT_DEBOUNCE)
    }

    /// Create the store and start watching with the given debounce window.
    pub fn with_debounce(options: FileOptions, debounce: Duration) -> Result<Self> {
        let path = options.resolved_path();
        let format = options.resolved_format();
        let memory = Arc::new(ArcSwap::from_pointee(
            Memory::new().with_read_only(options.read_only),
        ));
        let (generation_tx, generation_rx) = watch::channel(0u64);

        let debouncer = start_watcher(&path, format, debounce, Arc::clone(&memory), generation_tx)?;

        Ok(Self {
            path,
            format,
            memory,
            generation: generation_rx,
            debouncer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a file watcher is currently running.
    pub fn is_watching(&self) -> bool {
        self.debouncer.is_some()
    }

    /// Receiver that changes each time the file is reloaded from disk.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.clone()
    }

    fn update(&self, f: impl FnMut(&mut Memory) -> bool) -> bool {
        apply(&self.memory, f)
    }

    fn install(&self, data: Value) {
        self.update(|memory| {
            memory.replace(data.clone());
            true
        });
    }
}

/// Copy-on-write update; retried when another writer swaps the tree first.
fn apply(memory: &ArcSwap<Memory>, mut f: impl FnMut(&mut Memory) -> bool) -> bool {
    let mut updated = false;
    memory.rcu(|current| {
        let mut next = Memory::clone(current);
        updated = f(&mut next);
        next
    });
    updated
}

fn start_watcher(
    path: &Path,
    format: Format,
    debounce: Duration,
    memory: Arc<ArcSwap<Memory>>,
    generation: watch::Sender<u64>,
) -> Result<Option<Debouncer<notify::RecommendedWatcher>>> {
    let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
        warn!("Cannot watch path without a parent directory: {}", path.display());
        return Ok(None);
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    if !dir.exists() {
        warn!(
            "Config directory does not exist, skipping watch: {}",
            dir.display()
        );
        return Ok(None);
    }

    let (notify_tx, notify_rx) = mpsc::channel();
    let mut debouncer = new_debouncer(debounce, notify_tx)?;
    debouncer
        .watcher()
        .watch(dir, notify::RecursiveMode::NonRecursive)?;
    info!("Watching config file: {}", path.display());

    let target = file_name.to_os_string();
    let path = path.to_path_buf();
    std::thread::spawn(move || {
        process_events(notify_rx, &path, &target, format, &memory, &generation);
    });

    Ok(Some(debouncer))
}

fn process_events(
    rx: mpsc::Receiver<DebounceResult>,
    path: &Path,
    target: &OsString,
    format: Format,
    memory: &ArcSwap<Memory>,
    generation: &watch::Sender<u64>,
) {
    while let Ok(result) = rx.recv() {
        match result {
            Ok(events) => {
                let touched = events.iter().any(|event| {
                    matches!(
                        event.kind,
                        DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                    ) && is_target(&event.path, target)
                });
                if !touched {
                    continue;
                }
                match read_file(path, format) {
                    Ok(data) => {
                        apply(memory, |next| {
                            next.replace(data.clone());
                            true
                        });
                        generation.send_modify(|g| *g += 1);
                        debug!("Reloaded config file: {}", path.display());
                    }
                    Err(e) => warn!("Failed to reload {}: {}", path.display(), e),
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        }
    }
    debug!("Config watcher stopped: {}", path.display());
}

fn is_target(event_path: &Path, target: &OsString) -> bool {
    event_path.file_name() == Some(target.as_os_str())
}

#[async_trait]
impl Store for WatchStore {
    fn kind(&self) -> &str {
        "watch"
    }

    fn read_only(&self) -> bool {
        self.memory.load().is_read_only()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PERSISTENT
    }

    fn data(&self) -> Value {
        self.memory.load().data().clone()
    }

    fn mtimes(&self) -> HashMap<String, DateTime<Utc>> {
        self.memory.load().mtimes().clone()
    }

    fn get(&self, path: &[String]) -> Option<Value> {
        self.memory.load().get(path)
    }

    fn set(&mut self, path: &[String], value: Value) -> bool {
        self.update(|memory| memory.set(path, value.clone()))
    }

    fn clear(&mut self, path: &[String]) -> bool {
        self.update(|memory| memory.clear(path))
    }

    fn merge(&mut self, path: &[String], value: Value) -> bool {
        self.update(|memory| memory.merge(path, value.clone()))
    }

    fn reset(&mut self) -> bool {
        self.update(Memory::reset)
    }

    fn load_sync(&mut self) -> Result<Value> {
        let data = read_file(&self.path, self.format)?;
        self.install(data.clone());
        Ok(data)
    }

    async fn load(&mut self) -> Result<Value> {
        let data = read_file_async(&self.path, self.format).await?;
        self.install(data.clone());
        Ok(data)
    }

    fn save_sync(&mut self) -> Result<Value> {
        let data = self.data();
        write_file(&self.path, self.format, &data)?;
        Ok(data)
    }

    async fn save(&mut self) -> Result<Value> {
        let data = self.data();
        write_file_async(&self.path, self.format, &data).await?;
        Ok(data)
    }

    fn close(&mut self) {
        if self.debouncer.take().is_some() {
            debug!("Stopped watching config file: {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_is_target_matches_file_name_only() {
        let target = OsString::from("app.json");
        assert!(is_target(Path::new("/etc/app/app.json"), &target));
        assert!(!is_target(Path::new("/etc/app/other.json"), &target));
        assert!(!is_target(Path::new("/etc/app"), &target));
    }

    #[test]
    fn test_load_set_and_save() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.json");
        std::fs::write(&path, r#"{"port": 80}"#).unwrap();

        let mut store = WatchStore::new(FileOptions::new(&path)).unwrap();
        assert!(store.is_watching());
        assert_eq!(store.load_sync().unwrap(), json!({"port": 80}));

        assert!(store.set(&["host".to_string()], json!("localhost")));
        assert_eq!(store.get(&["host".to_string()]), Some(json!("localhost")));
        assert_eq!(
            store.save_sync().unwrap(),
            json!({"port": 80, "host": "localhost"})
        );
        store.close();
        assert!(!store.is_watching());

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, json!({"port": 80, "host": "localhost"}));
    }

    #[test]
    fn test_concurrent_writes_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let store = WatchStore::new(FileOptions::new(temp.path().join("app.json"))).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..50 {
                        let key = format!("w{worker}_{i}");
                        assert!(store.update(|memory| memory.set(&[key.clone()], json!(i))));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    apply(&store.memory, |memory| memory.merge(&[], json!({"reloaded": true})));
                }
            });
        });

        let data = store.data();
        let map = data.as_object().unwrap();
        assert_eq!(map.len(), 4 * 50 + 1);
        assert_eq!(map.get("w3_49"), Some(&json!(49)));
    }

    #[tokio::test]
    async fn test_external_change_reloads_and_notifies() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.json");
        std::fs::write(&path, r#"{"port": 80}"#).unwrap();

        let mut store =
            WatchStore::with_debounce(FileOptions::new(&path), Duration::from_millis(50)).unwrap();
        store.load_sync().unwrap();
        let mut changes = store.subscribe();

        std::fs::write(&path, r#"{"port": 8080}"#).unwrap();

        let port = vec!["port".to_string()];
        let reloaded = tokio::time::timeout(Duration::from_secs(10), async {
            while store.get(&port) != Some(json!(8080)) {
                changes.changed().await.unwrap();
            }
        })
        .await;
        assert!(reloaded.is_ok(), "file change was not picked up");
        assert!(*store.subscribe().borrow() >= 1);
        store.close();
    }

    #[test]
    fn test_missing_directory_disables_watching() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("app.json");
        let mut store = WatchStore::new(FileOptions::new(&path)).unwrap();
        assert!(!store.is_watching());
        assert_eq!(store.load_sync().unwrap(), json!({}));
        assert_eq!(*store.subscribe().borrow(), 0);
    }
}
