//! The provider: an ordered set of named stores read as one namespace.
//!
//! Stores are kept in precedence order, first added first. Reads walk the
//! stores in that order and stop at the first defined value. Writes go to
//! the primary store, the first store that is not read-only. `load` and
//! `save` fan out to every store and fold the per-store data into a single
//! snapshot where higher-precedence values win.
//!
//! Every fan-out operation has a blocking form and an `async` form. The
//! blocking form fails with [`Error::MissingCapability`] when a store can
//! only be reached asynchronously.

pub mod options;

pub use options::{ProviderOptions, StoreSpec};

use crate::error::{Error, Result};
use crate::key_path;
use crate::merge;
use crate::store::{
    self, ArgvOptions, EnvOptions, FileOptions, LiteralOptions, MemoryOptions, Store,
    StoreOptions,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

struct StoreEntry {
    name: String,
    /// Serialized options for `use_store` comparison; `None` for stores
    /// added as instances.
    options: Option<Map<String, Value>>,
    store: Box<dyn Store>,
}

impl StoreEntry {
    fn wrap(&self, err: Error) -> Error {
        err.in_store(&self.name, self.store.kind())
    }

    fn load_sync(&mut self) -> Result<Value> {
        load_blocking(&self.name, self.store.as_mut())
    }

    async fn load_async(&mut self) -> Result<Value> {
        load_any(&self.name, self.store.as_mut()).await
    }
}

fn missing(name: &str, store: &dyn Store, capability: &'static str) -> Error {
    Error::MissingCapability {
        name: name.to_string(),
        kind: store.kind().to_string(),
        capability,
    }
}

fn load_blocking(name: &str, store: &mut dyn Store) -> Result<Value> {
    if !store.capabilities().load_sync {
        return Err(missing(name, store, "load_sync"));
    }
    let kind = store.kind().to_string();
    store.load_sync().map_err(|e| e.in_store(name, &kind))
}

/// Load with whichever mode the store supports, blocking first.
async fn load_any(name: &str, store: &mut dyn Store) -> Result<Value> {
    let capabilities = store.capabilities();
    let kind = store.kind().to_string();
    if capabilities.load_sync {
        store.load_sync().map_err(|e| e.in_store(name, &kind))
    } else if capabilities.load_async {
        store.load().await.map_err(|e| e.in_store(name, &kind))
    } else {
        Err(missing(name, store, "load"))
    }
}

fn source_name(index: usize) -> String {
    format!("source[{index}]")
}

/// Shallow option comparison used by [`Provider::use_store`].
///
/// Every field of the new options must be a scalar equal to the existing
/// store's field. Mappings and lists never compare equal.
fn same_options(existing: &Map<String, Value>, new: &Map<String, Value>) -> bool {
    new.iter().all(|(key, value)| {
        !matches!(value, Value::Object(_) | Value::Array(_)) && existing.get(key) == Some(value)
    })
}

/// Hierarchical configuration provider.
pub struct Provider {
    stores: Vec<StoreEntry>,
    sources: Vec<Box<dyn Store>>,
    separator: String,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("stores", &self.store_names())
            .field("sources", &self.sources.len())
            .field("separator", &self.separator)
            .finish()
    }
}

impl Provider {
    pub fn new() -> Self {
        Self::with_separator(key_path::DEFAULT_SEPARATOR)
    }

    /// Create a provider whose keys are split on `separator`.
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            stores: Vec::new(),
            sources: Vec::new(),
            separator: separator.into(),
        }
    }

    /// Build a provider from a declarative description.
    pub fn from_options(options: ProviderOptions) -> Result<Self> {
        let mut provider = Self::with_separator(options.separator);
        for spec in options.stores {
            let name = spec.store_name().to_string();
            let store_options = StoreOptions::from_spec(&name, &spec.kind, spec.fields)?;
            provider.add(&name, store_options)?;
        }
        for (index, spec) in options.sources.into_iter().enumerate() {
            let store_options = StoreOptions::from_spec(&source_name(index), &spec.kind, spec.fields)?;
            provider.add_source(store_options)?;
        }
        Ok(provider)
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Split a key with this provider's separator.
    pub fn path(&self, key: &str) -> Vec<String> {
        key_path::path(Some(key), &self.separator)
    }

    // ------------------------------------------------------------------
    // Store management
    // ------------------------------------------------------------------

    /// Add a store built from `options`.
    ///
    /// Stores that can load synchronously are hydrated immediately. A store
    /// already registered under `name` is closed and the new store is
    /// appended at the end of the precedence order.
    pub fn add(&mut self, name: &str, options: StoreOptions) -> Result<&mut Self> {
        validate_name(name)?;
        let kind = options.kind();
        let fields = options.fields();
        let store = store::create(options).map_err(|e| e.in_store(name, kind.as_str()))?;
        self.insert(name, Some(fields), store)
    }

    /// Add a store unless one with equal options is already registered.
    ///
    /// Options compare shallowly: only top-level scalar fields can match,
    /// so options carrying a mapping or list always replace the store.
    pub fn use_store(&mut self, name: &str, options: StoreOptions) -> Result<&mut Self> {
        let fields = options.fields();
        let unchanged = self
            .entry(name)
            .and_then(|entry| entry.options.as_ref())
            .is_some_and(|existing| same_options(existing, &fields));
        if unchanged {
            debug!("Store '{}' unchanged, keeping existing instance", name);
            return Ok(self);
        }
        self.add(name, options)
    }

    /// Add an already constructed store, such as a remote or custom store.
    pub fn add_store(&mut self, name: &str, store: Box<dyn Store>) -> Result<&mut Self> {
        validate_name(name)?;
        self.insert(name, None, store)
    }

    /// Add a source: a store read only during `load` to seed the primary store.
    pub fn add_source(&mut self, options: StoreOptions) -> Result<&mut Self> {
        let kind = options.kind();
        let name = source_name(self.sources.len());
        let store = store::create(options).map_err(|e| e.in_store(&name, kind.as_str()))?;
        Ok(self.add_source_store(store))
    }

    pub fn add_source_store(&mut self, store: Box<dyn Store>) -> &mut Self {
        debug!("Added {} source", store.kind());
        self.sources.push(store);
        self
    }

    /// Remove a store, closing its backend. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.stores.iter().position(|entry| entry.name == name) {
            Some(index) => {
                let mut entry = self.stores.remove(index);
                entry.store.close();
                debug!("Removed store '{}' ({})", name, entry.store.kind());
                true
            }
            None => false,
        }
    }

    pub fn store(&self, name: &str) -> Option<&dyn Store> {
        self.entry(name).map(|entry| entry.store.as_ref())
    }

    pub fn store_mut(&mut self, name: &str) -> Option<&mut (dyn Store + 'static)> {
        self.stores
            .iter_mut()
            .find(|entry| entry.name == name)
            .map(|entry| entry.store.as_mut())
    }

    /// Store names in precedence order.
    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(|entry| entry.name.as_str()).collect()
    }

    fn entry(&self, name: &str) -> Option<&StoreEntry> {
        self.stores.iter().find(|entry| entry.name == name)
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut StoreEntry> {
        self.stores
            .iter_mut()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))
    }

    fn insert(
        &mut self,
        name: &str,
        options: Option<Map<String, Value>>,
        mut store: Box<dyn Store>,
    ) -> Result<&mut Self> {
        if store.capabilities().load_sync {
            load_blocking(name, store.as_mut())?;
        } else {
            debug!(
                "Skipping eager load of store '{}' ({}): no blocking load",
                name,
                store.kind()
            );
        }

        if self.remove(name) {
            debug!("Replaced store '{}'", name);
        }
        debug!("Added store '{}' ({})", name, store.kind());
        self.stores.push(StoreEntry {
            name: name.to_string(),
            options,
            store,
        });
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    /// Add a file store named `file`.
    pub fn file(&mut self, options: impl Into<FileOptions>) -> Result<&mut Self> {
        self.file_named("file", options)
    }

    pub fn file_named(&mut self, name: &str, options: impl Into<FileOptions>) -> Result<&mut Self> {
        self.add(name, StoreOptions::File(options.into()))
    }

    pub fn env(&mut self, options: EnvOptions) -> Result<&mut Self> {
        self.add("env", StoreOptions::Env(options))
    }

    pub fn argv(&mut self, options: ArgvOptions) -> Result<&mut Self> {
        self.add("argv", StoreOptions::Argv(options))
    }

    pub fn literal(&mut self, value: Value) -> Result<&mut Self> {
        self.add("literal", StoreOptions::Literal(LiteralOptions::from(value)))
    }

    /// Read-only values meant to take precedence; add before other stores.
    pub fn overrides(&mut self, value: Value) -> Result<&mut Self> {
        self.add("overrides", StoreOptions::Literal(LiteralOptions::from(value)))
    }

    /// Read-only fallback values; add after other stores.
    pub fn defaults(&mut self, value: Value) -> Result<&mut Self> {
        self.add("defaults", StoreOptions::Literal(LiteralOptions::from(value)))
    }

    /// Add a writable in-memory store named `memory`.
    pub fn memory(&mut self) -> Result<&mut Self> {
        self.add("memory", StoreOptions::Memory(MemoryOptions::default()))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Value of `key` from the first store that defines it.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = self.path(key);
        self.stores.iter().find_map(|entry| entry.store.get(&path))
    }

    /// Like [`Provider::get`], consulting backends for stores that read
    /// asynchronously. Stores are queried strictly in order and the walk
    /// stops at the first defined value.
    pub async fn get_async(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        for entry in &self.stores {
            let value = if entry.store.capabilities().get_async {
                entry
                    .store
                    .get_async(&path)
                    .await
                    .map_err(|e| entry.wrap(e))?
            } else {
                entry.store.get(&path)
            };
            if value.is_some() {
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// The whole tree of the highest-precedence store.
    ///
    /// Every store defines its root, so this never falls through to later
    /// stores; use [`Provider::snapshot`] for the merged view.
    pub fn get_root(&self) -> Option<Value> {
        self.stores.iter().find_map(|entry| entry.store.get(&[]))
    }

    /// First defined value among candidate keys, tried in order.
    pub fn any(&self, keys: &[&str]) -> Option<Value> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub async fn any_async(&self, keys: &[&str]) -> Result<Option<Value>> {
        for key in keys {
            if let Some(value) = self.get_async(key).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Check that every key is defined.
    ///
    /// Fails with [`Error::MissingKeys`] listing the undefined keys in the
    /// order given.
    pub fn required(&self, keys: &[&str]) -> Result<&Self> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|key| self.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingKeys(missing));
        }
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn primary_mut(&mut self) -> Option<&mut StoreEntry> {
        self.stores.iter_mut().find(|entry| !entry.store.read_only())
    }

    /// Name of the store that receives untargeted writes.
    pub fn primary(&self) -> Option<&str> {
        self.stores
            .iter()
            .find(|entry| !entry.store.read_only())
            .map(|entry| entry.name.as_str())
    }

    /// Set `key` on the primary store. Returns `false` when nothing was written.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        let path = self.path(key);
        self.primary_mut()
            .is_some_and(|entry| entry.store.set(&path, value))
    }

    /// Replace the primary store's whole tree. Only mappings are accepted.
    pub fn set_root(&mut self, value: Value) -> bool {
        self.primary_mut()
            .is_some_and(|entry| entry.store.set(&[], value))
    }

    /// Merge `value` into `key` on the primary store.
    pub fn merge(&mut self, key: &str, value: Value) -> bool {
        let path = self.path(key);
        self.primary_mut()
            .is_some_and(|entry| entry.store.merge(&path, value))
    }

    /// Merge a mapping into the root of the primary store.
    pub fn merge_root(&mut self, value: Value) -> Result<bool> {
        if !value.is_object() {
            return Err(Error::MergeRootNotObject);
        }
        Ok(self
            .primary_mut()
            .is_some_and(|entry| entry.store.merge(&[], value)))
    }

    pub fn clear(&mut self, key: &str) -> bool {
        let path = self.path(key);
        self.primary_mut()
            .is_some_and(|entry| entry.store.clear(&path))
    }

    /// Empty the primary store.
    pub fn clear_root(&mut self) -> bool {
        self.primary_mut()
            .is_some_and(|entry| entry.store.clear(&[]))
    }

    /// Set `key` on the named store.
    pub fn set_in(&mut self, store: &str, key: &str, value: Value) -> Result<bool> {
        let path = self.path(key);
        Ok(self.entry_mut(store)?.store.set(&path, value))
    }

    pub fn merge_in(&mut self, store: &str, key: &str, value: Value) -> Result<bool> {
        let path = self.path(key);
        Ok(self.entry_mut(store)?.store.merge(&path, value))
    }

    pub fn clear_in(&mut self, store: &str, key: &str) -> Result<bool> {
        let path = self.path(key);
        Ok(self.entry_mut(store)?.store.clear(&path))
    }

    // ------------------------------------------------------------------
    // Fan-out
    // ------------------------------------------------------------------

    /// Hydrate every source and store, blocking, and return the merged view.
    pub fn load(&mut self) -> Result<Value> {
        let sources = if self.sources.is_empty() {
            None
        } else {
            let mut loaded = Vec::with_capacity(self.sources.len());
            for (index, source) in self.sources.iter_mut().enumerate() {
                loaded.push(load_blocking(&source_name(index), source.as_mut())?);
            }
            Some(merge::deep_merge_all(loaded.into_iter().rev()))
        };

        for entry in &mut self.stores {
            entry.load_sync()?;
            debug!("Loaded store '{}'", entry.name);
        }

        if let Some(merged) = sources {
            self.fold_sources(merged)?;
        }
        Ok(self.snapshot())
    }

    /// Hydrate every source and store and return the merged view.
    ///
    /// Each store is loaded with its blocking method when it has one and
    /// awaited otherwise; stores are processed strictly in order.
    pub async fn load_async(&mut self) -> Result<Value> {
        let sources = if self.sources.is_empty() {
            None
        } else {
            let mut loaded = Vec::with_capacity(self.sources.len());
            for (index, source) in self.sources.iter_mut().enumerate() {
                loaded.push(load_any(&source_name(index), source.as_mut()).await?);
            }
            Some(merge::deep_merge_all(loaded.into_iter().rev()))
        };

        for entry in &mut self.stores {
            entry.load_async().await?;
            debug!("Loaded store '{}'", entry.name);
        }

        if let Some(merged) = sources {
            self.fold_sources(merged)?;
        }
        Ok(self.snapshot())
    }

    fn fold_sources(&mut self, merged: Value) -> Result<()> {
        let entry = self.primary_mut().ok_or(Error::NoWritableStore)?;
        if let Value::Object(map) = merged {
            for (key, value) in map {
                if !entry.store.merge(std::slice::from_ref(&key), value) {
                    warn!("Store '{}' rejected source key '{}'", entry.name, key);
                }
            }
        }
        debug!("Merged sources into store '{}'", entry.name);
        Ok(())
    }

    /// Current data of all stores merged, highest precedence winning.
    pub fn snapshot(&self) -> Value {
        merge::deep_merge_all(self.stores.iter().rev().map(|entry| entry.store.data()))
    }

    /// Persist every store that can save, blocking.
    ///
    /// Stores without any save method are skipped; a store that can only
    /// save asynchronously is an error. Returns the saved data merged.
    pub fn save(&mut self) -> Result<Value> {
        let mut saved = Vec::with_capacity(self.stores.len());
        for entry in &mut self.stores {
            let capabilities = entry.store.capabilities();
            if capabilities.save_sync {
                saved.push(entry.store.save_sync().map_err(|e| entry.wrap(e))?);
                debug!("Saved store '{}'", entry.name);
            } else if capabilities.save_async {
                return Err(missing(&entry.name, entry.store.as_ref(), "save_sync"));
            } else {
                debug!("Store '{}' cannot save, skipping", entry.name);
            }
        }
        Ok(merge::deep_merge_all(saved.into_iter().rev()))
    }

    /// Persist every store that can save.
    pub async fn save_async(&mut self) -> Result<Value> {
        let mut saved = Vec::with_capacity(self.stores.len());
        for entry in &mut self.stores {
            let capabilities = entry.store.capabilities();
            let data = if capabilities.save_sync {
                entry.store.save_sync()
            } else if capabilities.save_async {
                entry.store.save().await
            } else {
                debug!("Store '{}' cannot save, skipping", entry.name);
                continue;
            };
            saved.push(data.map_err(|e| entry.wrap(e))?);
            debug!("Saved store '{}'", entry.name);
        }
        Ok(merge::deep_merge_all(saved.into_iter().rev()))
    }

    /// Clear every writable store.
    pub fn reset(&mut self) {
        for entry in &mut self.stores {
            if entry.store.reset() {
                debug!("Reset store '{}'", entry.name);
            }
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidStoreName(name.to_string()));
    }
    Ok(())
}
