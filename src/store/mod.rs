//! The store contract and the built-in store kinds.
//!
//! A store is a named unit of configuration data: a nested mapping that
//! supports `get`/`set`/`merge`/`clear`/`reset` over path segments, plus
//! backend-specific `load` and `save`. Each store declares which of the
//! blocking and asynchronous load/save operations it supports through
//! [`Capabilities`]; the provider never guesses.
//!
//! ## Kinds
//! - `memory` - plain in-process tree
//! - `literal` - tree seeded from a fixed value (read-only by default)
//! - `file` - JSON/YAML file on disk
//! - `watch` - file store that reloads itself when the file changes
//! - `env` - process environment (read-only by default)
//! - `argv` - command-line arguments (read-only by default)
//! - `remote` - namespace in an external key/value backend (async only)

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Operations a store can perform beyond the in-memory tree operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Blocking `load_sync`.
    pub load_sync: bool,
    /// Asynchronous `load`.
    pub load_async: bool,
    /// Blocking `save_sync`.
    pub save_sync: bool,
    /// Asynchronous `save`.
    pub save_async: bool,
    /// Asynchronous `get_async` that consults the backend.
    pub get_async: bool,
}

impl Capabilities {
    /// Tree-only stores: loading returns the current data.
    pub const IN_MEMORY: Self = Self {
        load_sync: true,
        load_async: false,
        save_sync: false,
        save_async: false,
        get_async: false,
    };

    /// Stores persisted locally, loadable and savable in both modes.
    pub const PERSISTENT: Self = Self {
        load_sync: true,
        load_async: true,
        save_sync: true,
        save_async: true,
        get_async: false,
    };

    /// Stores reachable only asynchronously.
    pub const ASYNC_ONLY: Self = Self {
        load_sync: false,
        load_async: true,
        save_sync: false,
        save_async: true,
        get_async: true,
    };
}

/// A unit of configuration data.
///
/// Tree operations never fail: a missing key reads as `None`, and a
/// rejected write (read-only store, non-mapping root) returns `false`.
/// Load and save report backend failures as errors. The default load and
/// save methods return [`Error::Unsupported`]; stores override the ones
/// listed in their [`Capabilities`].
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Kind name (`memory`, `file`, ...).
    fn kind(&self) -> &str;

    fn read_only(&self) -> bool;

    fn capabilities(&self) -> Capabilities;

    /// Snapshot of the whole tree.
    fn data(&self) -> Value;

    /// Last-modified time per `:`-joined key.
    fn mtimes(&self) -> HashMap<String, DateTime<Utc>> {
        HashMap::new()
    }

    fn get(&self, path: &[String]) -> Option<Value>;

    fn set(&mut self, path: &[String], value: Value) -> bool;

    fn clear(&mut self, path: &[String]) -> bool;

    fn merge(&mut self, path: &[String], value: Value) -> bool;

    fn reset(&mut self) -> bool;

    /// Hydrate the tree from the backend, blocking.
    fn load_sync(&mut self) -> Result<Value> {
        Err(self.unsupported("load_sync"))
    }

    /// Hydrate the tree from the backend.
    async fn load(&mut self) -> Result<Value> {
        Err(self.unsupported("load"))
    }

    /// Persist the tree, blocking. Returns the persisted data.
    fn save_sync(&mut self) -> Result<Value> {
        Err(self.unsupported("save_sync"))
    }

    /// Persist the tree. Returns the persisted data.
    async fn save(&mut self) -> Result<Value> {
        Err(self.unsupported("save"))
    }

    /// Read a key from the backend rather than the local tree.
    async fn get_async(&self, path: &[String]) -> Result<Option<Value>> {
        Ok(self.get(path))
    }

    /// Release backend resources such as file watchers.
    fn close(&mut self) {}

    #[doc(hidden)]
    fn unsupported(&self, capability: &'static str) -> Error {
        Error::Unsupported {
            kind: self.kind().to_string(),
            capability,
        }
    }
}

/// Implements the tree half of [`Store`] by delegating to a [`Memory`] field.
macro_rules! memory_backed {
    ($field:ident) => {
        fn read_only(&self) -> bool {
            self.$field.is_read_only()
        }

        fn data(&self) -> serde_json::Value {
            self.$field.data().clone()
        }

        fn mtimes(
            &self,
        ) -> std::collections::HashMap<String, chrono::DateTime<chrono::Utc>> {
            self.$field.mtimes().clone()
        }

        fn get(&self, path: &[String]) -> Option<serde_json::Value> {
            self.$field.get(path)
        }

        fn set(&mut self, path: &[String], value: serde_json::Value) -> bool {
            self.$field.set(path, value)
        }

        fn clear(&mut self, path: &[String]) -> bool {
            self.$field.clear(path)
        }

        fn merge(&mut self, path: &[String], value: serde_json::Value) -> bool {
            self.$field.merge(path, value)
        }

        fn reset(&mut self) -> bool {
            self.$field.reset()
        }
    };
}
pub(crate) use memory_backed;

mod argv;
mod env;
mod file;
mod literal;
mod memory;
mod remote;
mod watch;

pub use argv::{ArgSpec, ArgvOptions, ArgvStore};
pub use env::{EnvOptions, EnvStore, Transform};
pub use file::{FileOptions, FileStore, load_files, load_files_async};
pub use literal::{LiteralOptions, LiteralStore};
pub use memory::{Memory, MemoryOptions};
pub use remote::{KeyValueBackend, MemoryBackend, RemoteStore};
pub use watch::WatchStore;

/// Built-in store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Memory,
    Literal,
    File,
    Watch,
    Env,
    Argv,
    Remote,
}

impl StoreKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(StoreKind::Memory),
            "literal" => Some(StoreKind::Literal),
            "file" => Some(StoreKind::File),
            "watch" => Some(StoreKind::Watch),
            "env" => Some(StoreKind::Env),
            "argv" => Some(StoreKind::Argv),
            "remote" => Some(StoreKind::Remote),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Literal => "literal",
            StoreKind::File => "file",
            StoreKind::Watch => "watch",
            StoreKind::Env => "env",
            StoreKind::Argv => "argv",
            StoreKind::Remote => "remote",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one of the store kinds constructible from a description.
///
/// Remote stores need a live backend and are added with
/// [`crate::Provider::add_store`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreOptions {
    Memory(MemoryOptions),
    Literal(LiteralOptions),
    File(FileOptions),
    Watch(FileOptions),
    Env(EnvOptions),
    Argv(ArgvOptions),
}

impl StoreOptions {
    /// Build options from a kind name and its untyped fields.
    ///
    /// `name` is only used to label an unknown-type error.
    pub fn from_spec(name: &str, kind: &str, fields: Map<String, Value>) -> Result<Self> {
        let Some(kind) = StoreKind::from_str(kind) else {
            return Err(Error::UnknownStoreType {
                name: name.to_string(),
                kind: kind.to_string(),
            });
        };

        let fields = Value::Object(fields);
        let options = match kind {
            StoreKind::Memory => StoreOptions::Memory(serde_json::from_value(fields)?),
            StoreKind::Literal => StoreOptions::Literal(serde_json::from_value(fields)?),
            StoreKind::File => StoreOptions::File(serde_json::from_value(fields)?),
            StoreKind::Watch => StoreOptions::Watch(serde_json::from_value(fields)?),
            StoreKind::Env => StoreOptions::Env(serde_json::from_value(fields)?),
            StoreKind::Argv => StoreOptions::Argv(serde_json::from_value(fields)?),
            StoreKind::Remote => {
                return Err(Error::InvalidOption {
                    kind: kind.to_string(),
                    message: "remote stores require a backend and must be added directly"
                        .to_string(),
                });
            }
        };
        Ok(options)
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            StoreOptions::Memory(_) => StoreKind::Memory,
            StoreOptions::Literal(_) => StoreKind::Literal,
            StoreOptions::File(_) => StoreKind::File,
            StoreOptions::Watch(_) => StoreKind::Watch,
            StoreOptions::Env(_) => StoreKind::Env,
            StoreOptions::Argv(_) => StoreKind::Argv,
        }
    }

    /// Top-level option fields, including `type`, for shallow comparison.
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Instantiate a store from its options.
pub fn create(options: StoreOptions) -> Result<Box<dyn Store>> {
    let store: Box<dyn Store> = match options {
        StoreOptions::Memory(opts) => Box::new(Memory::from_options(opts)),
        StoreOptions::Literal(opts) => Box::new(LiteralStore::new(opts)),
        StoreOptions::File(opts) => Box::new(FileStore::new(opts)),
        StoreOptions::Watch(opts) => Box::new(WatchStore::new(opts)?),
        StoreOptions::Env(opts) => Box::new(EnvStore::new(opts)?),
        StoreOptions::Argv(opts) => Box::new(ArgvStore::new(opts)),
    };
    Ok(store)
}
