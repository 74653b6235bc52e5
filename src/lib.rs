//! Hierarchical configuration library.
//!
//! A [`Provider`] holds an ordered list of named [`Store`]s (literal values,
//! environment variables, command-line arguments, files, remote namespaces)
//! and reads them as a single key/value namespace. Keys are paths such as
//! `database:host`; the first store that defines a key wins, and `load`
//! deep-merges every store into one snapshot with the same precedence.
//!
//! ```no_run
//! use hierconf::{EnvOptions, Provider};
//! use serde_json::json;
//!
//! # fn main() -> hierconf::Result<()> {
//! let mut config = Provider::new();
//! config
//!     .overrides(json!({"always": "be this value"}))?
//!     .env(EnvOptions::default().with_separator("__"))?
//!     .file("config.json")?
//!     .defaults(json!({"port": 8080}))?;
//!
//! let port = config.get("port");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod format;
pub mod key_path;
pub mod logging;
pub mod merge;
pub mod provider;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use format::Format;
pub use provider::{Provider, ProviderOptions, StoreSpec};
pub use store::{
    ArgSpec, ArgvOptions, Capabilities, EnvOptions, FileOptions, KeyValueBackend,
    LiteralOptions, MemoryBackend, MemoryOptions, RemoteStore, Store, StoreKind, StoreOptions,
    Transform, load_files, load_files_async,
};
