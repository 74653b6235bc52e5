//! Error types for configuration providers and stores.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for provider and store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the provider and its stores.
///
/// Configuration errors (unknown store type, missing capability) are
/// raised immediately. Backend errors (I/O, malformed content, remote
/// failures) are passed through unchanged, wrapped in [`Error::Store`]
/// when they cross the provider so the offending store is identifiable.
/// Semantic rejections such as writing to a read-only store are not
/// errors; they surface as a `false` return value.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested store type is not one of the known kinds.
    #[error("cannot add store '{name}' with unknown type: {kind}")]
    UnknownStoreType { name: String, kind: String },

    /// Store names must be non-empty.
    #[error("invalid store name: '{0}'")]
    InvalidStoreName(String),

    /// No store with this name is registered.
    #[error("cannot use store that does not exist: {0}")]
    StoreNotFound(String),

    /// A store was asked for an operation it does not implement.
    #[error("store '{name}' of type {kind} has no {capability}() method")]
    MissingCapability {
        name: String,
        kind: String,
        capability: &'static str,
    },

    /// Raised by a store's default method; the provider rewrites it into
    /// [`Error::MissingCapability`] once the store name is known.
    #[error("store of type {kind} does not support {capability}()")]
    Unsupported {
        kind: String,
        capability: &'static str,
    },

    /// Merging into the root requires a mapping.
    #[error("cannot merge non-object into top-level")]
    MergeRootNotObject,

    /// Keys checked with `required` that no store defines.
    #[error("missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    /// Sources were configured but every store is read-only.
    #[error("no writable store available to receive source values")]
    NoWritableStore,

    /// Serialized content could not be decoded.
    #[error("error parsing configuration file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Serializing a store's data failed.
    #[error("error serializing configuration for {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    /// Reading or writing a backing file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A store option was rejected at construction.
    #[error("invalid option for {kind} store: {message}")]
    InvalidOption { kind: String, message: String },

    /// A remote backend failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Installing a file watcher failed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Store options did not match the expected shape.
    #[error("invalid store options: {0}")]
    Options(#[from] serde_json::Error),

    /// A provider description file could not be decoded.
    #[error("invalid provider description: {0}")]
    Description(#[from] serde_yaml::Error),

    /// Context wrapper naming the store an error came from.
    #[error("store '{name}' ({kind}): {source}")]
    Store {
        name: String,
        kind: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the store identity to an error.
    ///
    /// [`Error::Unsupported`] becomes [`Error::MissingCapability`]; every
    /// other error is wrapped in [`Error::Store`].
    pub fn in_store(self, name: &str, kind: &str) -> Self {
        match self {
            Error::Unsupported { capability, .. } => Error::MissingCapability {
                name: name.to_string(),
                kind: kind.to_string(),
                capability,
            },
            err @ (Error::MissingCapability { .. } | Error::Store { .. }) => err,
            err => Error::Store {
                name: name.to_string(),
                kind: kind.to_string(),
                source: Box::new(err),
            },
        }
    }

    /// The innermost error, skipping [`Error::Store`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Store { source, .. } => source.root_cause(),
            err => err,
        }
    }
}
