//! File-backed store.
//!
//! Loads a JSON or YAML document into memory and writes it back on save.
//! A missing file loads as an empty mapping; it is only created by `save`.

use super::{Capabilities, Memory, Store, memory_backed};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::{merge, tree};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options for `file` and `watch` stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Location of the file. A leading `~/` expands to the home directory.
    pub path: PathBuf,
    /// Format override; chosen from the extension when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    pub read_only: bool,
}

impl FileOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }

    /// The explicit format, or the one implied by the extension.
    pub fn resolved_format(&self) -> Format {
        self.format.unwrap_or_else(|| Format::for_path(&self.path))
    }
}

impl From<&str> for FileOptions {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for FileOptions {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileOptions {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Decode file contents, requiring a mapping at the top level.
pub(super) fn decode(path: &Path, format: Format, text: &str) -> Result<Value> {
    let value = format.parse(text).map_err(|message| Error::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    if !value.is_object() {
        return Err(Error::Parse {
            path: path.to_path_buf(),
            message: "top-level value must be a mapping".to_string(),
        });
    }
    Ok(value)
}

pub(super) fn encode(path: &Path, format: Format, value: &Value) -> Result<String> {
    format.stringify(value).map_err(|message| Error::Serialize {
        path: path.to_path_buf(),
        message,
    })
}

pub(super) fn read_file(path: &Path, format: Format) -> Result<Value> {
    if !path.exists() {
        debug!("Config file does not exist, using empty store: {}", path.display());
        return Ok(tree::empty());
    }
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(path, format, &text)
}

pub(super) async fn read_file_async(path: &Path, format: Format) -> Result<Value> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if !exists {
        debug!("Config file does not exist, using empty store: {}", path.display());
        return Ok(tree::empty());
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
    decode(path, format, &text)
}

pub(super) fn write_file(path: &Path, format: Format, value: &Value) -> Result<()> {
    let text = encode(path, format, value)?;
    std::fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(super) async fn write_file_async(path: &Path, format: Format, value: &Value) -> Result<()> {
    let text = encode(path, format, value)?;
    tokio::fs::write(path, text)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read several files and deep-merge them, later files taking precedence.
///
/// Each file's format follows its extension. Unlike a file store, a
/// missing file is an error.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Value> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let options = FileOptions::new(path.as_ref());
        let path = options.resolved_path();
        let text = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        documents.push(decode(&path, options.resolved_format(), &text)?);
    }
    Ok(merge::deep_merge_all(documents))
}

pub async fn load_files_async<P: AsRef<Path>>(paths: &[P]) -> Result<Value> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let options = FileOptions::new(path.as_ref());
        let path = options.resolved_path();
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
        documents.push(decode(&path, options.resolved_format(), &text)?);
    }
    Ok(merge::deep_merge_all(documents))
}

/// Store persisted to a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: Format,
    memory: Memory,
}

impl FileStore {
    pub fn new(options: FileOptions) -> Self {
        Self {
            path: options.resolved_path(),
            format: options.resolved_format(),
            memory: Memory::new().with_read_only(options.read_only),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

#[async_trait]
impl Store for FileStore {
    memory_backed!(memory);

    fn kind(&self) -> &str {
        "file"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PERSISTENT
    }

    fn load_sync(&mut self) -> Result<Value> {
        let data = read_file(&self.path, self.format)?;
        self.memory.replace(data.clone());
        Ok(data)
    }

    async fn load(&mut self) -> Result<Value> {
        let data = read_file_async(&self.path, self.format).await?;
        self.memory.replace(data.clone());
        Ok(data)
    }

    fn save_sync(&mut self) -> Result<Value> {
        write_file(&self.path, self.format, self.memory.data())?;
        Ok(self.memory.data().clone())
    }

    async fn save(&mut self) -> Result<Value> {
        write_file_async(&self.path, self.format, self.memory.data()).await?;
        Ok(self.memory.data().clone())
    }
}
