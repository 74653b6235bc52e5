//! Store backed by a namespace in an external key/value service.
//!
//! The service is reached only asynchronously through [`KeyValueBackend`],
//! so the store declares async-only capabilities: blocking load and save
//! are unsupported. `get_async` answers from the local tree first, so
//! unsaved writes shadow the backend, and reads through otherwise.

use super::{Capabilities, Memory, Store, memory_backed};
use crate::error::{Error, Result};
use crate::tree;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Access to a key/value service that stores one document per namespace.
#[async_trait]
pub trait KeyValueBackend: Send + Sync + std::fmt::Debug {
    /// Fetch the whole document for a namespace. Missing namespaces are empty.
    async fn fetch(&self, namespace: &str) -> Result<Value>;

    /// Fetch a single key.
    async fn fetch_key(&self, namespace: &str, path: &[String]) -> Result<Option<Value>> {
        let document = self.fetch(namespace).await?;
        Ok(tree::get_at(&document, path).cloned())
    }

    /// Replace the document for a namespace.
    async fn put(&self, namespace: &str, document: &Value) -> Result<()>;
}

/// In-process backend, useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a namespace.
    pub async fn insert(&self, namespace: impl Into<String>, document: Value) {
        self.documents.lock().await.insert(namespace.into(), document);
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn fetch(&self, namespace: &str) -> Result<Value> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(namespace)
            .cloned()
            .unwrap_or_else(tree::empty))
    }

    async fn put(&self, namespace: &str, document: &Value) -> Result<()> {
        if !document.is_object() {
            return Err(Error::Backend(format!(
                "document for namespace '{namespace}' must be a mapping"
            )));
        }
        self.documents
            .lock()
            .await
            .insert(namespace.to_string(), document.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoteStore {
    backend: Arc<dyn KeyValueBackend>,
    namespace: String,
    memory: Memory,
}

impl RemoteStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            memory: Memory::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl Store for RemoteStore {
    memory_backed!(memory);

    fn kind(&self) -> &str {
        "remote"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ASYNC_ONLY
    }

    async fn load(&mut self) -> Result<Value> {
        let document = self.backend.fetch(&self.namespace).await?;
        debug!("Fetched remote namespace '{}'", self.namespace);
        self.memory.replace(document);
        Ok(self.memory.data().clone())
    }

    async fn save(&mut self) -> Result<Value> {
        let data = self.memory.data().clone();
        self.backend.put(&self.namespace, &data).await?;
        debug!("Stored remote namespace '{}'", self.namespace);
        Ok(data)
    }

    async fn get_async(&self, path: &[String]) -> Result<Option<Value>> {
        if let Some(value) = self.memory.get(path) {
            return Ok(Some(value));
        }
        self.backend.fetch_key(&self.namespace, path).await
    }
}
