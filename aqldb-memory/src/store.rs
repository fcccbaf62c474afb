//! In-memory storage driver.
//!
//! Documents live as JSON values in per-collection vectors behind one
//! async-aware read-write lock, in insertion order. Queries run through the
//! interpreter in [`crate::aql`], which covers exactly the query shapes the
//! access layer composes, so the full store surface works without a server.
//!
//! Index, view, analyzer, and database management is bookkeeping only: the
//! store records what was provisioned (and enforces the same idempotency and
//! duplicate rules as a real server) but queries never consult it.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use aqldb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    provision::IndexSpec,
};

use crate::aql;

#[derive(Debug, Default)]
struct Inner {
    /// collection name -> documents, in insertion order.
    collections: HashMap<String, Vec<Value>>,
    /// collection name -> ensured index names.
    indexes: HashMap<String, Vec<String>>,
    /// view name -> properties.
    views: HashMap<String, Value>,
    /// analyzer name -> properties.
    analyzers: HashMap<String, Value>,
    databases: Vec<String>,
}

/// Thread-safe in-memory document store.
///
/// Cloneable; clones share the same underlying data. Intended for tests and
/// development: every query scans its collections, there is no persistence,
/// and fulltext search degrades to substring matching.
///
/// # Example
///
/// ```ignore
/// use aqldb_memory::MemoryStore;
/// use aqldb_core::store::AqlStore;
///
/// let store = AqlStore::new(MemoryStore::new());
/// let users = store.collection("users");
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Creates a builder for constructing a `MemoryStore`.
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// The names of the indexes ensured on a collection, in creation order.
    pub async fn index_names(&self, collection: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .indexes
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

/// Stamps a fresh document with its store identifiers and appends it.
fn insert_new(inner: &mut Inner, collection: &str, document: Value) -> StoreResult<Value> {
    let Value::Object(mut object) = document else {
        return Err(StoreError::InvalidDocument(
            "document must be a JSON object".to_string(),
        ));
    };

    let key = Uuid::new_v4().to_string();
    object.insert("_key".to_string(), Value::String(key.clone()));
    object.insert(
        "_id".to_string(),
        Value::String(format!("{collection}/{key}")),
    );

    let stored = Value::Object(object);
    inner
        .collections
        .entry(collection.to_string())
        .or_default()
        .push(stored.clone());
    Ok(stored)
}

fn position_by_id(documents: &[Value], id: &str) -> Option<usize> {
    documents
        .iter()
        .position(|doc| doc.get("_id").and_then(Value::as_str) == Some(id))
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn execute(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<Vec<Value>> {
        let program = aql::parse(query)?;

        if let Some(collection) = &program.remove {
            let mut inner = self.inner.write().await;
            if let Some(documents) = inner.collections.get_mut(collection) {
                documents.clear();
            }
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        aql::run(&program, &inner.collections, &bind_vars)
    }

    async fn save_document(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let mut inner = self.inner.write().await;
        insert_new(&mut inner, collection, document)
    }

    async fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Value> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidDocument(
                "patch must be a JSON object".to_string(),
            ));
        };

        let mut inner = self.inner.write().await;
        let documents = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let position = position_by_id(documents, id)
            .ok_or_else(|| StoreError::Backend(format!("document not found: {id}")))?;

        if let Value::Object(existing) = &mut documents[position] {
            for (key, value) in patch {
                existing.insert(key, value);
            }
        }
        Ok(documents[position].clone())
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> StoreResult<Value> {
        let Value::Object(mut object) = document else {
            return Err(StoreError::InvalidDocument(
                "document must be a JSON object".to_string(),
            ));
        };

        let mut inner = self.inner.write().await;
        let documents = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let position = position_by_id(documents, id)
            .ok_or_else(|| StoreError::Backend(format!("document not found: {id}")))?;

        // Store identifiers survive a replace.
        for key in ["_id", "_key"] {
            if let Some(value) = documents[position].get(key) {
                object.insert(key.to_string(), value.clone());
            }
        }
        documents[position] = Value::Object(object);
        Ok(documents[position].clone())
    }

    async fn remove_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let documents = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let position = position_by_id(documents, id)
            .ok_or_else(|| StoreError::Backend(format!("document not found: {id}")))?;

        documents.remove(position);
        Ok(())
    }

    async fn save_documents(
        &self,
        collection: &str,
        documents: Vec<Value>,
    ) -> StoreResult<Vec<Value>> {
        let mut inner = self.inner.write().await;
        documents
            .into_iter()
            .map(|document| insert_new(&mut inner, collection, document))
            .collect()
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.collections.contains_key(name) {
            return Err(StoreError::Backend(format!(
                "duplicate collection name: {name}"
            )));
        }
        inner.collections.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.collections.remove(name).is_none() {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        inner.indexes.remove(name);
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.inner.read().await.collections.contains_key(name))
    }

    async fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        let key = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", spec.kind.as_str(), spec.fields.join("_")));

        let mut inner = self.inner.write().await;
        let indexes = inner.indexes.entry(collection.to_string()).or_default();
        if !indexes.contains(&key) {
            indexes.push(key);
        }
        Ok(())
    }

    async fn create_view(&self, name: &str, properties: Value) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.views.contains_key(name) {
            return Err(StoreError::Backend(format!("duplicate view name: {name}")));
        }
        inner.views.insert(name.to_string(), properties);
        Ok(())
    }

    async fn list_views(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.read().await.views.keys().cloned().collect())
    }

    async fn ensure_analyzer(&self, name: &str, properties: Value) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .analyzers
            .insert(name.to_string(), properties);
        Ok(())
    }

    async fn create_database(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.databases.iter().any(|db| db == name) {
            return Err(StoreError::Backend(format!(
                "duplicate database name: {name}"
            )));
        }
        inner.databases.push(name.to_string());
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.databases.len();
        inner.databases.retain(|db| db != name);
        if inner.databases.len() == before {
            return Err(StoreError::Backend(format!("database not found: {name}")));
        }
        Ok(())
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        Ok(self.inner.read().await.databases.clone())
    }
}

/// Builder for constructing [`MemoryStore`] instances.
#[derive(Default)]
pub struct MemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for MemoryStoreBuilder {
    type Backend = MemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MemoryStore::new())
    }
}
