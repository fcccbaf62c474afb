//! Storage driver abstraction.
//!
//! [`StoreBackend`] is the only boundary this layer consumes from the
//! backing store: AQL execution plus document, collection, index, view,
//! analyzer, and database management. Transport and authentication live
//! entirely inside the driver implementation.
//!
//! The trait is object safe, so `Box<dyn StoreBackend>` works directly when
//! runtime backend selection is needed.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::{error::StoreResult, provision::IndexSpec};

/// Abstract interface for document store drivers.
///
/// Implementations must be thread-safe: the store issues concurrent in-flight
/// calls against one driver handle (provisioning fans index creation out in
/// parallel, batch deletes remove documents concurrently).
///
/// # Error handling
///
/// Drivers report failures through [`StoreError`](crate::error::StoreError);
/// the layers above decide which of them degrade to empty results and which
/// propagate.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Executes an AQL query with bound parameters, returning the full
    /// result set.
    async fn execute(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<Vec<Value>>;

    /// Saves a new document, returning the stored document including its
    /// store-assigned identifiers.
    async fn save_document(&self, collection: &str, document: Value) -> StoreResult<Value>;

    /// Merge-updates the document with the given persisted identifier: only
    /// the supplied fields are written, others are preserved. Returns the
    /// post-write document.
    async fn update_document(&self, collection: &str, id: &str, patch: Value) -> StoreResult<Value>;

    /// Fully replaces the document with the given persisted identifier;
    /// fields absent from `document` are discarded. Returns the post-write
    /// document.
    async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> StoreResult<Value>;

    /// Removes a document by its persisted identifier.
    async fn remove_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Saves a batch of documents in one call. No partial-failure recovery:
    /// a batch failure fails the whole call.
    async fn save_documents(&self, collection: &str, documents: Vec<Value>)
    -> StoreResult<Vec<Value>>;

    /// Creates a collection; fails if it already exists.
    async fn create_collection(&self, name: &str) -> StoreResult<()>;

    /// Drops a collection and everything in it.
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> StoreResult<bool>;

    /// Ensures a secondary index exists. Ensuring the same named index twice
    /// must not create a duplicate and must not fail.
    async fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()>;

    /// Creates a search view with the given properties; fails if a view of
    /// that name already exists.
    async fn create_view(&self, name: &str, properties: Value) -> StoreResult<()>;

    /// Lists the names of all search views.
    async fn list_views(&self) -> StoreResult<Vec<String>>;

    /// Ensures a text analyzer exists with the given properties.
    async fn ensure_analyzer(&self, name: &str, properties: Value) -> StoreResult<()>;

    /// Creates a database; fails if it already exists.
    async fn create_database(&self, name: &str) -> StoreResult<()>;

    /// Drops a database.
    async fn drop_database(&self, name: &str) -> StoreResult<()>;

    /// Lists all database names reachable through this connection.
    async fn list_databases(&self) -> StoreResult<Vec<String>>;
}

/// Factory trait for constructing driver instances.
#[async_trait]
pub trait StoreBackendBuilder {
    /// The driver type this builder produces.
    type Backend: StoreBackend;

    /// Builds and validates the driver.
    async fn build(self) -> StoreResult<Self::Backend>;
}
