//! Per-collection record repository.
//!
//! A [`Collection`] handle composes the filter compiler, pagination/sort
//! composer, and query executor into the CRUD surface request handlers call.
//! Every document written through it carries `created` (set once, at insert)
//! and `updated` (set on every write) timestamps.
//!
//! # Upsert branching
//!
//! [`Collection::add`] and [`Collection::replace`] branch on the presence of
//! the store-assigned `_id` field: with it, the write is an update (merge or
//! full replace respectively); without it, an insert. Two concurrent `add`
//! calls racing on that branch can both insert; de-duplication is a caller
//! responsibility.

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;

use crate::{
    backend::StoreBackend,
    descriptor::TypeDescriptor,
    error::StoreResult,
    filter::{FilterSpec, prepare_filters},
    query::QueryOptions,
    store::AqlStore,
};

/// A repository handle over one collection.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    store: &'a AqlStore<B>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, store: &'a AqlStore<B>) -> Self {
        Self { name, store }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds or merge-updates a document.
    ///
    /// With a persisted `_id`, only the supplied fields are written and the
    /// rest of the stored document is preserved; `updated` is stamped.
    /// Without one, the document is inserted with both `created` and
    /// `updated`. Returns the post-write document, projected through
    /// `descriptor` if given, or `None` when the write did not happen.
    pub async fn add(
        &self,
        document: Value,
        descriptor: Option<&TypeDescriptor>,
    ) -> Option<Value> {
        self.write(document, descriptor, false).await
    }

    /// Adds or fully replaces a document.
    ///
    /// Same branching as [`Collection::add`], but the update path discards
    /// stored fields absent from the argument: the document becomes exactly
    /// the argument plus timestamps.
    pub async fn replace(
        &self,
        document: Value,
        descriptor: Option<&TypeDescriptor>,
    ) -> Option<Value> {
        self.write(document, descriptor, true).await
    }

    async fn write(
        &self,
        mut document: Value,
        descriptor: Option<&TypeDescriptor>,
        full_replace: bool,
    ) -> Option<Value> {
        let now = Utc::now().to_rfc3339();

        let id = {
            let obj = match document.as_object_mut() {
                Some(obj) => obj,
                None => {
                    tracing::error!(collection = %self.name, "record is not an object");
                    return None;
                }
            };

            obj.insert("updated".to_string(), Value::String(now.clone()));
            let id = obj
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string);
            if id.is_none() {
                obj.insert("created".to_string(), Value::String(now));
            }
            id
        };

        let backend = self.store.backend();
        let result = match (&id, full_replace) {
            (Some(id), false) => backend.update_document(&self.name, id, document).await,
            (Some(id), true) => backend.replace_document(&self.name, id, document).await,
            (None, _) => backend.save_document(&self.name, document).await,
        };

        match result {
            Ok(mut written) => {
                if let Some(descriptor) = descriptor {
                    descriptor.project(&mut written);
                }
                Some(written)
            }
            Err(error) => {
                tracing::error!(%error, collection = %self.name, "record write failed");
                None
            }
        }
    }

    /// Batch-inserts documents, stamping `updated` (and `created` when
    /// missing) on every element first. A batch failure fails the whole
    /// call; there is no partial-failure recovery.
    pub async fn add_all(&self, mut documents: Vec<Value>) -> StoreResult<Vec<Value>> {
        for document in &mut documents {
            let now = Utc::now().to_rfc3339();
            if let Some(obj) = document.as_object_mut() {
                if !obj.contains_key("created") {
                    obj.insert("created".to_string(), Value::String(now.clone()));
                }
                obj.insert("updated".to_string(), Value::String(now));
            }
        }

        self.store
            .backend()
            .save_documents(&self.name, documents)
            .await
    }

    /// Returns every document matching the filter.
    pub async fn find_all(
        &self,
        filter: &FilterSpec,
        options: Option<&QueryOptions>,
        descriptor: Option<&TypeDescriptor>,
    ) -> Vec<Value> {
        let compiled = prepare_filters("o", filter, None);
        let options = options.cloned().unwrap_or_default();
        let sort = options.sort_clause("o");
        let limit = options.limit_clause();
        let (filters, params) = compiled.into_parts();

        let query = format!(
            "\n  FOR o IN {}\n  {sort} {filters} {limit} \n  RETURN o",
            self.name
        );

        let count_only = QueryOptions::new().count(options.count);
        self.store
            .query_all(&query, params, descriptor, Some(&count_only))
            .await
    }

    /// Returns the first document matching the filter, or `None`.
    ///
    /// A filter that compiles to no predicate at all is treated as a
    /// programmer error: it is logged and answered with `None` without
    /// issuing a full-collection scan.
    pub async fn find_one(
        &self,
        filter: &FilterSpec,
        descriptor: Option<&TypeDescriptor>,
    ) -> Option<Value> {
        let compiled = prepare_filters("o", filter, None);

        if !compiled.has_predicates() {
            tracing::warn!(collection = %self.name, "find_one called with an empty filter");
            return None;
        }

        let (filters, params) = compiled.into_parts();
        let query = format!("FOR o IN {} {filters} RETURN o", self.name);

        self.store.query_one(&query, params, descriptor).await
    }

    /// Removes the first document matching the filter, if any.
    pub async fn del_one(&self, filter: &FilterSpec) {
        let Some(found) = self.find_one(filter, None).await else {
            return;
        };
        let Some(id) = found.get("_id").and_then(Value::as_str) else {
            return;
        };

        if let Err(error) = self.store.backend().remove_document(&self.name, id).await {
            tracing::error!(%error, collection = %self.name, "record removal failed");
        }
    }

    /// Removes every document matching the filter, returning the logical
    /// `id`s of the removed documents.
    ///
    /// Deletion is per-document and not transactional: a crash mid-batch
    /// leaves a partially deleted set.
    pub async fn del_all(&self, filter: &FilterSpec) -> Vec<String> {
        let found = self.find_all(filter, None, None).await;
        if found.is_empty() {
            return Vec::new();
        }

        let ids = found
            .iter()
            .filter_map(|doc| doc.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect::<Vec<_>>();

        let backend = self.store.backend();
        let removals = found.iter().filter_map(|doc| {
            let id = doc.get("_id").and_then(Value::as_str)?;
            Some(backend.remove_document(&self.name, id))
        });

        for result in join_all(removals).await {
            if let Err(error) = result {
                tracing::error!(%error, collection = %self.name, "record removal failed");
            }
        }

        ids
    }

    /// Counts the documents matching the filter, ignoring any `skip`/`rows`
    /// pagination the filter also carries.
    pub async fn count(&self, filter: &FilterSpec) -> u64 {
        let compiled = prepare_filters("o", filter, None);
        let (filters, params) = compiled.into_parts();

        let query = format!("\n  FOR o IN  {}\n  {filters}\n  RETURN o", self.name);
        self.store.query_count(&query, params).await
    }
}
