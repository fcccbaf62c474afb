//! The store handle and the query executor.
//!
//! [`AqlStore`] wraps a driver and exposes the raw query surface
//! (`query_all`/`query_one`/`query_count`) plus access to per-collection
//! repositories via [`AqlStore::collection`].
//!
//! # Failure semantics
//!
//! Reads fail soft: a driver-level execution error is logged and degrades to
//! an empty result set (or a zero count) instead of propagating. Callers that
//! need to distinguish "no rows" from "query failed" must go through the
//! driver directly.
//!
//! # Example
//!
//! ```ignore
//! use aqldb_core::{store::AqlStore, query::QueryOptions};
//!
//! let store = AqlStore::new(backend);
//! let rows = store
//!     .query_all("FOR o IN users RETURN o", Default::default(), None, None)
//!     .await;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    backend::StoreBackend,
    collection::Collection,
    count::{derive_count_query, has_limit_clause},
    descriptor::TypeDescriptor,
    query::QueryOptions,
};

/// Store-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// When true, every composed query is logged before execution.
    #[serde(default)]
    pub query_dump: bool,
}

/// A document store bound to a specific driver.
#[derive(Debug)]
pub struct AqlStore<B: StoreBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: StoreBackend> AqlStore<B> {
    /// Creates a store with default configuration.
    pub fn new(backend: B) -> Self {
        Self { backend, config: StoreConfig::default() }
    }

    /// Creates a store with explicit configuration.
    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Direct access to the underlying driver.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets the repository handle for a collection.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), self)
    }

    /// Executes a composed query and returns every matching document.
    ///
    /// When `options` carry pagination and the text does not already encode
    /// a limit, a `LIMIT skip, rows` clause is inserted immediately before
    /// the final `RETURN`. The `descriptor`, if given, projects every result
    /// document. When `options.count` is set, the total match count is
    /// computed through the count deriver and duplicated onto every row as
    /// `__count`, so pagers can read the total from any row.
    pub async fn query_all(
        &self,
        query: &str,
        params: Map<String, Value>,
        descriptor: Option<&TypeDescriptor>,
        options: Option<&QueryOptions>,
    ) -> Vec<Value> {
        let mut query = query.to_string();

        if let Some(options) = options {
            if options.has_paging() && !has_limit_clause(&query) {
                let skip = options.skip.unwrap_or(0);
                let rows = options.rows.unwrap_or(25);

                if let Some(i) = query.rfind("RETURN") {
                    query.insert_str(i, &format!("LIMIT {skip}, {rows}\n"));
                }
            }
        }

        if self.config.query_dump {
            let dump = Value::Object(params.clone());
            tracing::debug!(%query, params = %dump, "AQL query");
        }

        let mut rows = match self.backend.execute(&query, params.clone()).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::error!(%error, "query execution failed");
                return Vec::new();
            }
        };

        if let Some(descriptor) = descriptor {
            for row in &mut rows {
                descriptor.project(row);
            }
        }

        if options.is_some_and(|o| o.count) {
            let count = self.query_count(&query, params).await;
            for row in &mut rows {
                if let Some(obj) = row.as_object_mut() {
                    obj.insert("__count".to_string(), count.into());
                }
            }
        }

        rows
    }

    /// Executes a composed query and returns the first matching document.
    pub async fn query_one(
        &self,
        query: &str,
        params: Map<String, Value>,
        descriptor: Option<&TypeDescriptor>,
    ) -> Option<Value> {
        self.query_all(query, params, descriptor, None)
            .await
            .into_iter()
            .next()
    }

    /// Derives and executes the counting variant of a composed query.
    ///
    /// A count query over an empty candidate set yields no aggregation row;
    /// that is reported as zero. Driver errors degrade to zero as well.
    pub async fn query_count(&self, query: &str, params: Map<String, Value>) -> u64 {
        let count_query = derive_count_query(query);

        if self.config.query_dump {
            tracing::debug!(query = %count_query, "AQL count query");
        }

        match self.backend.execute(&count_query, params).await {
            Ok(rows) => rows
                .first()
                .and_then(Value::as_u64)
                .unwrap_or(0),
            Err(error) => {
                tracing::error!(%error, "count query failed");
                0
            }
        }
    }
}
