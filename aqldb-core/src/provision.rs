//! Idempotent collection, index, and search-view provisioning.
//!
//! Provisioning never throws for index or view creation problems: individual
//! failures are logged and skipped so one bad spec cannot abort the rest. It
//! only fails hard when the collection can neither be created nor found.
//!
//! Every collection managed through this layer gets baseline non-unique
//! indexes on `created` and `updated`, so chronological queries are always
//! supported. Fulltext index specs are not materialized as indexes; they are
//! gathered into an ArangoSearch view named `v_{collection}`.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    backend::StoreBackend, collection::Collection, error::StoreResult, store::AqlStore,
};

/// The kind of secondary index to ensure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hash,
    Persistent,
    Skiplist,
    Ttl,
    Geo,
    Fulltext,
}

impl IndexKind {
    /// The wire-level type tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hash => "hash",
            IndexKind::Persistent => "persistent",
            IndexKind::Skiplist => "skiplist",
            IndexKind::Ttl => "ttl",
            IndexKind::Geo => "geo",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

/// Declaration of one secondary index.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Index kind.
    pub kind: IndexKind,
    /// Ordered field paths the index covers.
    pub fields: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether documents missing the fields are excluded.
    pub sparse: bool,
    /// Index name; derived deterministically at provisioning time when
    /// absent.
    pub name: Option<String>,
}

impl IndexSpec {
    /// A new index spec over the given fields.
    pub fn new(kind: IndexKind, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        IndexSpec {
            kind,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
            sparse: false,
            name: None,
        }
    }

    /// A persistent index over the given fields.
    pub fn persistent(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        IndexSpec::new(IndexKind::Persistent, fields)
    }

    /// A fulltext spec over one field (provisioned as a search view).
    pub fn fulltext(field: impl Into<String>) -> Self {
        IndexSpec::new(IndexKind::Fulltext, [field.into()])
    }

    /// Makes the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes the index sparse.
    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// The wire-level creation body.
    pub fn as_body(&self) -> Value {
        json!({
            "type": self.kind.as_str(),
            "fields": self.fields,
            "unique": self.unique,
            "sparse": self.sparse,
            "name": self.name,
        })
    }
}

/// Options for collection provisioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Drop any existing collection of that name first (best effort).
    pub drop: bool,
}

/// Database selection consumed once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base database name; `TEST_DB=1` appends `_TEST` to it.
    pub name: String,
}

/// Derives the deterministic index name for a collection and field set.
///
/// Array-expansion markers (`[*]`) are stripped so expanded and plain paths
/// over the same field collide on purpose.
pub fn index_name(collection: &str, fields: &[String]) -> String {
    let fields = fields.join("_").replace("[*]", "");
    format!("idx_{collection}_{fields}")
}

/// The joined field key used for search-view links.
fn view_field_key(fields: &[String]) -> String {
    fields.join("_").replace("[*]", "")
}

/// Fixed consolidation/commit tuning for provisioned search views.
fn search_view_properties(collection: &str, fulltext_fields: &[String]) -> Value {
    let mut links = Map::new();
    let mut fields = Map::new();

    for field in fulltext_fields {
        fields.insert(
            field.clone(),
            json!({
                "analyzers": ["norm_it", "identity"],
                "includeAllFields": false,
                "storeValues": "none",
                "trackListPositions": false,
            }),
        );
    }
    links.insert(
        collection.to_string(),
        json!({ "analyzers": ["identity"], "fields": fields }),
    );

    json!({
        "writebufferIdle": 64,
        "writebufferSizeMax": 33554432,
        "consolidationPolicy": {
            "type": "tier",
            "segmentsBytesFloor": 2097152,
            "segmentsBytesMax": 5368709120u64,
            "segmentsMax": 10,
            "segmentsMin": 1,
            "minScore": 0,
        },
        "writebufferActive": 0,
        "consolidationIntervalMsec": 1000,
        "cleanupIntervalStep": 2,
        "commitIntervalMsec": 1000,
        "primarySortCompression": "lz4",
        "links": links,
    })
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value == "1")
}

impl<B: StoreBackend> AqlStore<B> {
    /// Creates a collection with its declared indexes, idempotently, and
    /// returns its repository handle.
    ///
    /// Collection creation falls back to fetching the existing collection;
    /// only the failure of both is fatal. Index creation runs concurrently
    /// and individual failures are logged and skipped, never rolled back.
    pub async fn provision_collection(
        &self,
        name: &str,
        indexes: &[IndexSpec],
        options: CreateOptions,
    ) -> StoreResult<Collection<'_, B>> {
        let backend = self.backend();

        if options.drop {
            if let Err(error) = backend.drop_collection(name).await {
                tracing::debug!(%error, collection = name, "drop before create failed");
            }
        }

        if let Err(create_error) = backend.create_collection(name).await {
            match backend.collection_exists(name).await {
                Ok(true) => {}
                _ => return Err(create_error),
            }
        }

        for baseline in [
            IndexSpec::persistent(["created"]),
            IndexSpec::persistent(["updated"]),
        ] {
            if let Err(error) = backend.ensure_index(name, &baseline).await {
                tracing::error!(%error, collection = name, "baseline index creation failed");
            }
        }

        let ensures = indexes
            .iter()
            .filter(|spec| spec.kind != IndexKind::Fulltext)
            .map(|spec| {
                let mut spec = spec.clone();
                spec.name = Some(index_name(name, &spec.fields));
                async move {
                    if let Err(error) = backend.ensure_index(name, &spec).await {
                        tracing::error!(%error, index = spec.name.as_deref().unwrap_or(""), "index creation failed");
                    }
                }
            });
        join_all(ensures).await;

        let fulltext_fields = indexes
            .iter()
            .filter(|spec| spec.kind == IndexKind::Fulltext)
            .map(|spec| view_field_key(&spec.fields))
            .collect::<Vec<_>>();

        if !fulltext_fields.is_empty() {
            let view_name = format!("v_{name}");
            let views = backend.list_views().await.unwrap_or_default();

            if !views.contains(&view_name) {
                let properties = search_view_properties(name, &fulltext_fields);
                if let Err(error) = backend.create_view(&view_name, properties).await {
                    tracing::error!(%error, view = %view_name, "view creation failed");
                }
            }
        }

        Ok(self.collection(name))
    }

    /// Removes every document from a collection without dropping it.
    pub async fn truncate_collection(&self, name: &str) -> StoreResult<()> {
        let query = format!("FOR el IN {name} REMOVE el IN {name}");
        self.backend().execute(&query, Map::new()).await?;
        Ok(())
    }

    /// Resolves and prepares the database this process should run against.
    ///
    /// `TEST_DB=1` selects the `_TEST` variant of the configured name;
    /// `EMPTY_DB=1` drops it first (loudly). The database is created when
    /// missing and the default text analyzers are ensured. Returns the
    /// effective database name.
    pub async fn init_database(&self, config: &DatabaseConfig) -> StoreResult<String> {
        let backend = self.backend();
        let mut name = config.name.clone();

        if env_flag("TEST_DB") {
            name.push_str("_TEST");
        }

        if env_flag("EMPTY_DB") {
            tracing::warn!(database = %name, "EMPTY_DB set, dropping database");
            if let Err(error) = backend.drop_database(&name).await {
                tracing::debug!(%error, database = %name, "database drop failed");
            }
        }

        let existing = backend.list_databases().await?;
        if !existing.contains(&name) {
            backend.create_database(&name).await?;
        }

        for (analyzer, locale) in [("norm_it", "it.utf-8"), ("norm_en", "en.utf-8")] {
            let properties = json!({
                "type": "norm",
                "properties": { "locale": locale, "accent": false, "case": "lower" },
            });
            if let Err(error) = backend.ensure_analyzer(analyzer, properties).await {
                tracing::warn!(%error, analyzer, "analyzer creation failed");
            }
        }

        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_are_deterministic() {
        let fields = vec!["email".to_string()];
        assert_eq!(index_name("users", &fields), "idx_users_email");

        let multi = vec!["a".to_string(), "b".to_string()];
        assert_eq!(index_name("users", &multi), "idx_users_a_b");
    }

    #[test]
    fn array_expansion_markers_are_stripped() {
        let fields = vec!["tags[*]".to_string()];
        assert_eq!(index_name("posts", &fields), "idx_posts_tags");
    }

    #[test]
    fn view_properties_link_every_fulltext_field() {
        let fields = vec!["title".to_string(), "body".to_string()];
        let properties = search_view_properties("posts", &fields);

        let link_fields = &properties["links"]["posts"]["fields"];
        assert!(link_fields.get("title").is_some());
        assert!(link_fields.get("body").is_some());
        assert_eq!(properties["consolidationIntervalMsec"], 1000);
        assert_eq!(properties["primarySortCompression"], "lz4");
    }

    #[test]
    fn index_body_carries_the_wire_fields() {
        let spec = IndexSpec::persistent(["email"]).unique();
        let body = spec.as_body();

        assert_eq!(body["type"], "persistent");
        assert_eq!(body["unique"], true);
        assert_eq!(body["sparse"], false);
        assert_eq!(body["fields"][0], "email");
    }
}
