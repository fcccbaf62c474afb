//! Main aqldb crate providing a unified interface for AQL document storage.
//!
//! This crate is the primary entry point for users of the aqldb layer. It
//! re-exports the core modules and provides convenient access to the storage
//! drivers.
//!
//! # Features
//!
//! - **Declarative filtering** - Filter specs compiled to parameterized AQL
//!   predicates, including membership, null, array-contains, and fulltext
//!   comparison modes
//! - **Record repositories** - Upsert/find/delete on logical-id addressed
//!   JSON documents, with `created`/`updated` stamping
//! - **Idempotent provisioning** - Collections, indexes, search views, and
//!   analyzers declared once, ensured on every start
//! - **Joins** - Multi-collection aliased scans chained by join predicates
//! - **Multiple drivers** - An in-memory driver for tests and development,
//!   ArangoDB over HTTP for production (behind the `arango` feature)
//!
//! # Quick Start
//!
//! ```ignore
//! use aqldb::{prelude::*, memory::MemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = AqlStore::new(MemoryStore::new());
//!     let users = store.collection("users");
//!
//!     users.add(json!({ "id": "u1", "name": "Mario" }), None).await;
//!
//!     let admins = users
//!         .find_all(
//!             &FilterSpec::new().field("role", "admin"),
//!             Some(&QueryOptions::new().sort("created", true).rows(25)),
//!             None,
//!         )
//!         .await;
//!     println!("admins: {admins:?}");
//! }
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-memory driver for development and testing
//! - [`arango`] - ArangoDB HTTP driver (requires the `arango` feature)

pub mod prelude;

pub use aqldb_core::{backend, collection, count, descriptor, error, filter, join, provision, query, store};

// Re-export serde_json for convenience: the whole surface speaks `Value`.
pub use serde_json;

/// In-memory storage driver.
pub mod memory {
    pub use aqldb_memory::{MemoryStore, MemoryStoreBuilder};
}

/// ArangoDB storage driver.
///
/// This module is only available when the `arango` feature is enabled.
#[cfg(feature = "arango")]
pub mod arango {
    pub use aqldb_arango::{ArangoStore, ArangoStoreBuilder};
}
