//! In-memory storage driver for aqldb.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait, including an interpreter for the query shapes the
//! access layer composes. It is ideal for tests and development: the full
//! store surface works without a database server, with fulltext search
//! degrading to substring matching.
//!
//! # Quick Start
//!
//! ```ignore
//! use aqldb_core::{filter::FilterSpec, query::QueryOptions, store::AqlStore};
//! use aqldb_memory::MemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = AqlStore::new(MemoryStore::new());
//!     let users = store.collection("users");
//!
//!     users.add(json!({ "id": "u1", "name": "Mario" }), None).await;
//!     let found = users
//!         .find_one(&FilterSpec::new().field("id", "u1"), None)
//!         .await;
//!     assert!(found.is_some());
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as aqldb_memory;

mod aql;
pub mod store;

pub use store::{MemoryStore, MemoryStoreBuilder};
