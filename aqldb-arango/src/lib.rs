//! ArangoDB storage driver for aqldb.
//!
//! This crate implements the `StoreBackend` trait against the ArangoDB HTTP
//! API: AQL cursors (with batch continuation), document writes with
//! `returnNew`, and collection, index, view, analyzer, and database
//! management.
//!
//! # Quick Start
//!
//! ```ignore
//! use aqldb_arango::ArangoStore;
//! use aqldb_core::{backend::StoreBackendBuilder, store::AqlStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = ArangoStore::builder("http://localhost:8529", "app")
//!         .auth("root", "secret")
//!         .build()
//!         .await?;
//!     let store = AqlStore::new(backend);
//!
//!     let users = store.collection("users");
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as aqldb_arango;

pub mod store;

pub use store::{ArangoStore, ArangoStoreBuilder};
