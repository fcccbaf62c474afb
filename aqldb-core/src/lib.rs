//! An AQL-speaking document database access layer.
//!
//! This crate is the core of the aqldb project and provides:
//!
//! - **Filter compilation** ([`filter`]) - Declarative filter specs compiled to AQL predicate text with bound parameters
//! - **Query composition** ([`query`]) - Sort and pagination clause builders
//! - **Store backend abstraction** ([`backend`]) - The driver trait the storage backends implement
//! - **Query execution** ([`store`]) - Parameterized query execution with paging, counting and projection
//! - **Record repository** ([`collection`]) - Upsert/find/delete on logical-id addressed documents
//! - **Schema provisioning** ([`provision`]) - Idempotent collection, index, view and analyzer setup
//! - **Join compilation** ([`join`]) - Multi-collection aliased scans chained by join predicates
//! - **Result shaping** ([`descriptor`]) - Field projection and private-field stripping
//! - **Error handling** ([`error`]) - Error and result types shared by every backend
//!
//! # Example
//!
//! ```ignore
//! use aqldb_core::{filter::FilterSpec, query::QueryOptions, store::AqlStore};
//!
//! let store = AqlStore::new(backend);
//! let users = store.collection("users");
//!
//! users.add(json!({ "id": "u1", "name": "Mario" }), None).await;
//! let admins = users
//!     .find_all(
//!         &FilterSpec::new().field("role", "admin"),
//!         Some(&QueryOptions::new().sort("created", true)),
//!         None,
//!     )
//!     .await;
//! ```

#[allow(unused_extern_crates)]
extern crate self as aqldb_core;

pub mod backend;
pub mod collection;
pub mod count;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod join;
pub mod provision;
pub mod query;
pub mod store;
