//! Convenient re-exports of commonly used types from aqldb.
//!
//! Import this prelude module to quickly access the most frequently used
//! types without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use aqldb::prelude::*;
//! ```

pub use aqldb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    descriptor::{FieldDescriptor, FieldKind, TypeDescriptor},
    error::{StoreError, StoreResult},
    filter::{CompareMode, FilterSpec, FilterTerm, prepare_filters},
    join::{JoinStep, compile_join_query},
    provision::{CreateOptions, DatabaseConfig, IndexKind, IndexSpec, index_name},
    query::{QueryOptions, SortField},
    store::{AqlStore, StoreConfig},
};
