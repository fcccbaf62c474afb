//! Error and result types for store operations.
//!
//! Use [`StoreResult<T>`] as the return type for fallible operations. Note
//! that most read paths in this layer deliberately degrade errors to empty
//! results instead of propagating them; see the executor and collection
//! modules for the exact semantics.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when converting documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during driver initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document is not an object or is otherwise unusable.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A composed query could not be executed by the driver.
    #[error("Query error: {0}")]
    Query(String),
    /// An error reported by the underlying storage driver.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
