//! Execution boundary.
//!
//! The builder never talks to a store directly. Compiled query text and the
//! flattened, sanitised parameter map are handed to a [`Connection`], which is
//! responsible for transport, retries and result decoding. Rows come back as
//! ordered JSON maps so that "first column of the first row" stays meaningful
//! for aggregate extraction.

use serde_json::{Map, Value};
use thiserror::Error;

/// One result record, keyed by the names in the `RETURN` clause.
pub type Row = Map<String, Value>;

/// Parameter map passed alongside query text.
pub type Parameters = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectionError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Unexpected result shape: {0}")]
    UnexpectedResult(String),
}

/// Synchronous request/response access to a graph store.
///
/// Implementations must be shareable between a builder and the nested
/// builders it spawns, hence `Send + Sync`; interior mutability is the
/// implementor's concern.
pub trait Connection: Send + Sync {
    fn select(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;

    /// Runs a create statement and returns the rows it produced (usually the
    /// created nodes or their identities).
    fn insert(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;

    /// Returns the number of affected nodes.
    fn update(&self, query: &str, parameters: &Parameters) -> Result<u64, ConnectionError>;

    /// Returns the number of deleted nodes.
    fn delete(&self, query: &str, parameters: &Parameters) -> Result<u64, ConnectionError>;

    fn statement(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;
}
