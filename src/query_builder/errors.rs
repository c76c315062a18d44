use thiserror::Error;

use crate::connection::ConnectionError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryBuilderError {
    #[error("Invalid predicate on '{column}': operator '{operator}' requires a value")]
    InvalidPredicate { column: String, operator: String },

    #[error("Invalid binding category: {0} (expected match, select, join, where, having, order or union)")]
    InvalidBindingCategory(String),

    #[error("Invalid sub-query source: {0} (expected a builder, a closure or a Cypher string)")]
    InvalidSubQuerySource(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Dynamic predicate '{method}' expects {expected} argument(s), {given} given")]
    DynamicArgumentCount {
        method: String,
        expected: usize,
        given: usize,
    },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl QueryBuilderError {
    pub fn invalid_predicate(column: impl Into<String>, operator: impl Into<String>) -> Self {
        QueryBuilderError::InvalidPredicate {
            column: column.into(),
            operator: operator.into(),
        }
    }
}
