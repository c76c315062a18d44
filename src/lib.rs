//! neoquery - fluent Cypher query building for property-graph stores
//!
//! This crate turns relational-style query intent into Cypher:
//! - A consuming builder accumulating predicates, relationship matches,
//!   ordering, grouping, unions and pagination
//! - Categorised parameter bindings with collision-free placeholder keys
//! - Aggregates and pagination counts with scoped state restoration
//! - A pluggable Grammar (Cypher provided) and Connection

pub mod config;
pub mod connection;
pub mod grammar;
pub mod query_builder;

pub use config::{BuilderConfig, ConfigError};
pub use connection::{Connection, ConnectionError, Parameters, Row};
pub use grammar::{CypherGrammar, Grammar};
pub use query_builder::{Builder, QueryBuilderError, QuerySpec};
