//! Query text compilation.
//!
//! The builder only accumulates a [`QuerySpec`]; turning it into query text is
//! the Grammar's job. Placeholders rendered here must use the binding keys
//! recorded on the spec, passed through [`placeholder::parameter_key`], so
//! that they line up with the parameters the builder hands to the
//! connection.

use serde_json::{Map, Value};

use crate::{
    connection::Parameters,
    query_builder::{placeholder, Assignment, CreateWith, LabelOperation, QuerySpec},
};

mod cypher;

pub use cypher::{CypherGrammar, DEFAULT_DATE_FORMAT, UPDATE_POSTFIX};

pub trait Grammar: Send + Sync {
    fn compile_select(&self, spec: &QuerySpec) -> String;

    /// One row renders inline properties; several rows render an `UNWIND`
    /// over the batch parameter.
    fn compile_insert(&self, spec: &QuerySpec, rows: &[Map<String, Value>]) -> String;

    fn compile_update(&self, spec: &QuerySpec, assignments: &[Assignment]) -> String;

    fn compile_delete(&self, spec: &QuerySpec) -> String;

    fn compile_create_with(&self, spec: &QuerySpec, payload: &CreateWith) -> String;

    fn compile_update_labels(
        &self,
        spec: &QuerySpec,
        labels: &[String],
        operation: LabelOperation,
    ) -> String;

    /// Statements removing everything under the target labels, run in order.
    fn compile_truncate(&self, spec: &QuerySpec) -> Vec<(String, Parameters)>;

    /// Projection item for a sub-query under `alias`.
    fn compile_sub_select(&self, cypher: &str, alias: &str) -> String;

    /// Quotes an identifier when it needs quoting.
    fn wrap(&self, value: &str) -> String;

    /// Pattern variable for a label set.
    fn node_reference_for(&self, labels: &[String]) -> String {
        placeholder::node_reference(labels)
    }

    /// Renames value keys to the placeholders used by `compile_update` (when
    /// `is_update`) or leaves them as they are.
    fn postfix_values(&self, values: &Map<String, Value>, is_update: bool) -> Map<String, Value>;

    /// `chrono` format string for date/time values.
    fn date_format(&self) -> &str;
}
