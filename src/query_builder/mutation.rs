//! Create, update and delete statements.
//!
//! Mutations reuse the predicate and match state of the builder: an update
//! or delete touches exactly the nodes a `get` would return.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    operand::{Expression, Labels, Operand},
    placeholder,
    relations::Direction,
    to_parameters, Builder, Result,
};
use crate::connection::{ConnectionError, Parameters, Row};

/// Parameter holding the row list of a multi-row insert.
pub const BATCH_PARAMETER: &str = "rows";

/// One `SET` item of an update.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Operand,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum LabelOperation {
    Add,
    Remove,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct NodePayload {
    pub labels: Labels,
    pub attributes: Map<String, Value>,
}

/// Nodes created or attached along one relationship of a create-with.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RelatedPayload {
    /// Variable prefix for this relation's nodes and parameters.
    pub relation: String,
    pub relationship: String,
    pub direction: Direction,
    pub labels: Labels,
    /// Attributes of nodes to create.
    pub create: Vec<Map<String, Value>>,
    /// Identities of existing nodes to link.
    pub attach: Vec<i64>,
}

impl RelatedPayload {
    pub fn new(relation: &str, relationship: &str, labels: impl Into<Labels>) -> Self {
        RelatedPayload {
            relation: relation.to_string(),
            relationship: relationship.to_string(),
            direction: Direction::Out,
            labels: labels.into(),
            create: Vec::new(),
            attach: Vec::new(),
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn create(mut self, attributes: Map<String, Value>) -> Self {
        self.create.push(attributes);
        self
    }

    pub fn attach(mut self, ids: &[i64]) -> Self {
        self.attach.extend_from_slice(ids);
        self
    }
}

/// A node plus its related nodes, created in a single statement.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct CreateWith {
    pub node: NodePayload,
    pub related: Vec<RelatedPayload>,
}

impl CreateWith {
    pub fn new(labels: impl Into<Labels>, attributes: Map<String, Value>) -> Self {
        CreateWith {
            node: NodePayload {
                labels: labels.into(),
                attributes,
            },
            related: Vec::new(),
        }
    }

    pub fn with(mut self, related: RelatedPayload) -> Self {
        self.related.push(related);
        self
    }
}

impl Builder {
    /// Creates one node per row. An empty input does nothing.
    pub fn insert(&self, rows: Vec<Map<String, Value>>) -> Result<bool> {
        if rows.is_empty() {
            return Ok(true);
        }
        let cypher = self.grammar.compile_insert(&self.spec, &rows);
        let parameters = insert_parameters(rows);
        log::debug!("insert: {} ({} parameter(s))", cypher, parameters.len());
        self.connection.insert(&cypher, &parameters)?;
        Ok(true)
    }

    /// Creates a node and returns its graph identity.
    pub fn insert_get_id(&self, values: Map<String, Value>) -> Result<i64> {
        let rows = vec![values];
        let cypher = self.grammar.compile_insert(&self.spec, &rows);
        let parameters = insert_parameters(rows);
        log::debug!("insert: {} ({} parameter(s))", cypher, parameters.len());
        let created = self.connection.insert(&cypher, &parameters)?;
        created
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ConnectionError::UnexpectedResult("insert returned no node identity".to_string())
                    .into()
            })
    }

    /// Sets `values` on every matching node; returns the number of nodes
    /// touched.
    pub fn update(&self, values: Map<String, Value>) -> Result<u64> {
        let assignments = values
            .iter()
            .map(|(column, value)| Assignment {
                column: column.clone(),
                value: Operand::Value(value.clone()),
            })
            .collect::<Vec<_>>();
        self.run_update(&assignments, &values)
    }

    pub fn increment(
        &self,
        column: &str,
        amount: impl Into<Value>,
        extra: Map<String, Value>,
    ) -> Result<u64> {
        self.adjust(column, "+", amount.into(), extra)
    }

    pub fn decrement(
        &self,
        column: &str,
        amount: impl Into<Value>,
        extra: Map<String, Value>,
    ) -> Result<u64> {
        self.adjust(column, "-", amount.into(), extra)
    }

    fn adjust(&self, column: &str, sign: &str, amount: Value, extra: Map<String, Value>) -> Result<u64> {
        let node = self.node_reference();
        let property = format!("{}.{}", node, self.grammar.wrap(column));
        let mut assignments = vec![Assignment {
            column: column.to_string(),
            value: Operand::Expression(Expression(format!("{} {} {}", property, sign, amount))),
        }];
        assignments.extend(extra.iter().map(|(column, value)| Assignment {
            column: column.clone(),
            value: Operand::Value(value.clone()),
        }));
        self.run_update(&assignments, &extra)
    }

    fn run_update(&self, assignments: &[Assignment], values: &Map<String, Value>) -> Result<u64> {
        let cypher = self.grammar.compile_update(&self.spec, assignments);
        let mut bindings = self.spec.bindings.flatten();
        bindings.extend(self.grammar.postfix_values(values, true));
        let parameters = to_parameters(bindings);
        log::debug!("update: {} ({} parameter(s))", cypher, parameters.len());
        Ok(self.connection.update(&cypher, &parameters)?)
    }

    /// Detaches and deletes every matching node.
    pub fn delete(&self) -> Result<u64> {
        let cypher = self.grammar.compile_delete(&self.spec);
        let parameters = self.parameters();
        log::debug!("delete: {} ({} parameter(s))", cypher, parameters.len());
        Ok(self.connection.delete(&cypher, &parameters)?)
    }

    pub fn delete_by_id(self, id: i64) -> Result<u64> {
        self.where_eq("id", id)?.delete()
    }

    /// Removes every node carrying the target labels.
    pub fn truncate(&self) -> Result<()> {
        for (cypher, parameters) in self.grammar.compile_truncate(&self.spec) {
            log::debug!("truncate: {}", cypher);
            self.connection.statement(&cypher, &parameters)?;
        }
        Ok(())
    }

    /// Creates a node together with related nodes and links to existing
    /// ones, in one statement.
    pub fn create_with(&self, payload: CreateWith) -> Result<Vec<Row>> {
        let cypher = self.grammar.compile_create_with(&self.spec, &payload);
        let node = self
            .grammar
            .node_reference_for(payload.node.labels.as_slice());
        let parameters = create_with_parameters(&node, payload);
        log::debug!("create with: {} ({} parameter(s))", cypher, parameters.len());
        Ok(self.connection.insert(&cypher, &parameters)?)
    }

    /// Adds or removes labels on every matching node.
    pub fn update_labels(&self, labels: impl Into<Labels>, operation: LabelOperation) -> Result<Vec<Row>> {
        let labels = labels.into();
        let cypher = self
            .grammar
            .compile_update_labels(&self.spec, labels.as_slice(), operation);
        let parameters = self.parameters();
        log::debug!("update labels: {} ({} parameter(s))", cypher, parameters.len());
        Ok(self.connection.statement(&cypher, &parameters)?)
    }
}

/// A single row binds its keys directly; several rows bind one list.
fn insert_parameters(mut rows: Vec<Map<String, Value>>) -> Parameters {
    if rows.len() == 1 {
        return to_parameters(rows.remove(0));
    }
    let mut parameters = Parameters::new();
    parameters.insert(
        BATCH_PARAMETER.to_string(),
        Value::Array(rows.into_iter().map(Value::Object).collect()),
    );
    parameters
}

fn create_with_parameters(node: &str, payload: CreateWith) -> Parameters {
    let mut bindings = Map::new();
    for (attribute, value) in payload.node.attributes {
        bindings.insert(placeholder::create_attribute_key(node, &attribute), value);
    }
    for related in payload.related {
        for (index, attributes) in related.create.into_iter().enumerate() {
            for (attribute, value) in attributes {
                bindings.insert(
                    placeholder::related_attribute_key(&related.relation, index, &attribute),
                    value,
                );
            }
        }
        if !related.attach.is_empty() {
            bindings.insert(
                placeholder::attach_key(&related.relation),
                Value::from(related.attach),
            );
        }
    }
    to_parameters(bindings)
}
