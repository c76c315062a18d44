//! Relationship match clauses.
//!
//! Match descriptors are independent of the predicate list and compile into
//! their own `MATCH` / `OPTIONAL MATCH` clauses in insertion order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    bindings::BindingCategory,
    operand::{Boolean, Labels},
    placeholder, Builder,
};

/// Traversal direction, seen from the parent node.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum Direction {
    In,
    #[default]
    Out,
    InOut,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum MatchDescriptor {
    Relation {
        parent: String,
        parent_labels: Labels,
        related: String,
        related_labels: Labels,
        relationship: String,
        property: String,
        /// Key under which the property value is bound in `matches`.
        binding: String,
        direction: Direction,
        optional: bool,
    },
    /// Relationship to a node whose labels are resolved at compile time.
    MorphRelation {
        parent: String,
        parent_labels: Labels,
        related: String,
        property: String,
        binding: String,
        direction: Direction,
        optional: bool,
    },
}

impl MatchDescriptor {
    pub fn is_optional(&self) -> bool {
        match self {
            MatchDescriptor::Relation { optional, .. }
            | MatchDescriptor::MorphRelation { optional, .. } => *optional,
        }
    }
}

/// Arguments of [`Builder::match_relation`].
#[derive(Debug, PartialEq, Clone)]
pub struct RelationPattern {
    pub parent_labels: Labels,
    pub related_labels: Labels,
    pub related_node: String,
    pub relationship: String,
    pub property: String,
    pub value: Value,
    pub direction: Direction,
    pub boolean: Boolean,
}

impl RelationPattern {
    pub fn new(
        parent_labels: impl Into<Labels>,
        relationship: &str,
        related_labels: impl Into<Labels>,
    ) -> Self {
        let related_labels = related_labels.into();
        RelationPattern {
            parent_labels: parent_labels.into(),
            related_node: placeholder::node_reference(related_labels.as_slice()),
            related_labels,
            relationship: relationship.to_string(),
            property: "id".to_string(),
            value: Value::Null,
            direction: Direction::Out,
            boolean: Boolean::And,
        }
    }

    pub fn related_node(mut self, node: &str) -> Self {
        self.related_node = node.to_string();
        self
    }

    /// Constrains the parent node's `property` to `value`.
    pub fn on(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.property = property.to_string();
        self.value = value.into();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// `Boolean::Or` turns the clause into an `OPTIONAL MATCH`.
    pub fn boolean(mut self, boolean: Boolean) -> Self {
        self.boolean = boolean;
        self
    }

    pub fn optional(self) -> Self {
        self.boolean(Boolean::Or)
    }
}

/// Arguments of [`Builder::match_morph_relation`].
#[derive(Debug, PartialEq, Clone)]
pub struct MorphPattern {
    pub parent_labels: Labels,
    pub related_node: String,
    pub property: String,
    pub value: Value,
    pub direction: Direction,
    pub boolean: Boolean,
}

impl MorphPattern {
    pub fn new(parent_labels: impl Into<Labels>, related_node: &str) -> Self {
        MorphPattern {
            parent_labels: parent_labels.into(),
            related_node: related_node.to_string(),
            property: "id".to_string(),
            value: Value::Null,
            direction: Direction::Out,
            boolean: Boolean::And,
        }
    }

    pub fn on(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.property = property.to_string();
        self.value = value.into();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn boolean(mut self, boolean: Boolean) -> Self {
        self.boolean = boolean;
        self
    }
}

impl Builder {
    /// Appends a relationship match and binds the parent property value
    /// under `matches`, even when it is null.
    pub fn match_relation(mut self, pattern: RelationPattern) -> Self {
        let parent = self
            .grammar
            .node_reference_for(pattern.parent_labels.as_slice());
        let binding = placeholder::match_binding_key(&parent, &pattern.property);
        self.bind_match(&binding, pattern.value);
        self.spec.matches.push(MatchDescriptor::Relation {
            parent,
            parent_labels: pattern.parent_labels,
            related: pattern.related_node,
            related_labels: pattern.related_labels,
            relationship: pattern.relationship,
            property: pattern.property,
            binding,
            direction: pattern.direction,
            optional: pattern.boolean == Boolean::Or,
        });
        self
    }

    pub fn match_morph_relation(mut self, pattern: MorphPattern) -> Self {
        let parent = self
            .grammar
            .node_reference_for(pattern.parent_labels.as_slice());
        let binding = placeholder::match_binding_key(&parent, &pattern.property);
        self.bind_match(&binding, pattern.value);
        self.spec.matches.push(MatchDescriptor::MorphRelation {
            parent,
            parent_labels: pattern.parent_labels,
            related: pattern.related_node,
            property: pattern.property,
            binding,
            direction: pattern.direction,
            optional: pattern.boolean == Boolean::Or,
        });
        self
    }

    fn bind_match(&mut self, key: &str, value: Value) {
        let value = if placeholder::is_identity_reference(key) {
            super::predicate::coerce_identity(value)
        } else {
            value
        };
        self.spec.bindings.add(
            Value::Object(Map::from_iter([(key.to_string(), value)])),
            BindingCategory::Matches,
        );
    }
}
