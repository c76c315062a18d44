use serde_json::{Map, Value};

use super::Grammar;
use crate::{
    config::BuilderConfig,
    connection::Parameters,
    query_builder::{
        mutation::BATCH_PARAMETER, placeholder, Aggregate, AggregateFunction, Assignment,
        BindingCategory, CreateWith, DatePart, Direction, Having, InSource, LabelOperation,
        MatchDescriptor, Operand, Operator, Order, Predicate, QuerySpec, SelectItem,
    },
};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix of update placeholders, keeping `SET` values apart from predicate
/// values bound under the same column.
pub const UPDATE_POSTFIX: &str = "_update";

const AGGREGATE_ALIAS: &str = "aggregate";

/// Compiles query specifications into Neo4j-flavoured Cypher.
///
/// Lock modes have no Cypher counterpart and are not rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherGrammar {
    date_format: String,
}

impl Default for CypherGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl CypherGrammar {
    pub fn new() -> Self {
        CypherGrammar {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new().with_date_format(&config.date_format)
    }
}

/// One projected item with its result column name.
#[derive(Debug, Clone)]
struct Projection {
    expression: String,
    alias: String,
}

impl Projection {
    fn render(&self) -> String {
        if self.expression == self.alias {
            self.alias.clone()
        } else {
            format!("{} AS {}", self.expression, self.alias)
        }
    }
}

fn parameter(binding: &str) -> String {
    format!("${}", placeholder::parameter_key(binding))
}

fn update_key(column: &str) -> String {
    format!("{}{}", column, UPDATE_POSTFIX)
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Result column name of a raw projection: the text after its last `AS`.
fn raw_alias(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    match upper.rfind(" AS ") {
        Some(pos) => raw[pos + 4..].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

impl CypherGrammar {
    fn labels(&self, labels: &[String]) -> String {
        labels
            .iter()
            .map(|label| format!(":{}", self.wrap(label)))
            .collect()
    }

    fn node_pattern(&self, node: &str, labels: &[String]) -> String {
        format!("({}{})", node, self.labels(labels))
    }

    fn properties(&self, keys: impl Iterator<Item = (String, String)>) -> String {
        let rendered = keys
            .map(|(property, binding)| format!("{}: {}", self.wrap(&property), parameter(&binding)))
            .collect::<Vec<_>>();
        if rendered.is_empty() {
            String::new()
        } else {
            format!(" {{{}}}", rendered.join(", "))
        }
    }

    fn arrow(&self, relationship: &str, direction: Direction) -> String {
        let relationship = if relationship.is_empty() {
            String::new()
        } else {
            format!("[:{}]", self.wrap(relationship))
        };
        match direction {
            Direction::Out => format!("-{}->", relationship),
            Direction::In => format!("<-{}-", relationship),
            Direction::InOut => format!("-{}-", relationship),
        }
    }

    /// `name` → `user.name`, `Post.title` → `post.title`, `id` → `id(user)`.
    /// Function calls such as `id(user)` are kept verbatim.
    fn property(&self, node: &str, column: &str) -> String {
        if column == "*" {
            return node.to_string();
        }
        if column == "id" {
            return format!("id({})", node);
        }
        if column.contains('(') {
            return column.to_string();
        }
        match column.split_once('.') {
            Some((qualifier, property)) => {
                let qualifier = if qualifier.starts_with(char::is_uppercase) {
                    self.node_reference_for(&[qualifier.to_string()])
                } else {
                    qualifier.to_string()
                };
                format!("{}.{}", qualifier, self.wrap(property))
            }
            None => format!("{}.{}", node, self.wrap(column)),
        }
    }

    fn operand(&self, value: &Operand, binding: &str) -> String {
        match value {
            Operand::Value(_) => parameter(binding),
            Operand::Expression(expression) => expression.as_str().to_string(),
        }
    }

    fn comparison(&self, lhs: &str, operator: Operator, rhs: &str) -> String {
        match operator {
            Operator::Like | Operator::ILike | Operator::Regex => format!("{} =~ {}", lhs, rhs),
            Operator::NotLike => format!("NOT {} =~ {}", lhs, rhs),
            Operator::NotEqualBang => format!("{} <> {}", lhs, rhs),
            Operator::Not => format!("NOT {} = {}", lhs, rhs),
            Operator::IsNull => format!("{} IS NULL", lhs),
            Operator::IsNotNull => format!("{} IS NOT NULL", lhs),
            Operator::In => format!("{} IN {}", lhs, rhs),
            Operator::NotIn => format!("NOT {} IN {}", lhs, rhs),
            Operator::Index => format!("{}[{}]", lhs, rhs),
            Operator::SliceFrom => format!("{}[{}..]", lhs, rhs),
            Operator::SliceTo => format!("{}[..{}]", lhs, rhs),
            Operator::Slice => format!("{}[{}[0]..{}[1]]", lhs, rhs, rhs),
            other => format!("{} {} {}", lhs, other.as_str().to_uppercase(), rhs),
        }
    }

    fn compile_wheres(&self, wheres: &[Predicate], node: &str) -> String {
        wheres
            .iter()
            .enumerate()
            .map(|(i, predicate)| {
                let compiled = self.compile_predicate(predicate, node);
                if i == 0 {
                    compiled
                } else {
                    format!("{} {}", predicate.boolean().as_str(), compiled)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_predicate(&self, predicate: &Predicate, node: &str) -> String {
        match predicate {
            Predicate::Basic {
                column,
                operator,
                value,
                binding,
                ..
            } => self.comparison(
                &self.property(node, column),
                *operator,
                &self.operand(value, binding),
            ),
            Predicate::Raw { sql, .. } => sql.clone(),
            Predicate::Nested { query, .. } => {
                let child = self.node_reference_for(query.from.as_slice());
                format!("({})", self.compile_wheres(&query.wheres, &child))
            }
            Predicate::Sub {
                column,
                operator,
                query,
                ..
            } => self.comparison(
                &self.property(node, column),
                *operator,
                &format!("head(COLLECT {{ {} }})", self.compile_select(query)),
            ),
            Predicate::Exists { query, .. } => {
                format!("EXISTS {{ {} }}", self.compile_select(query))
            }
            Predicate::NotExists { query, .. } => {
                format!("NOT EXISTS {{ {} }}", self.compile_select(query))
            }
            Predicate::In { column, source, .. } => self.comparison(
                &self.property(node, column),
                Operator::In,
                &self.in_source(source),
            ),
            Predicate::NotIn { column, source, .. } => self.comparison(
                &self.property(node, column),
                Operator::NotIn,
                &self.in_source(source),
            ),
            Predicate::Between { column, binding, .. } => {
                self.between(&self.property(node, column), binding)
            }
            Predicate::NotBetween { column, binding, .. } => {
                format!("NOT {}", self.between(&self.property(node, column), binding))
            }
            Predicate::Null { column, .. } => format!("{} IS NULL", self.property(node, column)),
            Predicate::NotNull { column, .. } => {
                format!("{} IS NOT NULL", self.property(node, column))
            }
            Predicate::DatePart {
                part,
                column,
                operator,
                value,
                binding,
                ..
            } => {
                let lhs = self.property(node, column);
                let rhs = self.operand(value, binding);
                match part {
                    DatePart::Date => self.comparison(
                        &format!("date({})", lhs),
                        *operator,
                        &format!("date({})", rhs),
                    ),
                    DatePart::Time => self.comparison(
                        &format!("time({})", lhs),
                        *operator,
                        &format!("time({})", rhs),
                    ),
                    DatePart::Day => {
                        self.comparison(&format!("datetime({}).day", lhs), *operator, &rhs)
                    }
                    DatePart::Month => {
                        self.comparison(&format!("datetime({}).month", lhs), *operator, &rhs)
                    }
                    DatePart::Year => {
                        self.comparison(&format!("datetime({}).year", lhs), *operator, &rhs)
                    }
                }
            }
            Predicate::Carried {
                column,
                operator,
                value,
                ..
            } => self.comparison(&self.property(node, column), *operator, value),
        }
    }

    fn in_source(&self, source: &InSource) -> String {
        match source {
            InSource::Values { binding, .. } => parameter(binding),
            InSource::Query(query) => format!("COLLECT {{ {} }}", self.compile_select(query)),
        }
    }

    fn between(&self, lhs: &str, binding: &str) -> String {
        let range = parameter(binding);
        format!("({} >= {}[0] AND {} <= {}[1])", lhs, range, lhs, range)
    }

    /// Pattern and condition of one relationship match. The condition is
    /// omitted when the bound value is null.
    fn compile_match(&self, spec: &QuerySpec, descriptor: &MatchDescriptor, node: &str) -> (String, Option<String>) {
        let (parent, parent_labels, related, relationship, property, binding, direction) =
            match descriptor {
                MatchDescriptor::Relation {
                    parent,
                    parent_labels,
                    related,
                    related_labels,
                    relationship,
                    property,
                    binding,
                    direction,
                    ..
                } => (
                    parent,
                    parent_labels,
                    self.node_pattern(related, related_labels.as_slice()),
                    relationship.as_str(),
                    property,
                    binding,
                    *direction,
                ),
                MatchDescriptor::MorphRelation {
                    parent,
                    parent_labels,
                    related,
                    property,
                    binding,
                    direction,
                    ..
                } => (
                    parent,
                    parent_labels,
                    format!("({})", related),
                    "",
                    property,
                    binding,
                    *direction,
                ),
            };

        let parent_pattern = if parent == node {
            format!("({})", parent)
        } else {
            self.node_pattern(parent, parent_labels.as_slice())
        };
        let pattern = format!(
            "{}{}{}",
            parent_pattern,
            self.arrow(relationship, direction),
            related
        );

        let bound = spec
            .bindings
            .get(BindingCategory::Matches)
            .and_then(|bindings| bindings.keyed.get(binding))
            .is_some_and(|value| !value.is_null());
        let condition = bound.then(|| {
            let lhs = if placeholder::is_identity_reference(binding) {
                binding.clone()
            } else {
                format!("{}.{}", parent, self.wrap(property))
            };
            format!("{} = {}", lhs, parameter(binding))
        });
        (pattern, condition)
    }

    /// `MATCH` / `WHERE` / `OPTIONAL MATCH` / `WITH` clauses shared by reads
    /// and writes.
    fn compile_source(&self, spec: &QuerySpec, node: &str) -> Vec<String> {
        let mut patterns = vec![self.node_pattern(node, spec.from.as_slice())];
        let mut conditions = Vec::new();
        let mut optional = Vec::new();

        for descriptor in &spec.matches {
            let (pattern, condition) = self.compile_match(spec, descriptor, node);
            if descriptor.is_optional() {
                optional.push(match condition {
                    Some(condition) => format!("OPTIONAL MATCH {} WHERE {}", pattern, condition),
                    None => format!("OPTIONAL MATCH {}", pattern),
                });
            } else {
                patterns.push(pattern);
                conditions.extend(condition);
            }
        }

        if !spec.wheres.is_empty() {
            let wheres = self.compile_wheres(&spec.wheres, node);
            if conditions.is_empty() || spec.wheres.len() == 1 {
                conditions.push(wheres);
            } else {
                conditions.push(format!("({})", wheres));
            }
        }

        let mut clauses = vec![format!("MATCH {}", patterns.join(", "))];
        if !conditions.is_empty() {
            clauses.push(format!("WHERE {}", conditions.join(" AND ")));
        }
        clauses.extend(optional);
        if !spec.with.is_empty() {
            let carried = std::iter::once(node.to_string())
                .chain(spec.with.iter().filter(|item| item.as_str() != node).cloned())
                .collect::<Vec<_>>();
            clauses.push(format!("WITH {}", carried.join(", ")));
        }
        clauses
    }

    fn column_projection(&self, node: &str, column: &str) -> Projection {
        let alias = if column == "*" {
            node.to_string()
        } else if column == "id" || placeholder::is_identity_reference(column) {
            "id".to_string()
        } else {
            self.wrap(placeholder::strip_qualifier(column))
        };
        Projection {
            expression: self.property(node, column),
            alias,
        }
    }

    fn compile_aggregate(&self, aggregate: &Aggregate) -> Projection {
        let node = self.node_reference_for(aggregate.label.as_slice());
        let columns = aggregate
            .columns
            .iter()
            .filter(|column| column.as_str() != "*")
            .map(|column| self.property(&node, column))
            .collect::<Vec<_>>();
        let target = if columns.is_empty() {
            node
        } else {
            columns.join(", ")
        };
        let expression = match aggregate.function {
            AggregateFunction::CountDistinct => format!("count(DISTINCT {})", target),
            AggregateFunction::PercentileCont | AggregateFunction::PercentileDisc => format!(
                "{}({}, {})",
                aggregate.function,
                target,
                aggregate.percentile.unwrap_or(0.5)
            ),
            function => format!("{}({})", function, target),
        };
        Projection {
            expression,
            alias: AGGREGATE_ALIAS.to_string(),
        }
    }

    fn compile_projection(&self, spec: &QuerySpec, node: &str) -> Vec<Projection> {
        let groups = spec
            .groups
            .iter()
            .map(|group| self.column_projection(node, group))
            .collect::<Vec<_>>();

        if let Some(aggregate) = &spec.aggregate {
            let mut projection = groups;
            projection.push(self.compile_aggregate(aggregate));
            return projection;
        }

        let mut projection = match &spec.columns {
            Some(columns) if !columns.is_empty() => columns
                .iter()
                .map(|item| match item {
                    SelectItem::Column(column) => self.column_projection(node, column),
                    SelectItem::Raw(raw) => Projection {
                        expression: raw.clone(),
                        alias: raw_alias(raw),
                    },
                })
                .collect::<Vec<_>>(),
            _ if !groups.is_empty() => Vec::new(),
            _ => vec![Projection {
                expression: node.to_string(),
                alias: node.to_string(),
            }],
        };
        for group in groups {
            if !projection.iter().any(|p| p.alias == group.alias) {
                projection.push(group);
            }
        }
        projection
    }

    fn compile_havings(&self, havings: &[Having]) -> String {
        havings
            .iter()
            .enumerate()
            .map(|(i, having)| {
                let (compiled, boolean) = match having {
                    Having::Basic {
                        column,
                        operator,
                        binding,
                        boolean,
                        ..
                    } => (
                        self.comparison(
                            &self.wrap(placeholder::strip_qualifier(column)),
                            *operator,
                            &parameter(binding),
                        ),
                        boolean,
                    ),
                    Having::Raw { sql, boolean } => (sql.clone(), boolean),
                };
                if i == 0 {
                    compiled
                } else {
                    format!("{} {}", boolean.as_str(), compiled)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_orders(&self, orders: &[Order], resolve: impl Fn(&str) -> String) -> String {
        orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => {
                    format!("{} {}", resolve(column), direction.as_str())
                }
                Order::Raw(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_query(&self, spec: &QuerySpec) -> String {
        let node = self.node_reference_for(spec.from.as_slice());
        let mut clauses = self.compile_source(spec, &node);
        let projection = self.compile_projection(spec, &node);
        let distinct = if spec.distinct { "DISTINCT " } else { "" };
        let rendered = projection
            .iter()
            .map(Projection::render)
            .collect::<Vec<_>>()
            .join(", ");

        if spec.havings.is_empty() {
            clauses.push(format!("RETURN {}{}", distinct, rendered));
        } else {
            let aliases = projection
                .iter()
                .map(|p| p.alias.clone())
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("WITH {}{}", distinct, rendered));
            clauses.push(format!("WHERE {}", self.compile_havings(&spec.havings)));
            clauses.push(format!("RETURN {}", aliases));
        }

        if spec.aggregate.is_none() && !spec.orders.is_empty() {
            let orders = self.compile_orders(&spec.orders, |column| {
                if projection.iter().any(|p| p.alias == column) {
                    column.to_string()
                } else {
                    self.property(&node, column)
                }
            });
            clauses.push(format!("ORDER BY {}", orders));
        }
        if let Some(offset) = spec.offset {
            clauses.push(format!("SKIP {}", offset));
        }
        if let Some(limit) = spec.limit {
            clauses.push(format!("LIMIT {}", limit));
        }
        clauses.join(" ")
    }
}

impl Grammar for CypherGrammar {
    fn compile_select(&self, spec: &QuerySpec) -> String {
        let mut cypher = self.compile_query(spec);
        if !spec.has_unions() {
            return cypher;
        }
        for union in &spec.unions {
            cypher.push_str(if union.all { " UNION ALL " } else { " UNION " });
            cypher.push_str(&self.compile_select(&union.query));
        }

        let mut tail = Vec::new();
        if !spec.union_orders.is_empty() {
            let orders = self.compile_orders(&spec.union_orders, |column| {
                self.wrap(placeholder::strip_qualifier(column))
            });
            tail.push(format!("ORDER BY {}", orders));
        }
        if let Some(offset) = spec.union_offset {
            tail.push(format!("SKIP {}", offset));
        }
        if let Some(limit) = spec.union_limit {
            tail.push(format!("LIMIT {}", limit));
        }
        if tail.is_empty() {
            return cypher;
        }
        format!("CALL {{ {} }} RETURN * {}", cypher, tail.join(" "))
    }

    fn compile_insert(&self, spec: &QuerySpec, rows: &[Map<String, Value>]) -> String {
        let node = self.node_reference_for(spec.from.as_slice());
        let labels = self.labels(spec.from.as_slice());
        match rows {
            [row] => {
                let properties = self.properties(row.keys().map(|key| (key.clone(), key.clone())));
                format!(
                    "CREATE ({}{}{}) RETURN id({}) AS id",
                    node, labels, properties, node
                )
            }
            _ => format!(
                "UNWIND ${} AS row CREATE ({}{}) SET {} += row RETURN id({}) AS id",
                BATCH_PARAMETER, node, labels, node, node
            ),
        }
    }

    fn compile_update(&self, spec: &QuerySpec, assignments: &[Assignment]) -> String {
        let node = self.node_reference_for(spec.from.as_slice());
        let mut clauses = self.compile_source(spec, &node);
        let sets = assignments
            .iter()
            .map(|assignment| {
                let value = match &assignment.value {
                    Operand::Value(_) => parameter(&update_key(&assignment.column)),
                    Operand::Expression(expression) => expression.as_str().to_string(),
                };
                format!("{} = {}", self.property(&node, &assignment.column), value)
            })
            .collect::<Vec<_>>();
        clauses.push(format!("SET {}", sets.join(", ")));
        clauses.push(format!("RETURN count({}) AS affected", node));
        clauses.join(" ")
    }

    fn compile_delete(&self, spec: &QuerySpec) -> String {
        let node = self.node_reference_for(spec.from.as_slice());
        let mut clauses = self.compile_source(spec, &node);
        clauses.push(format!("DETACH DELETE {}", node));
        clauses.join(" ")
    }

    fn compile_create_with(&self, _spec: &QuerySpec, payload: &CreateWith) -> String {
        let node = self.node_reference_for(payload.node.labels.as_slice());
        let attributes = self.properties(payload.node.attributes.keys().map(|attribute| {
            (
                attribute.clone(),
                placeholder::create_attribute_key(&node, attribute),
            )
        }));
        let mut clauses = vec![format!(
            "CREATE ({}{}{})",
            node,
            self.labels(payload.node.labels.as_slice()),
            attributes
        )];

        for related in &payload.related {
            let arrow = self.arrow(&related.relationship, related.direction);
            let labels = self.labels(related.labels.as_slice());
            for (index, attributes) in related.create.iter().enumerate() {
                let variable = format!("{}_{}", related.relation, index);
                let properties = self.properties(attributes.keys().map(|attribute| {
                    (
                        attribute.clone(),
                        placeholder::related_attribute_key(&related.relation, index, attribute),
                    )
                }));
                clauses.push(format!(
                    "CREATE ({}){}({}{}{})",
                    node, arrow, variable, labels, properties
                ));
            }
        }

        for related in payload.related.iter().filter(|r| !r.attach.is_empty()) {
            let variable = format!("{}_attached", related.relation);
            clauses.push(format!(
                "WITH DISTINCT {} MATCH ({}{}) WHERE id({}) IN {}",
                node,
                variable,
                self.labels(related.labels.as_slice()),
                variable,
                parameter(&placeholder::attach_key(&related.relation))
            ));
            clauses.push(format!(
                "MERGE ({}){}({})",
                node,
                self.arrow(&related.relationship, related.direction),
                variable
            ));
        }

        clauses.push(format!("RETURN DISTINCT {}", node));
        clauses.join(" ")
    }

    fn compile_update_labels(
        &self,
        spec: &QuerySpec,
        labels: &[String],
        operation: LabelOperation,
    ) -> String {
        let node = self.node_reference_for(spec.from.as_slice());
        let mut clauses = self.compile_source(spec, &node);
        let keyword = match operation {
            LabelOperation::Add => "SET",
            LabelOperation::Remove => "REMOVE",
        };
        clauses.push(format!("{} {}{}", keyword, node, self.labels(labels)));
        clauses.push(format!("RETURN {}", node));
        clauses.join(" ")
    }

    fn compile_truncate(&self, spec: &QuerySpec) -> Vec<(String, Parameters)> {
        let node = self.node_reference_for(spec.from.as_slice());
        vec![(
            format!(
                "MATCH {} DETACH DELETE {}",
                self.node_pattern(&node, spec.from.as_slice()),
                node
            ),
            Parameters::new(),
        )]
    }

    fn compile_sub_select(&self, cypher: &str, alias: &str) -> String {
        format!("COLLECT {{ {} }} AS {}", cypher, self.wrap(alias))
    }

    fn wrap(&self, value: &str) -> String {
        if value == "*" || is_plain_identifier(value) {
            value.to_string()
        } else {
            format!("`{}`", value.replace('`', "``"))
        }
    }

    fn postfix_values(&self, values: &Map<String, Value>, is_update: bool) -> Map<String, Value> {
        if !is_update {
            return values.clone();
        }
        values
            .iter()
            .map(|(key, value)| (update_key(key), value.clone()))
            .collect()
    }

    fn date_format(&self) -> &str {
        &self.date_format
    }
}
