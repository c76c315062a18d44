//! Fluent query specification builder.
//!
//! A [`Builder`] owns one [`QuerySpec`] plus shared handles to the Grammar,
//! the Connection and the configuration. Every builder call consumes the
//! builder and hands it back, so a specification always has exactly one
//! owner; calls that can reject their input return `Result<Builder, _>` and
//! leave no partial state behind.
//!
//! ```ignore
//! let rows = Builder::new(grammar, connection)
//!     .from("User")
//!     .where_("age", ">", 18)?
//!     .where_("age", "<", 65)?
//!     .order_by("name", OrderDirection::Asc)
//!     .limit(10)
//!     .get()?;
//! ```
//!
//! The implementation is split by concern:
//! - `predicate`: the `where` family
//! - `relations`: relationship match clauses
//! - `aggregate`: aggregates, pagination and chunking
//! - `mutation`: create/update/delete statements
//! - `dynamic_where`: `whereNameAndAge`-style method names

use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

use crate::{
    config::BuilderConfig,
    connection::{Connection, Parameters, Row},
    grammar::Grammar,
};

pub mod aggregate;
pub mod bindings;
pub mod dynamic_where;
pub mod errors;
pub mod mutation;
pub mod operand;
pub mod placeholder;
pub mod predicate;
pub mod relations;
pub mod spec;

pub use aggregate::{Page, SimplePage};
pub use bindings::{BindingCategory, BindingTable, CategoryBindings};
pub use errors::QueryBuilderError;
pub use mutation::{Assignment, CreateWith, LabelOperation, NodePayload, RelatedPayload};
pub use operand::{Boolean, Expression, Labels, Operand, Operator};
pub use predicate::{InSource, DatePart, Predicate};
pub use relations::{Direction, MatchDescriptor, MorphPattern, RelationPattern};
pub use spec::{
    Aggregate, AggregateFunction, Having, LockMode, Order, OrderDirection, QuerySpec, SelectItem,
    Union,
};

pub type Result<T> = std::result::Result<T, QueryBuilderError>;

/// Closure applied to a fresh child builder (nested groups, sub-queries).
pub type BuilderFn = Box<dyn FnOnce(Builder) -> Result<Builder>>;

/// Source of a sub-select.
pub enum SubSource {
    Builder(Builder),
    Closure(BuilderFn),
    Cypher(String),
}

impl SubSource {
    pub fn closure(f: impl FnOnce(Builder) -> Result<Builder> + 'static) -> Self {
        SubSource::Closure(Box::new(f))
    }
}

impl From<Builder> for SubSource {
    fn from(builder: Builder) -> Self {
        SubSource::Builder(builder)
    }
}

impl From<&str> for SubSource {
    fn from(cypher: &str) -> Self {
        SubSource::Cypher(cypher.to_string())
    }
}

impl From<String> for SubSource {
    fn from(cypher: String) -> Self {
        SubSource::Cypher(cypher)
    }
}

impl TryFrom<Value> for SubSource {
    type Error = QueryBuilderError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(cypher) => Ok(SubSource::Cypher(cypher)),
            other => Err(QueryBuilderError::InvalidSubQuerySource(other.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct Builder {
    spec: QuerySpec,
    grammar: Arc<dyn Grammar>,
    connection: Arc<dyn Connection>,
    config: Arc<BuilderConfig>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("spec", &self.spec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Builder {
    pub fn new(grammar: Arc<dyn Grammar>, connection: Arc<dyn Connection>) -> Self {
        Self::with_config(grammar, connection, BuilderConfig::default())
    }

    pub fn with_config(
        grammar: Arc<dyn Grammar>,
        connection: Arc<dyn Connection>,
        config: BuilderConfig,
    ) -> Self {
        Builder {
            spec: QuerySpec::default(),
            grammar,
            connection,
            config: Arc::new(config),
        }
    }

    /// A fresh builder sharing this builder's collaborators, with empty state.
    pub fn new_query(&self) -> Builder {
        Builder {
            spec: QuerySpec::default(),
            grammar: Arc::clone(&self.grammar),
            connection: Arc::clone(&self.connection),
            config: Arc::clone(&self.config),
        }
    }

    /// A fresh builder whose binding keys avoid every key this one uses.
    pub fn child_query(&self) -> Builder {
        let mut query = self.new_query();
        query.spec.reserved_keys = self.spec.used_keys();
        query
    }

    /// A child builder scoped to the same target labels, for nested groups.
    pub fn for_nested_where(&self) -> Builder {
        let mut query = self.child_query();
        query.spec.from = self.spec.from.clone();
        query.spec.prefix = self.spec.prefix.clone();
        query
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn spec_mut(&mut self) -> &mut QuerySpec {
        &mut self.spec
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Sets the target label(s).
    pub fn from(mut self, labels: impl Into<Labels>) -> Self {
        self.spec.from = labels.into();
        if self.config.prefix_bindings {
            self.spec.prefix = Some(self.spec.from.clone());
        }
        self
    }

    /// Prefixes binding keys with the lower-cased target labels.
    pub fn prefix_bindings(mut self) -> Self {
        self.spec.prefix = Some(self.spec.from.clone());
        self
    }

    /// Pattern variable of the target node, as the Grammar names it.
    pub fn node_reference(&self) -> String {
        self.grammar.node_reference_for(self.spec.from.as_slice())
    }


    pub fn select(mut self, columns: &[&str]) -> Self {
        self.spec.columns = Some(
            columns
                .iter()
                .map(|c| SelectItem::Column(c.to_string()))
                .collect(),
        );
        self
    }

    pub fn add_select(mut self, columns: &[&str]) -> Self {
        let selected = self.spec.columns.get_or_insert_with(Vec::new);
        selected.extend(columns.iter().map(|c| SelectItem::Column(c.to_string())));
        self
    }

    pub fn select_raw(mut self, expression: &str, bindings: Map<String, Value>) -> Self {
        self.spec
            .columns
            .get_or_insert_with(Vec::new)
            .push(SelectItem::Raw(expression.to_string()));
        if !bindings.is_empty() {
            self.spec
                .bindings
                .add(Value::Object(bindings), BindingCategory::Select);
        }
        self
    }

    /// Projects a sub-query under `alias`. Its bindings move into the
    /// `select` category.
    pub fn select_sub(mut self, source: SubSource, alias: &str) -> Result<Self> {
        let (cypher, bindings) = self.compile_sub_source(source)?;
        self.spec
            .columns
            .get_or_insert_with(Vec::new)
            .push(SelectItem::Raw(
                self.grammar.compile_sub_select(&cypher, alias),
            ));
        self.spec.bindings.merge_from(bindings);
        Ok(self)
    }

    fn compile_sub_source(&self, source: SubSource) -> Result<(String, BindingTable)> {
        match source {
            SubSource::Builder(builder) => Ok(self.embed_sub_spec(builder.spec)),
            SubSource::Closure(f) => {
                let builder = f(self.child_query())?;
                Ok(self.embed_sub_spec(builder.spec))
            }
            SubSource::Cypher(cypher) => Ok((cypher, BindingTable::new())),
        }
    }

    fn embed_sub_spec(&self, mut spec: QuerySpec) -> (String, BindingTable) {
        spec.rekey(&self.spec.used_keys());
        let cypher = self.grammar.compile_select(&spec);
        (cypher, select_bindings(spec.bindings))
    }

    pub fn distinct(mut self) -> Self {
        self.spec.distinct = true;
        self
    }

    /// Keeps graph elements in scope across clause boundaries.
    pub fn carry(mut self, items: &[&str]) -> Self {
        self.spec.with.extend(items.iter().map(|i| i.to_string()));
        self
    }


    /// Orders the primary query, or the union result once unions exist.
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        let order = Order::Column {
            column: column.to_string(),
            direction,
        };
        if self.spec.has_unions() {
            self.spec.union_orders.push(order);
        } else {
            self.spec.orders.push(order);
        }
        self
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }

    pub fn order_by_raw(mut self, sql: &str, bindings: Map<String, Value>) -> Self {
        self.spec.orders.push(Order::Raw(sql.to_string()));
        if !bindings.is_empty() {
            self.spec
                .bindings
                .add(Value::Object(bindings), BindingCategory::Order);
        }
        self
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.spec.groups.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn having(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Boolean::And)
    }

    pub fn or_having(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.add_having(column, operator, value.into(), Boolean::Or)
    }

    fn add_having(mut self, column: &str, operator: &str, value: Value, boolean: Boolean) -> Self {
        let (operator, value) = match operator.parse::<Operator>() {
            Ok(operator) => (operator, value),
            Err(token) => (Operator::Equal, Value::String(token)),
        };
        let count = self
            .spec
            .havings
            .iter()
            .filter(|h| matches!(h, Having::Basic { column: c, .. } if c == column))
            .count();
        let binding = if count > 0 {
            format!("having_{}_{}", column, count + 1)
        } else {
            format!("having_{}", column)
        };
        self.spec.bindings.add(
            Value::Object(Map::from_iter([(binding.clone(), value.clone())])),
            BindingCategory::Having,
        );
        self.spec.havings.push(Having::Basic {
            column: column.to_string(),
            operator,
            value,
            binding,
            boolean,
        });
        self
    }

    pub fn having_raw(mut self, sql: &str, bindings: Map<String, Value>) -> Self {
        self.spec.havings.push(Having::Raw {
            sql: sql.to_string(),
            boolean: Boolean::And,
        });
        if !bindings.is_empty() {
            self.spec
                .bindings
                .add(Value::Object(bindings), BindingCategory::Having);
        }
        self
    }


    pub fn limit(mut self, value: u64) -> Self {
        if self.spec.has_unions() {
            self.spec.union_limit = Some(value);
        } else {
            self.spec.limit = Some(value);
        }
        self
    }

    pub fn take(self, value: u64) -> Self {
        self.limit(value)
    }

    pub fn offset(mut self, value: u64) -> Self {
        if self.spec.has_unions() {
            self.spec.union_offset = Some(value);
        } else {
            self.spec.offset = Some(value);
        }
        self
    }

    pub fn skip(self, value: u64) -> Self {
        self.offset(value)
    }

    /// Pages are 1-based.
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.offset((page - 1).saturating_mul(per_page)).limit(per_page)
    }

    pub fn union(self, query: Builder) -> Self {
        self.add_union(query, false)
    }

    pub fn union_all(self, query: Builder) -> Self {
        self.add_union(query, true)
    }

    fn add_union(mut self, query: Builder, all: bool) -> Self {
        let mut spec = query.spec;
        spec.rekey(&self.spec.used_keys());
        let bindings = std::mem::take(&mut spec.bindings).flatten();
        if !bindings.is_empty() {
            self.spec
                .bindings
                .add(Value::Object(bindings), BindingCategory::Union);
        }
        self.spec.unions.push(Union {
            query: Box::new(spec),
            all,
        });
        self
    }


    pub fn lock(mut self, mode: LockMode) -> Self {
        self.spec.lock = mode;
        self
    }

    pub fn lock_for_update(self) -> Self {
        self.lock(LockMode::Exclusive)
    }

    pub fn shared_lock(self) -> Self {
        self.lock(LockMode::Shared)
    }


    /// Flattened bindings, keyed as registered.
    pub fn get_bindings(&self) -> Map<String, Value> {
        self.spec.bindings.flatten()
    }

    pub fn get_raw_bindings(&self) -> &BindingTable {
        &self.spec.bindings
    }

    /// Replaces one category. Objects become keyed bindings, arrays
    /// positional ones.
    pub fn set_bindings(mut self, values: Value, category: &str) -> Result<Self> {
        let category = category.parse::<BindingCategory>()?;
        let bindings = match values {
            Value::Object(keyed) => CategoryBindings {
                keyed,
                positional: Vec::new(),
            },
            Value::Array(positional) => CategoryBindings {
                keyed: Map::new(),
                positional,
            },
            Value::Null => CategoryBindings::default(),
            scalar => CategoryBindings {
                keyed: Map::new(),
                positional: vec![scalar],
            },
        };
        self.spec.bindings.set(category, bindings);
        Ok(self)
    }

    pub fn add_binding(mut self, value: Value, category: &str) -> Result<Self> {
        self.spec.bindings.add_named(value, category)?;
        Ok(self)
    }

    pub fn merge_bindings(mut self, other: &Builder) -> Self {
        self.spec.bindings.merge_from(other.spec.bindings.clone());
        self
    }

    /// Flattened bindings with keys rewritten to Cypher parameter names.
    pub fn parameters(&self) -> Parameters {
        to_parameters(self.spec.bindings.flatten())
    }


    pub fn to_cypher(&self) -> String {
        self.grammar.compile_select(&self.spec)
    }

    pub fn get(&self) -> Result<Vec<Row>> {
        let cypher = self.to_cypher();
        let parameters = self.parameters();
        log::debug!(
            "select: {} ({} parameter(s))",
            cypher,
            parameters.len()
        );
        Ok(self.connection.select(&cypher, &parameters)?)
    }

    pub fn first(&self) -> Result<Option<Row>> {
        let rows = self.clone().take(1).get()?;
        Ok(rows.into_iter().next())
    }

    /// Looks a node up by graph identity.
    pub fn find(&self, id: i64) -> Result<Option<Row>> {
        self.clone().where_eq("id", id)?.first()
    }

    /// Values of a single property across all matching nodes.
    pub fn pluck(&self, column: &str) -> Result<Vec<Value>> {
        let key = placeholder::strip_qualifier(column).to_string();
        let rows = self.clone().select(&[column]).get()?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(&key).unwrap_or(Value::Null))
            .collect())
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(!self.clone().take(1).get()?.is_empty())
    }

    /// Dispatches a builder operation by name. Only `where…` names are
    /// recognised; they are parsed as dynamic predicates.
    pub fn call(self, method: &str, args: Vec<Value>) -> Result<Self> {
        if dynamic_where::is_dynamic_where(method) {
            return self.dynamic_where(method, args);
        }
        Err(QueryBuilderError::UnsupportedOperation(method.to_string()))
    }
}

/// Rewrites binding keys into Cypher parameter names.
pub(crate) fn to_parameters(flat: Map<String, Value>) -> Parameters {
    flat.into_iter()
        .map(|(key, value)| (placeholder::parameter_key(&key), value))
        .collect()
}

/// A sub-select's bindings land in the parent's `select` category.
fn select_bindings(bindings: BindingTable) -> BindingTable {
    let mut table = BindingTable::new();
    let flat = bindings.flatten();
    if !flat.is_empty() {
        table.add(Value::Object(flat), BindingCategory::Select);
    }
    table
}
