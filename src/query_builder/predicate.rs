//! Predicate tree and the `where` family.
//!
//! Predicates form an ordered list on the [`QuerySpec`]; each one carries the
//! boolean connector joining it to its predecessor. Groups, sub-queries and
//! existence checks hold their own child spec, owned by the predicate node.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    bindings::BindingCategory,
    errors::QueryBuilderError,
    operand::{Boolean, Operand, Operator},
    placeholder,
    spec::QuerySpec,
    Builder, Result,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

/// Right-hand side of a membership predicate.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum InSource {
    Values { values: Vec<Value>, binding: String },
    Query(Box<QuerySpec>),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Predicate {
    Basic {
        column: String,
        operator: Operator,
        value: Operand,
        binding: String,
        boolean: Boolean,
    },
    Raw {
        sql: String,
        boolean: Boolean,
    },
    Nested {
        query: Box<QuerySpec>,
        boolean: Boolean,
    },
    Sub {
        column: String,
        operator: Operator,
        query: Box<QuerySpec>,
        boolean: Boolean,
    },
    Exists {
        query: Box<QuerySpec>,
        boolean: Boolean,
    },
    NotExists {
        query: Box<QuerySpec>,
        boolean: Boolean,
    },
    In {
        column: String,
        source: InSource,
        boolean: Boolean,
    },
    NotIn {
        column: String,
        source: InSource,
        boolean: Boolean,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        binding: String,
        boolean: Boolean,
    },
    NotBetween {
        column: String,
        low: Value,
        high: Value,
        binding: String,
        boolean: Boolean,
    },
    Null {
        column: String,
        boolean: Boolean,
    },
    NotNull {
        column: String,
        boolean: Boolean,
    },
    DatePart {
        part: DatePart,
        column: String,
        operator: Operator,
        value: Operand,
        binding: String,
        boolean: Boolean,
    },
    /// Compares against an identifier carried through `WITH`; never bound.
    Carried {
        column: String,
        operator: Operator,
        value: String,
        boolean: Boolean,
    },
}

impl Predicate {
    /// Column constrained by this predicate, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::Basic { column, .. }
            | Predicate::Sub { column, .. }
            | Predicate::In { column, .. }
            | Predicate::NotIn { column, .. }
            | Predicate::Between { column, .. }
            | Predicate::NotBetween { column, .. }
            | Predicate::Null { column, .. }
            | Predicate::NotNull { column, .. }
            | Predicate::DatePart { column, .. }
            | Predicate::Carried { column, .. } => Some(column),
            Predicate::Raw { .. }
            | Predicate::Nested { .. }
            | Predicate::Exists { .. }
            | Predicate::NotExists { .. } => None,
        }
    }

    /// Calls `f` on every binding key of this predicate and of the
    /// predicates of any embedded child spec.
    pub fn visit_bindings_mut<F: FnMut(&mut String)>(&mut self, f: &mut F) {
        match self {
            Predicate::Basic { binding, .. }
            | Predicate::Between { binding, .. }
            | Predicate::NotBetween { binding, .. }
            | Predicate::DatePart { binding, .. }
            | Predicate::In {
                source: InSource::Values { binding, .. },
                ..
            }
            | Predicate::NotIn {
                source: InSource::Values { binding, .. },
                ..
            } => f(binding),
            Predicate::Nested { query, .. }
            | Predicate::Sub { query, .. }
            | Predicate::Exists { query, .. }
            | Predicate::NotExists { query, .. }
            | Predicate::In {
                source: InSource::Query(query),
                ..
            }
            | Predicate::NotIn {
                source: InSource::Query(query),
                ..
            } => {
                for predicate in query.wheres.iter_mut() {
                    predicate.visit_bindings_mut(f);
                }
            }
            Predicate::Raw { .. }
            | Predicate::Null { .. }
            | Predicate::NotNull { .. }
            | Predicate::Carried { .. } => {}
        }
    }

    pub fn boolean(&self) -> Boolean {
        match self {
            Predicate::Basic { boolean, .. }
            | Predicate::Raw { boolean, .. }
            | Predicate::Nested { boolean, .. }
            | Predicate::Sub { boolean, .. }
            | Predicate::Exists { boolean, .. }
            | Predicate::NotExists { boolean, .. }
            | Predicate::In { boolean, .. }
            | Predicate::NotIn { boolean, .. }
            | Predicate::Between { boolean, .. }
            | Predicate::NotBetween { boolean, .. }
            | Predicate::Null { boolean, .. }
            | Predicate::NotNull { boolean, .. }
            | Predicate::DatePart { boolean, .. }
            | Predicate::Carried { boolean, .. } => *boolean,
        }
    }
}

/// Integer identity coercion: integers pass, floats truncate, strings parse
/// their leading digits (0 when there are none).
pub(crate) fn coerce_identity(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().map_or(0, |f| f.trunc() as i64)),
        },
        Value::String(s) => {
            let trimmed = s.trim_start();
            let (sign, digits) = match trimmed.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
            };
            let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
            Value::from(digits.parse::<i64>().map_or(0, |i| sign * i))
        }
        Value::Bool(b) => Value::from(i64::from(b)),
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_identity).collect()),
        Value::Null => Value::Null,
        Value::Object(_) => Value::from(0),
    }
}

/// `like` patterns become Cypher regular expressions.
fn like_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let escaped = regex::escape(pattern).replace('%', ".*").replace('_', ".");
    if case_insensitive {
        format!("(?i){}", escaped)
    } else {
        escaped
    }
}

fn rewrite_like(operator: Operator, value: Operand) -> (Operator, Operand) {
    match (operator, value) {
        (Operator::Like, Operand::Value(Value::String(s))) => (
            Operator::Regex,
            Operand::Value(Value::String(like_to_regex(&s, false))),
        ),
        (Operator::ILike, Operand::Value(Value::String(s))) => (
            Operator::Regex,
            Operand::Value(Value::String(like_to_regex(&s, true))),
        ),
        (Operator::NotLike, Operand::Value(Value::String(s))) => (
            Operator::NotLike,
            Operand::Value(Value::String(like_to_regex(&s, false))),
        ),
        (operator, value) => (operator, value),
    }
}

impl Builder {
    /// Adds `column <operator> value`.
    ///
    /// An unrecognised operator token is taken as the value and the operator
    /// defaults to `=`. Membership operators and null values are routed to
    /// the membership and null predicates.
    pub fn where_(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_where(column, Some(operator), value.into(), Boolean::And)
    }

    pub fn or_where(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_where(column, Some(operator), value.into(), Boolean::Or)
    }

    /// Two-argument form: equality.
    pub fn where_eq(self, column: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_where(column, None, value.into(), Boolean::And)
    }

    pub fn or_where_eq(self, column: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_where(column, None, value.into(), Boolean::Or)
    }

    pub(crate) fn add_where(
        mut self,
        column: &str,
        operator: Option<&str>,
        value: Operand,
        boolean: Boolean,
    ) -> Result<Self> {
        let (operator, value) = match operator {
            None => (Operator::Equal, value),
            Some(token) => match token.parse::<Operator>() {
                Ok(operator) if !operator.accepts_null() && value.is_null() => {
                    return Err(QueryBuilderError::invalid_predicate(column, token));
                }
                Ok(operator) => (operator, value),
                Err(_) => (
                    Operator::Equal,
                    Operand::Value(Value::String(token.to_string())),
                ),
            },
        };

        if operator.is_membership() {
            if let Operand::Value(value) = value {
                let values = match value {
                    Value::Array(values) => values,
                    single => vec![single],
                };
                return Ok(self.add_where_in(column, values, boolean, operator == Operator::NotIn));
            }
        } else if matches!(operator, Operator::IsNull | Operator::IsNotNull) || value.is_null() {
            return Ok(self.add_where_null(column, boolean, !operator.is_equality()));
        }

        let (operator, value) = rewrite_like(operator, value);
        let (column, value) = self.normalize_identity(column, value);
        let binding = self.spec.binding_key(&column);

        if let Operand::Value(bound) = &value {
            self.bind_where(&binding, bound.clone());
        }
        self.spec.wheres.push(Predicate::Basic {
            column,
            operator,
            value,
            binding,
            boolean,
        });
        Ok(self)
    }

    /// Rewrites identity columns to `id(<node>)` and coerces their value to
    /// an integer.
    fn normalize_identity(&self, column: &str, value: Operand) -> (String, Operand) {
        let coerce = |value: Operand| match value {
            Operand::Value(v) => Operand::Value(coerce_identity(v)),
            expression => expression,
        };
        if column == "id" {
            return (format!("id({})", self.node_reference()), coerce(value));
        }
        if placeholder::is_identity_reference(column) {
            return (column.to_string(), coerce(value));
        }
        if let Some((label, "id")) = column.rsplit_once('.') {
            let node = self.grammar.node_reference_for(&[label.to_string()]);
            return (format!("id({})", node), coerce(value));
        }
        (column.to_string(), value)
    }

    fn normalize_identity_column(&self, column: &str) -> String {
        self.normalize_identity(column, Operand::Value(Value::Null)).0
    }

    fn bind_where(&mut self, key: &str, value: Value) {
        self.spec.bindings.add(
            Value::Object(Map::from_iter([(key.to_string(), value)])),
            BindingCategory::Where,
        );
    }


    /// Groups the predicates added by `f` in parentheses.
    pub fn where_nested(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_nested(f, Boolean::And)
    }

    pub fn or_where_nested(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_nested(f, Boolean::Or)
    }

    /// One equality per entry, grouped.
    pub fn where_map(self, values: Map<String, Value>) -> Result<Self> {
        self.add_nested(move |query| where_all(query, values), Boolean::And)
    }

    pub fn or_where_map(self, values: Map<String, Value>) -> Result<Self> {
        self.add_nested(move |query| where_all(query, values), Boolean::Or)
    }

    fn add_nested(
        self,
        f: impl FnOnce(Builder) -> Result<Builder>,
        boolean: Boolean,
    ) -> Result<Self> {
        let mut child = self.for_nested_where();
        child.spec.matches = self.spec.matches.clone();
        child.spec.columns = self.spec.columns.clone();
        child.spec.with = self.spec.with.clone();
        let query = f(child)?;
        Ok(self.add_nested_where_query(query, boolean))
    }

    /// Merges a finished child builder as a nested group.
    ///
    /// The child's matches, columns and carried elements replace the
    /// parent's; its bindings are merged, renamed first where they clash
    /// with keys the parent already binds. A child without predicates
    /// contributes nothing.
    pub fn add_nested_where_query(mut self, query: Builder, boolean: Boolean) -> Self {
        if query.spec.wheres.is_empty() {
            return self;
        }
        let mut child = query.spec;
        child.rekey(&self.spec.used_keys());
        self.spec.matches = std::mem::take(&mut child.matches);
        self.spec.columns = child.columns.take();
        self.spec.with = std::mem::take(&mut child.with);
        self.spec
            .bindings
            .merge_from(std::mem::take(&mut child.bindings));
        self.spec.wheres.push(Predicate::Nested {
            query: Box::new(child),
            boolean,
        });
        self
    }


    /// `column <operator> (sub-query)`.
    pub fn where_sub(
        self,
        column: &str,
        operator: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_sub(column, operator, f, Boolean::And)
    }

    pub fn or_where_sub(
        self,
        column: &str,
        operator: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_sub(column, operator, f, Boolean::Or)
    }

    fn add_sub(
        mut self,
        column: &str,
        operator: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
        boolean: Boolean,
    ) -> Result<Self> {
        let operator = operator
            .parse::<Operator>()
            .map_err(|token| QueryBuilderError::invalid_predicate(column, token))?;
        let child = self.take_child(f)?;
        let column = self.normalize_identity_column(column);
        self.spec.wheres.push(Predicate::Sub {
            column,
            operator,
            query: Box::new(child),
            boolean,
        });
        Ok(self)
    }

    pub fn where_exists(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_exists(f, Boolean::And, false)
    }

    pub fn or_where_exists(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_exists(f, Boolean::Or, false)
    }

    pub fn where_not_exists(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_exists(f, Boolean::And, true)
    }

    pub fn or_where_not_exists(self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<Self> {
        self.add_exists(f, Boolean::Or, true)
    }

    fn add_exists(
        mut self,
        f: impl FnOnce(Builder) -> Result<Builder>,
        boolean: Boolean,
        negated: bool,
    ) -> Result<Self> {
        let query = Box::new(self.take_child(f)?);
        self.spec.wheres.push(if negated {
            Predicate::NotExists { query, boolean }
        } else {
            Predicate::Exists { query, boolean }
        });
        Ok(self)
    }

    /// Runs `f` on a child builder and moves its bindings up; the child spec
    /// is returned for embedding.
    fn take_child(&mut self, f: impl FnOnce(Builder) -> Result<Builder>) -> Result<QuerySpec> {
        let mut child = f(self.child_query())?.spec;
        child.rekey(&self.spec.used_keys());
        self.spec
            .bindings
            .merge_from(std::mem::take(&mut child.bindings));
        Ok(child)
    }


    pub fn where_in(self, column: &str, values: Vec<Value>) -> Self {
        self.add_where_in(column, values, Boolean::And, false)
    }

    pub fn or_where_in(self, column: &str, values: Vec<Value>) -> Self {
        self.add_where_in(column, values, Boolean::Or, false)
    }

    pub fn where_not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.add_where_in(column, values, Boolean::And, true)
    }

    pub fn or_where_not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.add_where_in(column, values, Boolean::Or, true)
    }

    fn add_where_in(mut self, column: &str, values: Vec<Value>, boolean: Boolean, negated: bool) -> Self {
        let (column, values) = match self.normalize_identity(column, Operand::Value(Value::Array(values))) {
            (column, Operand::Value(Value::Array(values))) => (column, values),
            (column, _) => (column, Vec::new()),
        };
        let binding = self.spec.binding_key(&column);
        self.bind_where(&binding, Value::Array(values.clone()));
        let source = InSource::Values { values, binding };
        self.spec.wheres.push(if negated {
            Predicate::NotIn { column, source, boolean }
        } else {
            Predicate::In { column, source, boolean }
        });
        self
    }

    /// `column IN (sub-query)`.
    pub fn where_in_query(
        self,
        column: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_where_in_query(column, f, Boolean::And, false)
    }

    pub fn or_where_in_query(
        self,
        column: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_where_in_query(column, f, Boolean::Or, false)
    }

    pub fn where_not_in_query(
        self,
        column: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_where_in_query(column, f, Boolean::And, true)
    }

    pub fn or_where_not_in_query(
        self,
        column: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
    ) -> Result<Self> {
        self.add_where_in_query(column, f, Boolean::Or, true)
    }

    fn add_where_in_query(
        mut self,
        column: &str,
        f: impl FnOnce(Builder) -> Result<Builder>,
        boolean: Boolean,
        negated: bool,
    ) -> Result<Self> {
        let source = InSource::Query(Box::new(self.take_child(f)?));
        let column = self.normalize_identity_column(column);
        self.spec.wheres.push(if negated {
            Predicate::NotIn { column, source, boolean }
        } else {
            Predicate::In { column, source, boolean }
        });
        Ok(self)
    }


    pub fn where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.add_between(column, low.into(), high.into(), Boolean::And, false)
    }

    pub fn or_where_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.add_between(column, low.into(), high.into(), Boolean::Or, false)
    }

    pub fn where_not_between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.add_between(column, low.into(), high.into(), Boolean::And, true)
    }

    pub fn or_where_not_between(
        self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.add_between(column, low.into(), high.into(), Boolean::Or, true)
    }

    fn add_between(
        mut self,
        column: &str,
        low: Value,
        high: Value,
        boolean: Boolean,
        negated: bool,
    ) -> Self {
        let pair = Operand::Value(Value::Array(vec![low, high]));
        let (column, low, high) = match self.normalize_identity(column, pair) {
            (column, Operand::Value(Value::Array(mut pair))) if pair.len() == 2 => {
                let high = pair.pop().unwrap_or(Value::Null);
                let low = pair.pop().unwrap_or(Value::Null);
                (column, low, high)
            }
            (column, _) => (column, Value::Null, Value::Null),
        };
        let binding = self.spec.binding_key(&column);
        self.bind_where(&binding, Value::Array(vec![low.clone(), high.clone()]));
        self.spec.wheres.push(if negated {
            Predicate::NotBetween { column, low, high, binding, boolean }
        } else {
            Predicate::Between { column, low, high, binding, boolean }
        });
        self
    }

    pub fn where_null(self, column: &str) -> Self {
        self.add_where_null(column, Boolean::And, false)
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.add_where_null(column, Boolean::Or, false)
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.add_where_null(column, Boolean::And, true)
    }

    pub fn or_where_not_null(self, column: &str) -> Self {
        self.add_where_null(column, Boolean::Or, true)
    }

    fn add_where_null(mut self, column: &str, boolean: Boolean, negated: bool) -> Self {
        let column = self.normalize_identity_column(column);
        self.spec.wheres.push(if negated {
            Predicate::NotNull { column, boolean }
        } else {
            Predicate::Null { column, boolean }
        });
        self
    }


    pub fn where_date(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Date, column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_date(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Date, column, operator, value.into(), Boolean::Or)
    }

    pub fn where_time(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Time, column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_time(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Time, column, operator, value.into(), Boolean::Or)
    }

    pub fn where_day(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Day, column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_day(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Day, column, operator, value.into(), Boolean::Or)
    }

    pub fn where_month(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Month, column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_month(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Month, column, operator, value.into(), Boolean::Or)
    }

    pub fn where_year(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Year, column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_year(self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_part(DatePart::Year, column, operator, value.into(), Boolean::Or)
    }

    fn add_date_part(
        mut self,
        part: DatePart,
        column: &str,
        operator: &str,
        value: Operand,
        boolean: Boolean,
    ) -> Result<Self> {
        let (operator, value) = match operator.parse::<Operator>() {
            Ok(operator) if !operator.accepts_null() && value.is_null() => {
                return Err(QueryBuilderError::invalid_predicate(column, operator.as_str()));
            }
            Ok(operator) => (operator, value),
            Err(token) => (Operator::Equal, Operand::Value(Value::String(token))),
        };
        let binding = self.spec.binding_key(column);
        if let Operand::Value(bound) = &value {
            self.bind_where(&binding, bound.clone());
        }
        self.spec.wheres.push(Predicate::DatePart {
            part,
            column: column.to_string(),
            operator,
            value,
            binding,
            boolean,
        });
        Ok(self)
    }

    /// Compares against a timestamp formatted with the Grammar's date format.
    pub fn where_datetime(self, column: &str, operator: &str, value: NaiveDateTime) -> Result<Self> {
        let formatted = value.format(self.grammar.date_format()).to_string();
        self.add_where(column, Some(operator), Operand::Value(Value::String(formatted)), Boolean::And)
    }


    /// Compares a property with an identifier carried from a previous clause.
    pub fn where_carried(mut self, column: &str, operator: Operator, identifier: &str) -> Self {
        let column = self.normalize_identity_column(column);
        self.spec.wheres.push(Predicate::Carried {
            column,
            operator,
            value: identifier.to_string(),
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_raw(self, sql: &str, bindings: Map<String, Value>) -> Self {
        self.add_raw(sql, bindings, Boolean::And)
    }

    pub fn or_where_raw(self, sql: &str, bindings: Map<String, Value>) -> Self {
        self.add_raw(sql, bindings, Boolean::Or)
    }

    fn add_raw(mut self, sql: &str, bindings: Map<String, Value>, boolean: Boolean) -> Self {
        self.spec.wheres.push(Predicate::Raw {
            sql: sql.to_string(),
            boolean,
        });
        if !bindings.is_empty() {
            self.spec
                .bindings
                .add(Value::Object(bindings), BindingCategory::Where);
        }
        self
    }
}

fn where_all(mut query: Builder, values: Map<String, Value>) -> Result<Builder> {
    for (column, value) in values {
        query = query.where_eq(&column, value)?;
    }
    Ok(query)
}
