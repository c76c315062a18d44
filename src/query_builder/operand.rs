use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a predicate combines with the one before it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "AND",
            Boolean::Or => "OR",
        }
    }
}

/// The fixed operator set accepted by `where`-style predicates.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Operator {
    // comparison
    Equal,
    NotEqual,
    NotEqualBang,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    // arithmetic
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Exponentiation,
    // string matching
    Like,
    NotLike,
    ILike,
    Regex,
    StartsWith,
    EndsWith,
    Contains,
    // null checks
    IsNull,
    IsNotNull,
    // boolean
    And,
    Or,
    Xor,
    Not,
    // membership
    In,
    NotIn,
    // collection index / slice markers
    Index,
    SliceFrom,
    SliceTo,
    Slice,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::NotEqualBang => "!=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::ModuloDivision => "%",
            Operator::Exponentiation => "^",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::Regex => "=~",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::Contains => "contains",
            Operator::IsNull => "is null",
            Operator::IsNotNull => "is not null",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Xor => "xor",
            Operator::Not => "not",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Index => "[x]",
            Operator::SliceFrom => "[x..]",
            Operator::SliceTo => "[..x]",
            Operator::Slice => "[x..x]",
        }
    }

    /// Operators that may legitimately be paired with a null value.
    pub fn accepts_null(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::NotEqualBang
                | Operator::IsNull
                | Operator::IsNotNull
        )
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    /// True when a null comparison with this operator means "is null".
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Equal | Operator::IsNull)
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let operator = match normalized.as_str() {
            "=" => Operator::Equal,
            "<>" => Operator::NotEqual,
            "!=" => Operator::NotEqualBang,
            "<" => Operator::LessThan,
            ">" => Operator::GreaterThan,
            "<=" => Operator::LessThanEqual,
            ">=" => Operator::GreaterThanEqual,
            "+" => Operator::Addition,
            "-" => Operator::Subtraction,
            "*" => Operator::Multiplication,
            "/" => Operator::Division,
            "%" => Operator::ModuloDivision,
            "^" => Operator::Exponentiation,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "=~" | "regexp" => Operator::Regex,
            "starts with" => Operator::StartsWith,
            "ends with" => Operator::EndsWith,
            "contains" => Operator::Contains,
            "is null" => Operator::IsNull,
            "is not null" => Operator::IsNotNull,
            "and" => Operator::And,
            "or" => Operator::Or,
            "xor" => Operator::Xor,
            "not" => Operator::Not,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            "[x]" => Operator::Index,
            "[x..]" => Operator::SliceFrom,
            "[..x]" => Operator::SliceTo,
            "[x..x]" | "[x..y]" => Operator::Slice,
            _ => return Err(s.to_string()),
        };
        Ok(operator)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw query text that is inlined verbatim and never bound as a parameter.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Expression(pub String);

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Expression(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Right-hand side of a predicate or an update assignment.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    Expression(Expression),
}

impl Operand {
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(value) => Some(value),
            Operand::Expression(_) => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Expression> for Operand {
    fn from(expression: Expression) -> Self {
        Operand::Expression(expression)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        Operand::Value(value.map_or(Value::Null, Into::into))
    }
}

impl From<Vec<Value>> for Operand {
    fn from(values: Vec<Value>) -> Self {
        Operand::Value(Value::Array(values))
    }
}

macro_rules! operand_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(value: $t) -> Self {
                    Operand::Value(Value::from(value))
                }
            }
        )*
    };
}

operand_from_scalar!(i32, i64, u32, u64, f64, bool, String, &str);

impl From<NaiveDate> for Operand {
    fn from(date: NaiveDate) -> Self {
        Operand::Value(Value::String(date.format("%Y-%m-%d").to_string()))
    }
}

impl From<NaiveDateTime> for Operand {
    fn from(datetime: NaiveDateTime) -> Self {
        Operand::Value(Value::String(
            datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ))
    }
}

/// Target label set of a query. Order is significant for node references.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct Labels(pub Vec<String>);

impl Labels {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels(vec![label.to_string()])
    }
}

impl From<String> for Labels {
    fn from(label: String) -> Self {
        Labels(vec![label])
    }
}

impl From<Vec<String>> for Labels {
    fn from(labels: Vec<String>) -> Self {
        Labels(labels)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(labels: Vec<&str>) -> Self {
        Labels(labels.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Labels {
    fn from(labels: &[&str]) -> Self {
        Labels(labels.iter().map(|l| l.to_string()).collect())
    }
}
