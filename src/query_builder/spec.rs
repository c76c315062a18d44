use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    bindings::{BindingCategory, BindingTable},
    operand::{Boolean, Labels, Operator},
    placeholder,
    predicate::Predicate,
    relations::MatchDescriptor,
};

/// One projected item.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum SelectItem {
    /// A property of the target node (or `*` for the node itself).
    Column(String),
    /// Verbatim projection text, e.g. a sub-query with its alias.
    Raw(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Order {
    Column {
        column: String,
        direction: OrderDirection,
    },
    Raw(String),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Having {
    Basic {
        column: String,
        operator: Operator,
        value: Value,
        binding: String,
        boolean: Boolean,
    },
    Raw {
        sql: String,
        boolean: Boolean,
    },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Union {
    pub query: Box<QuerySpec>,
    pub all: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum LockMode {
    #[default]
    None,
    Shared,
    Exclusive,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Min,
    Max,
    Sum,
    Avg,
    Collect,
    PercentileCont,
    PercentileDisc,
    StDev,
    StDevP,
}

impl AggregateFunction {
    /// Cypher function name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count | AggregateFunction::CountDistinct => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Collect => "collect",
            AggregateFunction::PercentileCont => "percentileCont",
            AggregateFunction::PercentileDisc => "percentileDisc",
            AggregateFunction::StDev => "stDev",
            AggregateFunction::StDevP => "stDevP",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient reduction installed in place of the row projection.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub label: Labels,
    pub function: AggregateFunction,
    pub columns: Vec<String>,
    pub percentile: Option<f64>,
}

/// The cumulative query specification.
///
/// Builder operations only ever append to or replace parts of this struct;
/// compilation is left entirely to the Grammar.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    pub from: Labels,
    /// `None` projects the whole node.
    pub columns: Option<Vec<SelectItem>>,
    pub distinct: bool,
    pub wheres: Vec<Predicate>,
    pub matches: Vec<MatchDescriptor>,
    pub groups: Vec<String>,
    pub havings: Vec<Having>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<Union>,
    pub union_orders: Vec<Order>,
    pub union_limit: Option<u64>,
    pub union_offset: Option<u64>,
    pub lock: LockMode,
    pub aggregate: Option<Aggregate>,
    /// Graph elements kept in scope across clause boundaries (`WITH`).
    pub with: Vec<String>,
    /// Label prefix applied to binding keys.
    pub prefix: Option<Labels>,
    pub bindings: BindingTable,
    /// Keys already used by an enclosing query; new keys avoid them.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub reserved_keys: BTreeSet<String>,
}

impl QuerySpec {
    pub fn new(from: impl Into<Labels>) -> Self {
        QuerySpec {
            from: from.into(),
            ..Default::default()
        }
    }

    /// Pattern variable of the target node.
    pub fn node_reference(&self) -> String {
        placeholder::node_reference(self.from.as_slice())
    }

    /// Binding key for a new predicate on `column`.
    pub fn binding_key(&self, column: &str) -> String {
        placeholder::binding_key(&self.wheres, self.prefix.as_ref(), column, |key| {
            self.is_key_taken(key)
        })
    }

    pub fn is_key_taken(&self, key: &str) -> bool {
        self.reserved_keys.contains(key) || self.bindings.contains_key(key)
    }

    /// Every key a child query must not reuse: this spec's bound keys plus
    /// those reserved by its own parents.
    pub fn used_keys(&self) -> BTreeSet<String> {
        self.reserved_keys
            .iter()
            .chain(self.bindings.keys())
            .cloned()
            .collect()
    }

    /// Renames predicate bindings found in `taken`, so this spec can be
    /// embedded in a query that already binds those keys.
    pub fn rekey(&mut self, taken: &BTreeSet<String>) {
        let bindings = &self.bindings;
        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        let mut rename = |key: &mut String| {
            if !taken.contains(key.as_str()) {
                return;
            }
            if let Some(fresh) = renames.get(key.as_str()) {
                *key = fresh.clone();
                return;
            }
            let fresh = placeholder::next_free_key(key, |candidate| {
                taken.contains(candidate)
                    || bindings.contains_key(candidate)
                    || renames.values().any(|used| used == candidate)
            });
            renames.insert(key.clone(), fresh.clone());
            *key = fresh;
        };
        for predicate in self.wheres.iter_mut() {
            predicate.visit_bindings_mut(&mut rename);
        }
        for (from, to) in renames {
            self.bindings.rename(BindingCategory::Where, &from, &to);
        }
    }

    pub fn has_unions(&self) -> bool {
        !self.unions.is_empty()
    }
}
