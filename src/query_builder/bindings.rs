//! Categorised parameter bindings.
//!
//! Every value a query needs at execution time lives in exactly one category.
//! Within a category, named bindings form an ordered map whose keys are the
//! placeholder names the Grammar renders; anonymous (scalar) bindings are kept
//! in a positional list. `flatten` collapses all categories into the single
//! parameter map handed to the connection.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{errors::QueryBuilderError, placeholder::strip_qualifier};

/// Declaration order is the canonical flatten order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum BindingCategory {
    Matches,
    Select,
    Join,
    Where,
    Having,
    Order,
    Union,
}

impl BindingCategory {
    pub const ALL: [BindingCategory; 7] = [
        BindingCategory::Matches,
        BindingCategory::Select,
        BindingCategory::Join,
        BindingCategory::Where,
        BindingCategory::Having,
        BindingCategory::Order,
        BindingCategory::Union,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BindingCategory::Matches => "matches",
            BindingCategory::Select => "select",
            BindingCategory::Join => "join",
            BindingCategory::Where => "where",
            BindingCategory::Having => "having",
            BindingCategory::Order => "order",
            BindingCategory::Union => "union",
        }
    }
}

impl FromStr for BindingCategory {
    type Err = QueryBuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" | "matches" => Ok(BindingCategory::Matches),
            "select" => Ok(BindingCategory::Select),
            "join" => Ok(BindingCategory::Join),
            "where" | "predicate" => Ok(BindingCategory::Where),
            "having" => Ok(BindingCategory::Having),
            "order" => Ok(BindingCategory::Order),
            "union" => Ok(BindingCategory::Union),
            other => Err(QueryBuilderError::InvalidBindingCategory(other.to_string())),
        }
    }
}

impl fmt::Display for BindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bindings of a single category.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct CategoryBindings {
    pub keyed: Map<String, Value>,
    pub positional: Vec<Value>,
}

impl CategoryBindings {
    pub fn is_empty(&self) -> bool {
        self.keyed.is_empty() && self.positional.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyed.len() + self.positional.len()
    }

    fn merge_from(&mut self, other: CategoryBindings) {
        for (key, incoming) in other.keyed {
            match (self.keyed.get_mut(&key), incoming) {
                (Some(Value::Array(existing)), Value::Array(items)) => existing.extend(items),
                (_, incoming) => {
                    self.keyed.insert(key, incoming);
                }
            }
        }
        self.positional.extend(other.positional);
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct BindingTable {
    categories: BTreeMap<BindingCategory, CategoryBindings>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding.
    ///
    /// A single-entry object is a named binding; its key loses any
    /// `qualifier.` prefix so that `{"user.name": v}` lands under `name`.
    /// Multi-entry objects insert every entry as given. Anything else is an
    /// anonymous binding appended to the positional list.
    pub fn add(&mut self, value: Value, category: BindingCategory) {
        let bindings = self.categories.entry(category).or_default();
        match value {
            Value::Object(map) if map.len() == 1 => {
                for (key, value) in map {
                    let key = strip_qualifier(&key).to_string();
                    log::trace!("binding {}.{} registered", category, key);
                    bindings.keyed.insert(key, value);
                }
            }
            Value::Object(map) => {
                for (key, value) in map {
                    bindings.keyed.insert(key, value);
                }
            }
            other => bindings.positional.push(other),
        }
    }

    /// Same as [`BindingTable::add`] with a textual category name.
    pub fn add_named(&mut self, value: Value, category: &str) -> Result<(), QueryBuilderError> {
        let category = category.parse::<BindingCategory>()?;
        self.add(value, category);
        Ok(())
    }

    pub fn get(&self, category: BindingCategory) -> Option<&CategoryBindings> {
        self.categories.get(&category)
    }

    /// Replaces a category wholesale.
    pub fn set(&mut self, category: BindingCategory, bindings: CategoryBindings) {
        if bindings.is_empty() {
            self.categories.remove(&category);
        } else {
            self.categories.insert(category, bindings);
        }
    }

    /// Removes and returns a category, leaving it empty.
    pub fn take(&mut self, category: BindingCategory) -> CategoryBindings {
        self.categories.remove(&category).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(CategoryBindings::is_empty)
    }

    /// True when any category holds a named binding under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.categories
            .values()
            .any(|bindings| bindings.keyed.contains_key(key))
    }

    /// Named binding keys across all categories.
    pub fn keys(&self) -> impl Iterator<Item = &String> + '_ {
        self.categories
            .values()
            .flat_map(|bindings| bindings.keyed.keys())
    }

    /// Moves a named binding to a new key within one category.
    pub fn rename(&mut self, category: BindingCategory, from: &str, to: &str) {
        if let Some(bindings) = self.categories.get_mut(&category) {
            if let Some(value) = bindings.keyed.remove(from) {
                log::trace!("binding {}.{} renamed to {}", category, from, to);
                bindings.keyed.insert(to.to_string(), value);
            }
        }
    }

    /// Merges every category of `other` into this table.
    pub fn merge_from(&mut self, other: BindingTable) {
        for (category, bindings) in other.categories {
            self.categories
                .entry(category)
                .or_default()
                .merge_from(bindings);
        }
    }

    /// Collapses all categories into one parameter map.
    ///
    /// Categories are visited in canonical order (matches, select, join,
    /// where, having, order, union). A key present in several categories
    /// resolves to the value from the last one visited. Positional values are
    /// keyed by their running ordinal.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut flat = Map::new();
        let mut ordinal = 0usize;
        for category in BindingCategory::ALL {
            let Some(bindings) = self.categories.get(&category) else {
                continue;
            };
            for (key, value) in &bindings.keyed {
                if let Some(previous) = flat.insert(key.clone(), value.clone()) {
                    if previous != *value {
                        log::warn!(
                            "binding '{}' from {} overrides an earlier category value",
                            key,
                            category
                        );
                    }
                }
            }
            for value in &bindings.positional {
                flat.insert(ordinal.to_string(), value.clone());
                ordinal += 1;
            }
        }
        flat
    }
}
