//! Placeholder naming.
//!
//! Binding keys must be unique per query even when the same property is
//! filtered several times, and they must line up with the placeholders the
//! Grammar renders. All key derivation lives here so the builder and the
//! Grammar never disagree:
//!
//! - `disambiguate`: `age`, `age_2`, `age_3`, ... in insertion order,
//!   skipping any key already taken
//! - `prefixed`: optional lower-cased label prefix, never for `id(...)`
//! - `node_reference`: canonical pattern variable for a label set
//! - `parameter_key`: Cypher-safe parameter name (`id(user)` → `iduser`)

use lazy_static::lazy_static;
use regex::Regex;

use super::{operand::Labels, predicate::Predicate};

lazy_static! {
    static ref IDENTITY_REFERENCE: Regex =
        Regex::new(r"(?i)^\s*id\s*\(\s*([A-Za-z0-9_]*)\s*\)\s*$").unwrap();
    static ref IDENTITY_CALL: Regex = Regex::new(r"(?i)id\s*\(\s*([A-Za-z0-9_]*)\s*\)").unwrap();
    static ref NON_PARAMETER_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_]").unwrap();
}

/// Node reference used when a query has no target label.
pub const DEFAULT_NODE_REFERENCE: &str = "n";

/// True for graph identity references such as `id(n)` or `ID( user )`.
pub fn is_identity_reference(column: &str) -> bool {
    IDENTITY_REFERENCE.is_match(column)
}

/// Canonical pattern variable for a label set: labels lower-cased and joined
/// with `_`. The same labels always yield the same variable.
pub fn node_reference(labels: &[String]) -> String {
    if labels.is_empty() {
        return DEFAULT_NODE_REFERENCE.to_string();
    }
    labels
        .iter()
        .map(|label| label.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `User.name` → `name`. Identity references are returned untouched since
/// their parentheses may enclose anything.
pub fn strip_qualifier(column: &str) -> &str {
    if is_identity_reference(column) {
        return column;
    }
    match column.rfind('.') {
        Some(pos) => &column[pos + 1..],
        None => column,
    }
}

/// Number of predicates in `wheres` that constrain `column`.
///
/// Columns are compared after qualifier stripping, since `User.name` and
/// `name` end up under the same binding key.
pub fn column_count(wheres: &[Predicate], column: &str) -> usize {
    let target = strip_qualifier(column);
    wheres
        .iter()
        .filter_map(Predicate::column)
        .filter(|existing| strip_qualifier(existing) == target)
        .count()
}

/// `column` for the first use, `column_<n>` for the n-th. The ordinal keeps
/// rising while `is_taken` reports the candidate as used.
pub fn disambiguate(wheres: &[Predicate], column: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = strip_qualifier(column);
    let mut ordinal = column_count(wheres, column) + 1;
    loop {
        let key = ordinal_key(base, ordinal);
        if !is_taken(&key) {
            return key;
        }
        ordinal += 1;
    }
}

fn ordinal_key(base: &str, ordinal: usize) -> String {
    if ordinal > 1 {
        format!("{}_{}", base, ordinal)
    } else {
        base.to_string()
    }
}

/// Prepends the lower-cased label prefix unless the column is an identity
/// reference.
pub fn prefixed(prefix: Option<&Labels>, column: &str, key: String) -> String {
    match prefix {
        Some(labels) if !labels.is_empty() && !is_identity_reference(column) => {
            format!("{}_{}", node_reference(labels.as_slice()), key)
        }
        _ => key,
    }
}

/// Binding key for a new predicate on `column`, unique against `is_taken`
/// after prefixing.
pub fn binding_key(
    wheres: &[Predicate],
    prefix: Option<&Labels>,
    column: &str,
    is_taken: impl Fn(&str) -> bool,
) -> String {
    let key = disambiguate(wheres, column, |candidate| {
        is_taken(&prefixed(prefix, column, candidate.to_string()))
    });
    prefixed(prefix, column, key)
}

/// First `key_<n>` (n >= 2) for which `is_taken` is false.
pub fn next_free_key(key: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let mut ordinal = 2;
    loop {
        let candidate = ordinal_key(key, ordinal);
        if !is_taken(&candidate) {
            return candidate;
        }
        ordinal += 1;
    }
}

/// Rewrites a binding key into a valid Cypher parameter name.
///
/// `id(user)` becomes `iduser`, `id(user)_2` becomes `iduser_2`; any other
/// character outside `[A-Za-z0-9_]` is replaced by `_`.
pub fn parameter_key(key: &str) -> String {
    let rewritten = IDENTITY_CALL.replace_all(key, "id$1");
    NON_PARAMETER_CHARS.replace_all(&rewritten, "_").into_owned()
}

/// Key under which a parent/child property of a relation match is bound.
pub fn match_binding_key(node: &str, property: &str) -> String {
    if property == "id" || is_identity_reference(property) {
        format!("id({})", node)
    } else {
        strip_qualifier(property).to_string()
    }
}

/// Keys used by a create-with statement.
pub fn create_attribute_key(node: &str, attribute: &str) -> String {
    format!("{}_{}", node, attribute)
}

pub fn related_attribute_key(relation: &str, index: usize, attribute: &str) -> String {
    format!("{}_{}_{}", relation, index, attribute)
}

pub fn attach_key(relation: &str) -> String {
    format!("{}_ids", relation)
}
