//! Builder scenarios against the Cypher grammar and a mocked connection.

mod common;
mod test_aggregates;
mod test_dynamic_where;
mod test_mutations;
mod test_relations;
mod test_select;
