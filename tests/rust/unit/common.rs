use std::sync::Arc;

use mockall::mock;
use neoquery::{
    Builder, BuilderConfig, Connection, ConnectionError, CypherGrammar, Parameters, Row,
};
use serde_json::{Map, Value};

mock! {
    pub Store {}

    impl Connection for Store {
        fn select(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;
        fn insert(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;
        fn update(&self, query: &str, parameters: &Parameters) -> Result<u64, ConnectionError>;
        fn delete(&self, query: &str, parameters: &Parameters) -> Result<u64, ConnectionError>;
        fn statement(&self, query: &str, parameters: &Parameters) -> Result<Vec<Row>, ConnectionError>;
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn builder(store: MockStore) -> Builder {
    init_logger();
    Builder::new(Arc::new(CypherGrammar::new()), Arc::new(store))
}

pub fn builder_with_config(store: MockStore, config: BuilderConfig) -> Builder {
    init_logger();
    Builder::with_config(
        Arc::new(CypherGrammar::from_config(&config)),
        Arc::new(store),
        config,
    )
}

/// Builder over `User` whose connection must never be called.
pub fn users() -> Builder {
    builder(MockStore::new()).from("User")
}

/// Store answering exactly one `select` of `expected`, with `rows`.
pub fn select_once(expected: &str, rows: Vec<Value>) -> MockStore {
    let expected = expected.to_string();
    let rows: Vec<Row> = rows.into_iter().map(object).collect();
    let mut store = MockStore::new();
    store
        .expect_select()
        .withf(move |query, _| query == expected)
        .times(1)
        .returning(move |_, _| Ok(rows.clone()));
    store
}
