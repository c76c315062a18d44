//! Predicates derived from method names.

#[cfg(test)]
mod dynamic_where_tests {
    use neoquery::QueryBuilderError;
    use serde_json::json;
    use test_case::test_case;

    use crate::common::*;

    #[test]
    fn test_call_builds_connected_equalities() {
        let query = users()
            .call(
                "whereNameAndAgeOrEmail",
                vec![json!("Ada"), json!(36), json!("ada@example.com")],
            )
            .unwrap();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) WHERE user.name = $name AND user.age = $age OR user.email = $email RETURN user"
        );
        let bindings = query.get_bindings();
        assert_eq!(bindings.get("name"), Some(&json!("Ada")));
        assert_eq!(bindings.get("age"), Some(&json!(36)));
        assert_eq!(bindings.get("email"), Some(&json!("ada@example.com")));
    }

    #[test]
    fn test_connector_inside_a_column_name() {
        let query = users()
            .call("whereOrderIdAndBrand", vec![json!(4), json!("acme")])
            .unwrap();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) WHERE user.order_id = $order_id AND user.brand = $brand RETURN user"
        );
    }

    #[test]
    fn test_too_few_arguments() {
        let result = users().call("whereNameAndAge", vec![json!("Ada")]);
        assert!(matches!(
            result,
            Err(QueryBuilderError::DynamicArgumentCount { expected: 2, given: 1, .. })
        ));
    }

    #[test_case("orderByName" ; "not a where method")]
    #[test_case("where" ; "bare prefix")]
    #[test_case("wherename" ; "lowercase column")]
    fn test_unsupported_methods(method: &str) {
        let result = users().call(method, vec![json!(1)]);
        assert!(matches!(
            result,
            Err(QueryBuilderError::UnsupportedOperation(name)) if name == method
        ));
    }
}
