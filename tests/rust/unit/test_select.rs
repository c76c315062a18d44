//! Projection, ordering, grouping, unions and fetch helpers.

#[cfg(test)]
mod select_tests {
    use neoquery::query_builder::{OrderDirection, SubSource};
    use serde_json::{json, Map};

    use crate::common::*;

    #[test]
    fn test_select_all_returns_node() {
        assert_eq!(users().to_cypher(), "MATCH (user:User) RETURN user");
    }

    #[test]
    fn test_select_columns_and_distinct() {
        let query = users().select(&["name", "email"]).distinct();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) RETURN DISTINCT user.name AS name, user.email AS email"
        );
    }

    #[test]
    fn test_multi_label_node_reference() {
        let query = builder(MockStore::new()).from(vec!["User", "Admin"]);
        assert_eq!(query.node_reference(), "user_admin");
        assert_eq!(
            query.to_cypher(),
            "MATCH (user_admin:User:Admin) RETURN user_admin"
        );
    }

    #[test]
    fn test_no_label_uses_default_reference() {
        let query = builder(MockStore::new());
        assert_eq!(query.to_cypher(), "MATCH (n) RETURN n");
    }

    #[test]
    fn test_order_skip_limit() {
        let query = users()
            .order_by("name", OrderDirection::Asc)
            .order_by_desc("age")
            .for_page(3, 10);
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) RETURN user ORDER BY user.name ASC, user.age DESC SKIP 20 LIMIT 10"
        );
    }

    #[test]
    fn test_for_page_saturates_offset() {
        let query = users().for_page(u64::MAX, u64::MAX);
        assert_eq!(query.spec().offset, Some(u64::MAX));
        assert_eq!(query.spec().limit, Some(u64::MAX));
    }

    #[test]
    fn test_group_by_with_having() {
        let query = users()
            .select_raw("count(user) AS total", Map::new())
            .group_by(&["city"])
            .having("total", ">", 3);
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) WITH count(user) AS total, user.city AS city WHERE total > $having_total RETURN total, city"
        );
        assert_eq!(query.get_bindings().get("having_total"), Some(&json!(3)));
    }

    #[test]
    fn test_select_sub_binds_under_select() {
        let query = users()
            .select_sub(
                SubSource::closure(|q| q.from("Post").where_("views", ">", 10)),
                "popular",
            )
            .unwrap();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) RETURN COLLECT { MATCH (post:Post) WHERE post.views > $views RETURN post } AS popular"
        );
        let select = query
            .get_raw_bindings()
            .get(neoquery::query_builder::BindingCategory::Select)
            .unwrap();
        assert_eq!(select.keyed.get("views"), Some(&json!(10)));
    }

    #[test]
    fn test_sub_source_rejects_non_string_values() {
        let result = SubSource::try_from(json!(5));
        assert!(matches!(
            result,
            Err(neoquery::QueryBuilderError::InvalidSubQuerySource(source)) if source == "5"
        ));
        assert!(SubSource::try_from(json!("MATCH (n) RETURN n")).is_ok());
    }

    #[test]
    fn test_union_moves_bindings_and_orders() {
        let admins = users().new_query().from("Admin").where_eq("level", 2).unwrap();
        let query = users()
            .where_eq("name", "Ada")
            .unwrap()
            .union(admins)
            .order_by("name", OrderDirection::Asc)
            .limit(5);

        assert!(query.spec().orders.is_empty());
        assert_eq!(query.spec().limit, None);
        assert_eq!(
            query.to_cypher(),
            "CALL { MATCH (user:User) WHERE user.name = $name RETURN user UNION MATCH (admin:Admin) WHERE admin.level = $level RETURN admin } RETURN * ORDER BY name ASC LIMIT 5"
        );
        let bindings = query.get_bindings();
        assert_eq!(bindings.get("name"), Some(&json!("Ada")));
        assert_eq!(bindings.get("level"), Some(&json!(2)));
    }

    #[test]
    fn test_union_all_without_outer_clauses() {
        let admins = users().new_query().from("Admin");
        assert_eq!(
            users().union_all(admins).to_cypher(),
            "MATCH (user:User) RETURN user UNION ALL MATCH (admin:Admin) RETURN admin"
        );
    }

    #[test]
    fn test_lock_is_recorded_but_not_rendered() {
        let query = users().lock_for_update();
        assert_eq!(query.spec().lock, neoquery::query_builder::LockMode::Exclusive);
        assert_eq!(query.to_cypher(), "MATCH (user:User) RETURN user");
        assert_eq!(
            users().shared_lock().spec().lock,
            neoquery::query_builder::LockMode::Shared
        );
    }

    #[test]
    fn test_first_and_find() {
        let store = select_once(
            "MATCH (user:User) WHERE id(user) = $iduser RETURN user LIMIT 1",
            vec![json!({"user": {"name": "Ada"}})],
        );
        let found = builder(store).from("User").find(7).unwrap();
        assert_eq!(found, Some(object(json!({"user": {"name": "Ada"}}))));
    }

    #[test]
    fn test_find_passes_sanitised_parameters() {
        let mut store = MockStore::new();
        store
            .expect_select()
            .withf(|_, parameters| parameters.get("iduser") == Some(&json!(7)))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        assert_eq!(builder(store).from("User").find(7).unwrap(), None);
    }

    #[test]
    fn test_pluck_and_exists() {
        let store = select_once(
            "MATCH (user:User) RETURN user.name AS name",
            vec![json!({"name": "Ada"}), json!({"name": "Grace"})],
        );
        let names = builder(store).from("User").pluck("name").unwrap();
        assert_eq!(names, vec![json!("Ada"), json!("Grace")]);

        let store = select_once("MATCH (user:User) RETURN user LIMIT 1", vec![]);
        assert!(!builder(store).from("User").exists().unwrap());
    }

    #[test]
    fn test_connection_errors_propagate() {
        let mut store = MockStore::new();
        store
            .expect_select()
            .returning(|_, _| Err(neoquery::ConnectionError::Transport("refused".to_string())));
        let result = builder(store).from("User").get();
        assert_eq!(
            result,
            Err(neoquery::QueryBuilderError::Connection(
                neoquery::ConnectionError::Transport("refused".to_string())
            ))
        );
    }
}
