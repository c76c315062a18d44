//! Aggregates, pagination counts, paginators and chunking.

#[cfg(test)]
mod aggregate_tests {
    use std::cell::RefCell;

    use neoquery::{
        query_builder::{OrderDirection, SelectItem},
        ConnectionError, QueryBuilderError,
    };
    use serde_json::{json, Map};

    use crate::common::*;

    #[test]
    fn test_count() {
        let store = select_once(
            "MATCH (user:User) WHERE user.age > $age RETURN count(user) AS aggregate",
            vec![json!({"aggregate": 42})],
        );
        let mut query = builder(store).from("User").where_("age", ">", 18).unwrap();
        assert_eq!(query.count().unwrap(), 42);
        assert!(query.spec().aggregate.is_none());
        assert!(query.spec().columns.is_none());
    }

    #[test]
    fn test_aggregate_restores_selected_columns() {
        let store = select_once(
            "MATCH (user:User) RETURN max(user.age) AS aggregate",
            vec![json!({"aggregate": 70})],
        );
        let mut query = builder(store).from("User").select(&["name"]);
        assert_eq!(query.max("age").unwrap(), json!(70));
        assert_eq!(
            query.spec().columns,
            Some(vec![SelectItem::Column("name".to_string())])
        );
    }

    #[test]
    fn test_percentile_and_distinct_count() {
        let store = select_once(
            "MATCH (user:User) RETURN percentileDisc(user.age, 0.9) AS aggregate",
            vec![json!({"aggregate": 61})],
        );
        let mut query = builder(store).from("User");
        assert_eq!(query.percentile_disc("age", 0.9).unwrap(), json!(61));

        let store = select_once(
            "MATCH (user:User) RETURN count(DISTINCT user.city) AS aggregate",
            vec![json!({"aggregate": 4})],
        );
        let mut query = builder(store).from("User");
        assert_eq!(query.count_distinct(&["city"]).unwrap(), 4);
    }

    #[test]
    fn test_collect_returns_the_list() {
        let store = select_once(
            "MATCH (user:User) RETURN collect(user.name) AS aggregate",
            vec![json!({"aggregate": ["Ada", "Grace"]})],
        );
        let mut query = builder(store).from("User");
        assert_eq!(query.collect("name").unwrap(), json!(["Ada", "Grace"]));
    }

    #[test]
    fn test_aggregate_on_empty_result_is_null() {
        let store = select_once("MATCH (user:User) RETURN avg(user.age) AS aggregate", vec![]);
        let mut query = builder(store).from("User");
        assert!(query.avg("age").unwrap().is_null());
    }

    #[test]
    fn test_count_for_pagination_scenario() {
        let store = select_once(
            "MATCH (user:User) WHERE user.age > $age RETURN count(user) AS aggregate",
            vec![json!({"aggregate": 37})],
        );
        let mut query = builder(store)
            .from("User")
            .select(&["name"])
            .select_raw("user.age * 2 AS double_age", Map::from_iter([(
                "factor".to_string(),
                json!(2),
            )]))
            .where_("age", ">", 18)
            .unwrap()
            .order_by_raw("user.name", Map::from_iter([("dir".to_string(), json!("asc"))]))
            .order_by("age", OrderDirection::Desc)
            .skip(30)
            .take(15);
        let before = query.spec().clone();

        assert_eq!(query.count_for_pagination().unwrap(), 37);
        assert_eq!(query.spec(), &before);
    }

    #[test]
    fn test_count_for_pagination_restores_state_on_error() {
        let mut store = MockStore::new();
        store
            .expect_select()
            .times(1)
            .returning(|_, _| Err(ConnectionError::Query("boom".to_string())));
        let mut query = builder(store)
            .from("User")
            .select(&["name"])
            .order_by("name", OrderDirection::Asc)
            .take(10);
        let before = query.spec().clone();

        let result = query.count_for_pagination();
        assert_eq!(
            result,
            Err(QueryBuilderError::Connection(ConnectionError::Query(
                "boom".to_string()
            )))
        );
        assert_eq!(query.spec(), &before);
    }

    #[test]
    fn test_grouped_count_for_pagination_counts_rows() {
        let store = select_once(
            "MATCH (user:User) RETURN user.city AS city, count(user) AS aggregate",
            vec![
                json!({"city": "Oslo", "aggregate": 2}),
                json!({"city": "Rome", "aggregate": 5}),
                json!({"city": "Lima", "aggregate": 1}),
            ],
        );
        let mut query = builder(store).from("User").group_by(&["city"]);
        assert_eq!(query.count_for_pagination().unwrap(), 3);
    }

    #[test]
    fn test_paginate() {
        let mut store = MockStore::new();
        store
            .expect_select()
            .withf(|query, _| query == "MATCH (user:User) RETURN count(user) AS aggregate")
            .times(1)
            .returning(|_, _| Ok(vec![object(json!({"aggregate": 5}))]));
        store
            .expect_select()
            .withf(|query, _| {
                query == "MATCH (user:User) RETURN user ORDER BY user.name ASC SKIP 2 LIMIT 2"
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    object(json!({"user": {"name": "C"}})),
                    object(json!({"user": {"name": "D"}})),
                ])
            });

        let query = builder(store)
            .from("User")
            .order_by("name", OrderDirection::Asc);
        let page = query.paginate(Some(2), 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.per_page, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.items.len(), 2);
        assert!(query.spec().limit.is_none());
    }

    #[test]
    fn test_paginate_skips_items_query_when_empty() {
        let store = select_once(
            "MATCH (user:User) RETURN count(user) AS aggregate",
            vec![json!({"aggregate": 0})],
        );
        let page = builder(store).from("User").paginate(None, 1).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.per_page, 15);
        assert_eq!(page.last_page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_simple_paginate_fetches_one_extra() {
        let store = select_once(
            "MATCH (user:User) RETURN user SKIP 0 LIMIT 3",
            vec![json!({"user": 1}), json!({"user": 2}), json!({"user": 3})],
        );
        let page = builder(store)
            .from("User")
            .simple_paginate(Some(2), 1)
            .unwrap();
        assert!(page.has_more);
        assert_eq!(page.items.len(), 2);
    }

    #[test]
    fn test_simple_paginate_saturates_window() {
        let store = select_once(
            "MATCH (user:User) RETURN user SKIP 18446744073709551615 LIMIT 18446744073709551615",
            vec![json!({"user": 1})],
        );
        let page = builder(store)
            .from("User")
            .simple_paginate(Some(u64::MAX), 3)
            .unwrap();
        assert!(!page.has_more);
        assert_eq!(page.items.len(), 1);
    }

    fn paged_store() -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_select()
            .withf(|query, _| query.ends_with("SKIP 0 LIMIT 2"))
            .returning(|_, _| Ok(vec![object(json!({"user": 1})), object(json!({"user": 2}))]));
        store
            .expect_select()
            .withf(|query, _| query.ends_with("SKIP 2 LIMIT 2"))
            .returning(|_, _| Ok(vec![object(json!({"user": 3}))]));
        store
            .expect_select()
            .withf(|query, _| query.ends_with("SKIP 4 LIMIT 2"))
            .returning(|_, _| Ok(vec![]));
        store
    }

    #[test]
    fn test_chunk_visits_every_page() {
        let seen = RefCell::new(Vec::new());
        let completed = builder(paged_store())
            .from("User")
            .chunk(2, |rows, page| {
                seen.borrow_mut().push((page, rows.len()));
                true
            })
            .unwrap();
        assert!(completed);
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_chunk_stops_when_callback_declines() {
        let mut pages = 0;
        let completed = builder(paged_store())
            .from("User")
            .chunk(2, |_, _| {
                pages += 1;
                false
            })
            .unwrap();
        assert!(!completed);
        assert_eq!(pages, 1);
    }
}
