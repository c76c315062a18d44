//! Inserts, updates, deletes and label changes.

#[cfg(test)]
mod mutation_tests {
    use neoquery::{
        query_builder::{CreateWith, Direction, LabelOperation, RelatedPayload},
        ConnectionError, QueryBuilderError,
    };
    use serde_json::{json, Map};

    use crate::common::*;

    #[test]
    fn test_insert_nothing_is_a_no_op() {
        assert!(users().insert(vec![]).unwrap());
    }

    #[test]
    fn test_insert_single_row() {
        let mut store = MockStore::new();
        store
            .expect_insert()
            .withf(|query, parameters| {
                query == "CREATE (user:User {name: $name, age: $age}) RETURN id(user) AS id"
                    && parameters.get("name") == Some(&json!("Ada"))
                    && parameters.get("age") == Some(&json!(36))
            })
            .times(1)
            .returning(|_, _| Ok(vec![object(json!({"id": 1}))]));
        let inserted = builder(store)
            .from("User")
            .insert(vec![object(json!({"name": "Ada", "age": 36}))])
            .unwrap();
        assert!(inserted);
    }

    #[test]
    fn test_insert_many_rows_unwinds() {
        let mut store = MockStore::new();
        store
            .expect_insert()
            .withf(|query, parameters| {
                query == "UNWIND $rows AS row CREATE (user:User) SET user += row RETURN id(user) AS id"
                    && parameters.get("rows")
                        == Some(&json!([{"name": "Ada"}, {"name": "Grace"}]))
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        builder(store)
            .from("User")
            .insert(vec![object(json!({"name": "Ada"})), object(json!({"name": "Grace"}))])
            .unwrap();
    }

    #[test]
    fn test_insert_get_id() {
        let mut store = MockStore::new();
        store
            .expect_insert()
            .times(1)
            .returning(|_, _| Ok(vec![object(json!({"id": 12}))]));
        let id = builder(store)
            .from("User")
            .insert_get_id(object(json!({"name": "Ada"})))
            .unwrap();
        assert_eq!(id, 12);
    }

    #[test]
    fn test_insert_get_id_without_identity() {
        let mut store = MockStore::new();
        store.expect_insert().returning(|_, _| Ok(vec![]));
        let result = builder(store)
            .from("User")
            .insert_get_id(object(json!({"name": "Ada"})));
        assert!(matches!(
            result,
            Err(QueryBuilderError::Connection(ConnectionError::UnexpectedResult(_)))
        ));
    }

    #[test]
    fn test_update_postfixes_values() {
        let mut store = MockStore::new();
        store
            .expect_update()
            .withf(|query, parameters| {
                query == "MATCH (user:User) WHERE user.name = $name SET user.name = $name_update RETURN count(user) AS affected"
                    && parameters.get("name") == Some(&json!("Ada"))
                    && parameters.get("name_update") == Some(&json!("Grace"))
            })
            .times(1)
            .returning(|_, _| Ok(1));
        let affected = builder(store)
            .from("User")
            .where_eq("name", "Ada")
            .unwrap()
            .update(object(json!({"name": "Grace"})))
            .unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn test_increment_with_extra_values() {
        let mut store = MockStore::new();
        store
            .expect_update()
            .withf(|query, parameters| {
                query == "MATCH (user:User) WHERE id(user) = $iduser SET user.visits = user.visits + 1, user.seen = $seen_update RETURN count(user) AS affected"
                    && parameters.get("seen_update") == Some(&json!(true))
                    && parameters.get("iduser") == Some(&json!(3))
            })
            .times(1)
            .returning(|_, _| Ok(1));
        builder(store)
            .from("User")
            .where_eq("id", 3)
            .unwrap()
            .increment("visits", 1, object(json!({"seen": true})))
            .unwrap();
    }

    #[test]
    fn test_decrement() {
        let mut store = MockStore::new();
        store
            .expect_update()
            .withf(|query, _| {
                query == "MATCH (user:User) SET user.credits = user.credits - 5 RETURN count(user) AS affected"
            })
            .times(1)
            .returning(|_, _| Ok(4));
        let affected = builder(store)
            .from("User")
            .decrement("credits", 5, Map::new())
            .unwrap();
        assert_eq!(affected, 4);
    }

    #[test]
    fn test_delete_by_id() {
        let mut store = MockStore::new();
        store
            .expect_delete()
            .withf(|query, parameters| {
                query == "MATCH (user:User) WHERE id(user) = $iduser DETACH DELETE user"
                    && parameters.get("iduser") == Some(&json!(8))
            })
            .times(1)
            .returning(|_, _| Ok(1));
        assert_eq!(builder(store).from("User").delete_by_id(8).unwrap(), 1);
    }

    #[test]
    fn test_truncate_runs_statements() {
        let mut store = MockStore::new();
        store
            .expect_statement()
            .withf(|query, parameters| {
                query == "MATCH (user:User) DETACH DELETE user" && parameters.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        builder(store).from("User").truncate().unwrap();
    }

    #[test]
    fn test_update_labels() {
        let mut store = MockStore::new();
        store
            .expect_statement()
            .withf(|query, _| {
                query == "MATCH (user:User) WHERE id(user) = $iduser SET user:Admin:Staff RETURN user"
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        store
            .expect_statement()
            .withf(|query, _| query == "MATCH (user:User) REMOVE user:Guest RETURN user")
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let query = builder(store).from("User");
        query
            .clone()
            .where_eq("id", 1)
            .unwrap()
            .update_labels(vec!["Admin", "Staff"], LabelOperation::Add)
            .unwrap();
        query.update_labels("Guest", LabelOperation::Remove).unwrap();
    }

    #[test]
    fn test_create_with_related_and_attached_nodes() {
        let mut store = MockStore::new();
        store
            .expect_insert()
            .withf(|query, parameters| {
                query == "CREATE (user:User {name: $user_name}) \
                          CREATE (user)-[:POSTED]->(posts_0:Post {title: $posts_0_title}) \
                          WITH DISTINCT user MATCH (tags_attached:Tag) WHERE id(tags_attached) IN $tags_ids \
                          MERGE (user)<-[:TAGS]-(tags_attached) \
                          RETURN DISTINCT user"
                    && parameters.get("user_name") == Some(&json!("Ada"))
                    && parameters.get("posts_0_title") == Some(&json!("Notes"))
                    && parameters.get("tags_ids") == Some(&json!([4, 9]))
            })
            .times(1)
            .returning(|_, _| Ok(vec![object(json!({"user": {"name": "Ada"}}))]));

        let payload = CreateWith::new("User", object(json!({"name": "Ada"})))
            .with(
                RelatedPayload::new("posts", "POSTED", "Post")
                    .create(object(json!({"title": "Notes"}))),
            )
            .with(
                RelatedPayload::new("tags", "TAGS", "Tag")
                    .direction(Direction::In)
                    .attach(&[4, 9]),
            );
        let created = builder(store).from("User").create_with(payload).unwrap();
        assert_eq!(created.len(), 1);
    }
}
