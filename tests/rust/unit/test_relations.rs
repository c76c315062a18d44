//! Relationship match clauses.

#[cfg(test)]
mod relation_tests {
    use neoquery::query_builder::{
        BindingCategory, Direction, MatchDescriptor, MorphPattern, RelationPattern,
    };
    use serde_json::{json, Value};

    use crate::common::*;

    #[test]
    fn test_match_relation_binds_parent_identity() {
        let query = users().match_relation(RelationPattern::new("User", "POSTED", "Post").on("id", "3"));
        let matches = query
            .get_raw_bindings()
            .get(BindingCategory::Matches)
            .unwrap();
        assert_eq!(matches.keyed.get("id(user)"), Some(&json!(3)));
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User), (user)-[:POSTED]->(post:Post) WHERE id(user) = $iduser RETURN user"
        );
    }

    #[test]
    fn test_optional_match_with_property_and_direction() {
        let query = users()
            .where_eq("active", true)
            .unwrap()
            .match_relation(
                RelationPattern::new("Team", "MEMBER_OF", "User")
                    .related_node("member")
                    .on("name", "core")
                    .direction(Direction::In)
                    .optional(),
            );
        assert!(query.spec().matches[0].is_optional());
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User) WHERE user.active = $active OPTIONAL MATCH (team:Team)<-[:MEMBER_OF]-(member:User) WHERE team.name = $name RETURN user"
        );
    }

    #[test]
    fn test_null_match_value_is_bound_but_not_constrained() {
        let query = users().match_relation(RelationPattern::new("User", "FOLLOWS", "User").related_node("followed"));
        let matches = query
            .get_raw_bindings()
            .get(BindingCategory::Matches)
            .unwrap();
        assert_eq!(matches.keyed.get("id(user)"), Some(&Value::Null));
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User), (user)-[:FOLLOWS]->(followed:User) RETURN user"
        );
    }

    #[test]
    fn test_morph_relation() {
        let query = users().match_morph_relation(
            MorphPattern::new("User", "target")
                .on("id", 9)
                .direction(Direction::InOut),
        );
        match &query.spec().matches[0] {
            MatchDescriptor::MorphRelation {
                parent,
                related,
                binding,
                optional,
                ..
            } => {
                assert_eq!(parent, "user");
                assert_eq!(related, "target");
                assert_eq!(binding, "id(user)");
                assert!(!optional);
            }
            other => panic!("unexpected descriptor {:?}", other),
        }
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User), (user)--(target) WHERE id(user) = $iduser RETURN user"
        );
    }

    #[test]
    fn test_matches_keep_insertion_order() {
        let query = users()
            .match_relation(RelationPattern::new("User", "POSTED", "Post"))
            .match_relation(RelationPattern::new("User", "LIKED", "Comment"));
        let relationships: Vec<&str> = query
            .spec()
            .matches
            .iter()
            .map(|m| match m {
                MatchDescriptor::Relation { relationship, .. } => relationship.as_str(),
                MatchDescriptor::MorphRelation { .. } => "",
            })
            .collect();
        assert_eq!(relationships, vec!["POSTED", "LIKED"]);
    }

    #[test]
    fn test_nested_group_keeps_parent_matches() {
        let query = users()
            .match_relation(RelationPattern::new("User", "POSTED", "Post").on("id", 7))
            .where_nested(|q| {
                assert_eq!(q.spec().matches.len(), 1);
                q.match_relation(RelationPattern::new("User", "LIKED", "Comment"))
                    .where_eq("name", "Ada")
            })
            .unwrap();
        let relationships: Vec<&str> = query
            .spec()
            .matches
            .iter()
            .map(|m| match m {
                MatchDescriptor::Relation { relationship, .. } => relationship.as_str(),
                MatchDescriptor::MorphRelation { .. } => "",
            })
            .collect();
        assert_eq!(relationships, vec!["POSTED", "LIKED"]);
    }

    #[test]
    fn test_nested_group_without_matches_keeps_pattern() {
        let query = users()
            .match_relation(RelationPattern::new("User", "POSTED", "Post").on("id", 7))
            .where_nested(|q| q.where_eq("name", "Ada"))
            .unwrap();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User), (user)-[:POSTED]->(post:Post) WHERE id(user) = $iduser AND (user.name = $name) RETURN user"
        );
        let parameters = query.parameters();
        assert_eq!(parameters.get("iduser"), Some(&json!(7)));
        assert_eq!(parameters.get("name"), Some(&json!("Ada")));
    }

    #[test]
    fn test_relation_filter_on_related_node() {
        let query = users()
            .match_relation(RelationPattern::new("User", "POSTED", "Post"))
            .where_("Post.title", "starts with", "Rust")
            .unwrap();
        assert_eq!(
            query.to_cypher(),
            "MATCH (user:User), (user)-[:POSTED]->(post:Post) WHERE post.title STARTS WITH $title RETURN user"
        );
    }
}
