//! # palisade-channels
//!
//! Broadcast fan-out redaction. When one changed record must be pushed to
//! many simultaneous subscriber connections, redacting per connection is
//! correct but wasteful whenever many connections share identical
//! permissions. [`redact_for_connections`] evaluates each connection's
//! ability exactly once, groups connections by the structural
//! (order-insensitive) equality of their minimal field set, and emits one
//! projected message per distinct group. Connections whose evaluation is
//! fully forbidden, or whose ability denies the action outright, receive
//! no message at all.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use palisade_core::{
    Ability, FieldSelection, RedactOptions, SelectionKey, minimal_fields, project_record,
};

/// A subscriber connection with its own ability context.
pub trait ConnectionAbility {
    /// The connection's ability, or `None` for connections that carry no
    /// permissions (which receive nothing).
    fn ability(&self) -> Option<&dyn Ability>;
}

/// One broadcast group: every connection in it receives the same payload.
#[derive(Debug)]
pub struct BroadcastGroup<'a, C> {
    /// Connections sharing this exact field set.
    pub connections: Vec<&'a C>,
    /// The record as this group may see it.
    pub payload: Value,
}

/// Partitions connections into minimal broadcast groups for one record.
///
/// Grouping cost is O(connections × distinct field sets); the ability of
/// each connection is consulted exactly once.
pub fn redact_for_connections<'a, C>(
    record: &Value,
    action: &str,
    resource_type: &str,
    universe: Option<&IndexSet<String>>,
    connections: &'a [C],
) -> Vec<BroadcastGroup<'a, C>>
where
    C: ConnectionAbility,
{
    let options = RedactOptions {
        universe,
        check_can: true,
    };
    let mut groups: IndexMap<SelectionKey, (FieldSelection, Vec<&'a C>)> = IndexMap::new();

    for connection in connections {
        let Some(ability) = connection.ability() else {
            continue;
        };
        let selection = minimal_fields(ability, action, resource_type, Some(record), &options);
        if selection.is_forbidden() {
            continue;
        }
        groups
            .entry(selection.group_key())
            .or_insert_with(|| (selection, Vec::new()))
            .1
            .push(connection);
    }

    tracing::trace!(
        resource_type,
        connections = connections.len(),
        groups = groups.len(),
        "partitioned subscribers into broadcast groups"
    );

    groups
        .into_values()
        .map(|(selection, members)| BroadcastGroup {
            payload: project_record(record, &selection),
            connections: members,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::StaticAbility;
    use serde_json::json;
    use std::sync::Arc;

    struct Conn {
        name: &'static str,
        ability: Option<Arc<StaticAbility>>,
    }

    impl ConnectionAbility for Conn {
        fn ability(&self) -> Option<&dyn Ability> {
            self.ability.as_deref().map(|a| a as &dyn Ability)
        }
    }

    fn owner_ability(user_id: i64) -> Arc<StaticAbility> {
        Arc::new(
            StaticAbility::builder()
                .can("read", "tests")
                .fields(["id"])
                .when(json!({"userId": user_id}))
                .can("read", "tests")
                .when(json!({"public": true}))
                .build(),
        )
    }

    fn admin_ability() -> Arc<StaticAbility> {
        Arc::new(StaticAbility::builder().can("manage", "all").build())
    }

    #[test]
    fn test_identical_permissions_share_one_group() {
        let record = json!({"id": 5, "userId": 1, "public": false});
        let universe: IndexSet<String> =
            ["id", "userId", "public"].iter().map(ToString::to_string).collect();
        let connections = vec![
            Conn { name: "owner-a", ability: Some(owner_ability(1)) },
            Conn { name: "owner-b", ability: Some(owner_ability(1)) },
            Conn { name: "admin", ability: Some(admin_ability()) },
        ];

        let groups =
            redact_for_connections(&record, "read", "tests", Some(&universe), &connections);
        assert_eq!(groups.len(), 2);

        let owners = groups
            .iter()
            .find(|g| g.payload == json!({"id": 5}))
            .expect("projected owner group");
        assert_eq!(owners.connections.len(), 2);
        assert_eq!(owners.connections[0].name, "owner-a");

        // No field rule matches the admin, so the full record goes out.
        let admins = groups.iter().find(|g| g.payload == record).expect("admin group");
        assert_eq!(admins.connections.len(), 1);
    }

    #[test]
    fn test_denied_and_abilityless_connections_receive_nothing() {
        let record = json!({"id": 5, "userId": 1, "public": false});
        let connections = vec![
            Conn { name: "stranger", ability: Some(owner_ability(2)) },
            Conn { name: "anonymous", ability: None },
        ];

        let groups = redact_for_connections(&record, "read", "tests", None, &connections);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_field_set_equality_is_order_insensitive() {
        let a = StaticAbility::builder()
            .can("read", "tests")
            .fields(["id", "userId"])
            .build();
        let b = StaticAbility::builder()
            .can("read", "tests")
            .fields(["userId", "id"])
            .build();
        let record = json!({"id": 5, "userId": 1});
        let connections = vec![
            Conn { name: "a", ability: Some(Arc::new(a)) },
            Conn { name: "b", ability: Some(Arc::new(b)) },
        ];

        let groups = redact_for_connections(&record, "read", "tests", None, &connections);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].connections.len(), 2);
    }
}
