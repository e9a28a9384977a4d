//! Merging a compiled restriction into the caller's query.
//!
//! The caller's query is a JSON document whose keys the engine only
//! partially understands; the restriction is ANDed in without disturbing
//! anything else. When the caller already uses a logical operator the
//! backend whitelist recognizes, the merge folds into it instead of
//! nesting duplicate operators of the same kind.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use palisade_core::{AccessError, AccessResult, Predicate};

/// The logical and comparison operators most document-query backends
/// accept. Storage adapters narrow this down through configuration.
#[must_use]
pub fn default_operator_whitelist() -> IndexSet<String> {
    [
        "$and", "$or", "$not", "$nor", "$ne", "$in", "$nin", "$lt", "$lte", "$gt", "$gte",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

/// Parses a caller query document against an operator whitelist.
///
/// Logical operators outside the whitelist, and any term the engine does
/// not understand, survive as opaque passthrough nodes.
#[must_use]
pub fn parse_query(query: &Value, whitelist: &IndexSet<String>) -> Predicate {
    match query.as_object() {
        Some(map) => Predicate::parse_document(map, Some(whitelist)),
        None => Predicate::Always,
    }
}

/// ANDs a restriction predicate into the caller's query document.
///
/// The caller's document is copied, never mutated in place. Restriction
/// conjuncts whose keys do not collide with existing caller keys are
/// folded in directly; colliding conjuncts land in a single `$and` array
/// shared with any `$and` the caller already had.
///
/// # Errors
///
/// Returns a configuration error when a collision cannot be expressed
/// because the backend whitelist has no `$and` operator.
pub fn merge_restriction(
    caller: &Value,
    restriction: &Predicate,
    whitelist: &IndexSet<String>,
) -> AccessResult<Value> {
    let mut out = match caller.as_object() {
        Some(map) => map.clone(),
        None => Map::new(),
    };

    let and_allowed = whitelist.contains("$and");
    let mut and_items: Vec<Value> = Vec::new();
    if and_allowed
        && let Some(Value::Array(existing)) = out.remove("$and")
    {
        and_items.extend(existing);
    }

    let conjuncts: Vec<Value> = match restriction.to_value() {
        Value::Object(map) if map.len() == 1 && map.contains_key("$and") => {
            match map.into_iter().next() {
                Some((_, Value::Array(items))) => items,
                _ => Vec::new(),
            }
        }
        rendered => vec![rendered],
    };

    for conjunct in conjuncts {
        let foldable = conjunct
            .as_object()
            .is_some_and(|map| map.keys().all(|key| !out.contains_key(key)));
        if foldable {
            if let Value::Object(map) = conjunct {
                for (key, value) in map {
                    out.insert(key, value);
                }
            }
        } else {
            if !and_allowed {
                return Err(AccessError::configuration(
                    "backend accepts no conjunction operator for overlapping query terms",
                ));
            }
            and_items.push(conjunct);
        }
    }

    if !and_items.is_empty() {
        out.insert("$and".to_string(), Value::Array(and_items));
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_disjoint_keys_fold_in_directly() {
        let caller = json!({"status": "open", "$select": ["id"]});
        let restriction = Predicate::eq("userId", 1);
        let merged =
            merge_restriction(&caller, &restriction, &default_operator_whitelist()).unwrap();
        assert_json_eq!(
            merged,
            json!({"status": "open", "$select": ["id"], "userId": 1})
        );
    }

    #[test]
    fn test_colliding_keys_share_one_and() {
        let caller = json!({"userId": 3});
        let restriction = Predicate::eq("userId", 1);
        let merged =
            merge_restriction(&caller, &restriction, &default_operator_whitelist()).unwrap();
        assert_json_eq!(merged, json!({"userId": 3, "$and": [{"userId": 1}]}));
    }

    #[test]
    fn test_existing_and_is_extended_not_nested() {
        let caller = json!({"$and": [{"a": 1}], "b": 2});
        let restriction = Predicate::And(vec![Predicate::eq("b", 3), Predicate::eq("c", 4)]);
        let merged =
            merge_restriction(&caller, &restriction, &default_operator_whitelist()).unwrap();
        assert_json_eq!(
            merged,
            json!({"b": 2, "c": 4, "$and": [{"a": 1}, {"b": 3}]})
        );
    }

    #[test]
    fn test_or_restriction_lands_beside_caller_terms() {
        let caller = json!({"status": "open"});
        let restriction = Predicate::Or(vec![Predicate::eq("userId", 1), Predicate::eq("public", true)]);
        let merged =
            merge_restriction(&caller, &restriction, &default_operator_whitelist()).unwrap();
        assert_json_eq!(
            merged,
            json!({"status": "open", "$or": [{"userId": 1}, {"public": true}]})
        );
    }

    #[test]
    fn test_collision_without_and_operator_is_a_configuration_error() {
        let whitelist: IndexSet<String> = IndexSet::new();
        let caller = json!({"userId": 3});
        let restriction = Predicate::eq("userId", 1);
        let err = merge_restriction(&caller, &restriction, &whitelist).unwrap_err();
        assert!(matches!(err, AccessError::Configuration { .. }));
    }

    #[test]
    fn test_parse_query_keeps_unknown_logical_ops_opaque() {
        let whitelist: IndexSet<String> = ["$and".to_string()].into_iter().collect();
        let pred = parse_query(&json!({"$or": [{"a": 1}]}), &whitelist);
        assert!(matches!(pred, Predicate::Opaque(_)));
    }
}
