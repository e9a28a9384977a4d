//! Field redaction engine.
//!
//! Computes, for one concrete record (or for a resource type alone before
//! any fetch), the minimal set of fields a caller may see or write, and
//! projects records down to that set. The result is the tri-state
//! [`FieldSelection`] contract that every caller honors identically.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::ability::Ability;
use crate::fields::FieldSelection;

/// Options for [`minimal_fields`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RedactOptions<'a> {
    /// The available-fields universe declared by the resource owner: the
    /// ceiling beyond which no field is ever exposed, independent of rules.
    pub universe: Option<&'a IndexSet<String>>,
    /// When set and a record is available, a denied action on that record
    /// short-circuits to [`FieldSelection::Forbidden`].
    pub check_can: bool,
}

/// Computes the minimal visible (or writable) field set.
///
/// Field-carrying rules are collected in declaration order via
/// `possible_rules_for`; when a record is supplied only rules whose
/// condition matches it count, and when none is supplied (a pre-fetch
/// field query) every field-carrying rule counts. With no matching rule
/// the answer depends on whether a universe is known: a declared universe
/// means unrestricted, no universe means nothing is known to be visible.
/// Otherwise the working set is seeded from the universe (the starting
/// ceiling) or the first permitting rule's fields, then each matching rule
/// intersects (permitting) or removes (forbidding) its fields in order.
#[must_use]
pub fn minimal_fields(
    ability: &dyn Ability,
    action: &str,
    resource_type: &str,
    record: Option<&Value>,
    options: &RedactOptions<'_>,
) -> FieldSelection {
    if options.check_can
        && let Some(record) = record
        && !ability.can(action, resource_type, Some(record))
    {
        tracing::trace!(action, resource_type, "action denied on record, redacting fully");
        return FieldSelection::Forbidden;
    }

    let matching: Vec<_> = ability
        .possible_rules_for(action, resource_type)
        .into_iter()
        .filter(|rule| rule.fields.is_some())
        .filter(|rule| record.is_none_or(|record| ability.matches(rule, record)))
        .collect();

    if matching.is_empty() {
        return match options.universe {
            Some(_) => FieldSelection::Unrestricted,
            None => FieldSelection::Forbidden,
        };
    }

    let mut working: IndexSet<String> = match options.universe {
        Some(universe) => universe.clone(),
        None => matching
            .iter()
            .find(|rule| !rule.inverted)
            .and_then(|rule| rule.fields.clone())
            .unwrap_or_default(),
    };

    for rule in &matching {
        let Some(fields) = rule.fields.as_ref() else {
            continue;
        };
        if rule.inverted {
            working.retain(|field| !fields.contains(field));
        } else {
            working.retain(|field| fields.contains(field));
        }
    }

    if let Some(universe) = options.universe
        && working == *universe
    {
        // The rules happened to permit exactly everything.
        return FieldSelection::Unrestricted;
    }
    if working.is_empty() {
        return FieldSelection::Forbidden;
    }
    FieldSelection::Fields(working)
}

/// Projects a record through a field selection.
///
/// `Unrestricted` returns the record intact, `Forbidden` the empty object,
/// and an explicit set exactly those fields. Idempotent: projecting an
/// already-projected record with the same selection changes nothing.
#[must_use]
pub fn project_record(record: &Value, selection: &FieldSelection) -> Value {
    match selection {
        FieldSelection::Unrestricted => record.clone(),
        FieldSelection::Forbidden => Value::Object(Map::new()),
        FieldSelection::Fields(fields) => {
            let mut out = Map::new();
            if let Some(source) = record.as_object() {
                for field in fields {
                    if let Some(value) = source.get(field) {
                        out.insert(field.clone(), value.clone());
                    }
                }
            }
            Value::Object(out)
        }
    }
}
