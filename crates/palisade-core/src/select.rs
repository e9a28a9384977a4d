//! Conditional-select expansion.
//!
//! When a caller restricts fetched columns but some rule's condition reads
//! a field outside that selection, the redaction engine could not evaluate
//! the rule against the fetched record. The expander adds (never removes)
//! the condition-referenced fields before the fetch; after evaluation the
//! result is intersected back down to the caller's original selection so
//! fields fetched purely to decide permission never leak into the
//! response.

use indexmap::IndexSet;

use crate::ability::Ability;
use crate::fields::FieldSelection;

/// Reconciles a caller's field selection with the fields rule conditions
/// need.
///
/// Returns `None` when no change is needed, otherwise the requested
/// selection followed by the missing condition-referenced fields.
#[must_use]
pub fn expand_selection(
    requested: &[String],
    ability: &dyn Ability,
    action: &str,
    resource_type: &str,
) -> Option<Vec<String>> {
    let mut needed = IndexSet::new();
    for rule in ability.possible_rules_for(action, resource_type) {
        if let Some(condition) = &rule.condition {
            condition.fields_referenced(&mut needed);
        }
    }

    let missing: Vec<String> = needed
        .into_iter()
        .filter(|field| !requested.contains(field))
        .collect();
    if missing.is_empty() {
        return None;
    }

    tracing::trace!(action, resource_type, ?missing, "expanding field selection for rule conditions");
    let mut expanded = requested.to_vec();
    expanded.extend(missing);
    Some(expanded)
}

/// Intersects a redaction result back down to the caller's original
/// selection.
///
/// An unrestricted result becomes exactly the requested fields; an
/// explicit set keeps only requested members, in requested order. The
/// result may be an empty explicit set, which callers render as an empty
/// object (or an authorization failure on a singular operation) — that is
/// deliberately distinct from [`FieldSelection::Forbidden`], which means
/// the record itself must not be disclosed.
#[must_use]
pub fn restrict_to_requested(selection: &FieldSelection, requested: &[String]) -> FieldSelection {
    match selection {
        FieldSelection::Unrestricted => FieldSelection::Fields(requested.iter().cloned().collect()),
        FieldSelection::Forbidden => FieldSelection::Forbidden,
        FieldSelection::Fields(allowed) => FieldSelection::Fields(
            requested
                .iter()
                .filter(|field| allowed.contains(*field))
                .cloned()
                .collect(),
        ),
    }
}
