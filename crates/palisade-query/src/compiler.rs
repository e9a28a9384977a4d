//! Condition query compiler.
//!
//! Turns the ordered rule set for one (action, resource type) pair into a
//! storage-query restriction that can be pushed down to the backend before
//! fetching. Per-rule predicates are combined OR-across-permitting-rules,
//! conjoined with negated forbidding rules; negation follows the configured
//! [`NegationDialect`](crate::NegationDialect).

use palisade_core::{Ability, AccessResult, Predicate};

use crate::dialect::NegationDialect;
use crate::normalize::simplify;

/// The compiled restriction for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledRestriction {
    /// No rule imposed any condition; the caller's query must be used
    /// unchanged. This is an explicit answer, not an empty predicate: an
    /// empty-but-present restriction could otherwise be mistaken for
    /// "restrict to nothing".
    Unrestricted,
    /// No record can match; the store call can be skipped entirely.
    Nothing,
    /// AND this predicate into the caller's query.
    Where(Predicate),
}

/// Compiles the rule set into a query restriction.
///
/// Rules are consulted in precedence order (later declarations first). A
/// conditionless permitting rule clears any narrower permits collected so
/// far; a conditionless forbidding rule either forbids everything (when no
/// permit outranks it) or simply ends the walk. A rule set with no
/// conditions and no forbids compiles to
/// [`CompiledRestriction::Unrestricted`] — including the empty rule set,
/// for which the type-level permission check happens before compilation.
///
/// # Errors
///
/// Propagates configuration errors from the dialect negation strategy.
pub fn compile_restriction(
    ability: &dyn Ability,
    action: &str,
    resource_type: &str,
    dialect: NegationDialect,
) -> AccessResult<CompiledRestriction> {
    let rules = ability.rules_for(action, resource_type);
    if !rules
        .iter()
        .any(|rule| rule.condition.is_some() || rule.inverted)
    {
        tracing::debug!(action, resource_type, "no conditioned rules, query passes through");
        return Ok(CompiledRestriction::Unrestricted);
    }

    let mut permits: Vec<Predicate> = Vec::new();
    let mut forbids: Vec<Predicate> = Vec::new();
    let mut base_allow = false;

    for rule in rules.iter().rev() {
        match (&rule.condition, rule.inverted) {
            (Some(condition), false) => permits.push(condition.clone()),
            (Some(condition), true) => forbids.push(dialect.negate(condition)?),
            (None, false) => {
                // Unconditional permit outranks every narrower permit below.
                permits.clear();
                base_allow = true;
                break;
            }
            (None, true) => {
                if permits.is_empty() {
                    tracing::debug!(action, resource_type, "unconditional forbid, nothing matches");
                    return Ok(CompiledRestriction::Nothing);
                }
                break;
            }
        }
    }

    if !base_allow && permits.is_empty() {
        // Only forbidding rules exist; nothing grants access.
        return Ok(CompiledRestriction::Nothing);
    }

    let mut terms = Vec::new();
    if !permits.is_empty() {
        terms.push(Predicate::Or(permits));
    }
    terms.extend(forbids);

    if terms.is_empty() {
        return Ok(CompiledRestriction::Unrestricted);
    }
    let restriction = simplify(Predicate::And(terms));
    tracing::debug!(action, resource_type, restriction = %restriction.to_value(), "compiled query restriction");
    Ok(CompiledRestriction::Where(restriction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::StaticAbility;
    use serde_json::json;

    #[test]
    fn test_unconditioned_rules_need_no_restriction() {
        let ability = StaticAbility::builder().can("read", "tests").build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::default()).unwrap();
        assert_eq!(compiled, CompiledRestriction::Unrestricted);
    }

    #[test]
    fn test_no_rules_at_all_need_no_restriction() {
        let ability = StaticAbility::builder().build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::default()).unwrap();
        assert_eq!(compiled, CompiledRestriction::Unrestricted);
    }

    #[test]
    fn test_single_permit_condition_collapses_its_wrapper() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .when(json!({"userId": 1}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::default()).unwrap();
        assert_eq!(compiled, CompiledRestriction::Where(Predicate::eq("userId", 1)));
    }

    #[test]
    fn test_permits_are_ored() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .when(json!({"userId": 1}))
            .can("read", "tests")
            .when(json!({"public": true}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::default()).unwrap();
        // Later rules take precedence, so they come first in the disjunction.
        assert_eq!(
            compiled,
            CompiledRestriction::Where(Predicate::Or(vec![
                Predicate::eq("public", true),
                Predicate::eq("userId", 1),
            ]))
        );
    }

    #[test]
    fn test_forbid_condition_is_negated_and_conjoined() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .when(json!({"userId": 1}))
            .cannot("read", "tests")
            .when(json!({"archived": true}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::NativeUnary).unwrap();
        assert_eq!(
            compiled,
            CompiledRestriction::Where(Predicate::And(vec![
                Predicate::eq("userId", 1),
                Predicate::Not(Box::new(Predicate::eq("archived", true))),
            ]))
        );
    }

    #[test]
    fn test_unconditional_permit_keeps_higher_precedence_forbids() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .cannot("read", "tests")
            .when(json!({"archived": true}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::NativeUnary).unwrap();
        assert_eq!(
            compiled,
            CompiledRestriction::Where(Predicate::Not(Box::new(Predicate::eq("archived", true))))
        );
    }

    #[test]
    fn test_latest_unconditional_permit_wins_outright() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .when(json!({"userId": 1}))
            .cannot("read", "tests")
            .when(json!({"archived": true}))
            .can("read", "tests")
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::NativeUnary).unwrap();
        assert_eq!(compiled, CompiledRestriction::Unrestricted);
    }

    #[test]
    fn test_only_forbidding_rules_match_nothing() {
        let ability = StaticAbility::builder()
            .cannot("read", "tests")
            .when(json!({"archived": true}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::NativeUnary).unwrap();
        assert_eq!(compiled, CompiledRestriction::Nothing);
    }

    #[test]
    fn test_comparison_flip_dialect_flows_through() {
        let ability = StaticAbility::builder()
            .can("read", "tests")
            .cannot("read", "tests")
            .when(json!({"archived": true}))
            .build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::ComparisonFlip)
                .unwrap();
        assert_eq!(
            compiled,
            CompiledRestriction::Where(Predicate::compare(
                "archived",
                palisade_core::CompareOp::Ne,
                true
            ))
        );
    }

    #[test]
    fn test_lone_unconditional_forbid_matches_nothing() {
        let ability = StaticAbility::builder().cannot("read", "tests").build();
        let compiled =
            compile_restriction(&ability, "read", "tests", NegationDialect::default()).unwrap();
        assert_eq!(compiled, CompiledRestriction::Nothing);
    }
}
