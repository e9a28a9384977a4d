//! Negation dialects.
//!
//! Backends differ in how (and whether) they can express negation. The
//! closed set of strategies here replaces any per-adapter string-keyed
//! dispatch: the dialect is selected once per request from configuration,
//! never inferred from the predicate shape.

use serde::{Deserialize, Serialize};

use palisade_core::{AccessError, AccessResult, Predicate};

/// How the target backend expresses negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegationDialect {
    /// The backend accepts a native unary negation wrapper (`$not`).
    #[default]
    NativeUnary,
    /// The backend only accepts negation as an array-wrapped operator
    /// (`$nor`).
    ArrayWrapped,
    /// The backend has no negation operator at all; comparisons are
    /// flipped pairwise and plain equality rewritten as `$ne`.
    ComparisonFlip,
}

impl NegationDialect {
    /// The wire operator this dialect's negation emits, if any.
    ///
    /// Configuration validation checks it against the backend operator
    /// whitelist; the comparison-flip strategy emits no operator of its
    /// own.
    #[must_use]
    pub fn wire_operator(&self) -> Option<&'static str> {
        match self {
            Self::NativeUnary => Some("$not"),
            Self::ArrayWrapped => Some("$nor"),
            Self::ComparisonFlip => None,
        }
    }

    /// Negates a predicate the way this dialect's backend can express.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the comparison-flip strategy
    /// meets a term it cannot flip: an opaque caller term, an
    /// already-negated wrapper, or an unconditional predicate.
    pub fn negate(&self, predicate: &Predicate) -> AccessResult<Predicate> {
        match self {
            Self::NativeUnary => Ok(Predicate::Not(Box::new(predicate.clone()))),
            Self::ArrayWrapped => Ok(Predicate::Nor(vec![predicate.clone()])),
            Self::ComparisonFlip => flip(predicate),
        }
    }
}

/// Pairwise operator flip, pushed through logical nodes by De Morgan.
fn flip(predicate: &Predicate) -> AccessResult<Predicate> {
    match predicate {
        Predicate::Compare { field, op, value } => Ok(Predicate::Compare {
            field: field.clone(),
            op: op.negated(),
            value: value.clone(),
        }),
        Predicate::And(children) => Ok(Predicate::Or(flip_all(children)?)),
        Predicate::Or(children) => Ok(Predicate::And(flip_all(children)?)),
        Predicate::Always => Err(AccessError::configuration(
            "comparison-flip dialect cannot negate an unconditional predicate",
        )),
        Predicate::Not(_) | Predicate::Nor(_) => Err(AccessError::configuration(
            "comparison-flip dialect cannot negate an already-negated term",
        )),
        Predicate::Opaque(_) => Err(AccessError::configuration(
            "comparison-flip dialect cannot negate an opaque filter term",
        )),
    }
}

fn flip_all(children: &[Predicate]) -> AccessResult<Vec<Predicate>> {
    children.iter().map(flip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::CompareOp;
    use serde_json::json;

    #[test]
    fn test_native_unary_wraps() {
        let pred = Predicate::eq("userId", 1);
        let negated = NegationDialect::NativeUnary.negate(&pred).unwrap();
        assert_eq!(negated.to_value(), json!({"$not": {"userId": 1}}));
    }

    #[test]
    fn test_array_wrapped_wraps() {
        let pred = Predicate::eq("userId", 1);
        let negated = NegationDialect::ArrayWrapped.negate(&pred).unwrap();
        assert_eq!(negated.to_value(), json!({"$nor": [{"userId": 1}]}));
    }

    #[test]
    fn test_flip_rewrites_equality_as_ne() {
        let pred = Predicate::eq("userId", 1);
        let negated = NegationDialect::ComparisonFlip.negate(&pred).unwrap();
        assert_eq!(negated.to_value(), json!({"userId": {"$ne": 1}}));
    }

    #[test]
    fn test_flip_twice_is_the_identity() {
        let pred = Predicate::And(vec![
            Predicate::compare("age", CompareOp::Gt, 18),
            Predicate::Or(vec![
                Predicate::compare("status", CompareOp::In, json!(["a", "b"])),
                Predicate::eq("owner", 1),
            ]),
        ]);
        let dialect = NegationDialect::ComparisonFlip;
        let once = dialect.negate(&pred).unwrap();
        let twice = dialect.negate(&once).unwrap();
        assert_eq!(twice, pred);
    }

    #[test]
    fn test_wire_operators() {
        assert_eq!(NegationDialect::NativeUnary.wire_operator(), Some("$not"));
        assert_eq!(NegationDialect::ArrayWrapped.wire_operator(), Some("$nor"));
        assert_eq!(NegationDialect::ComparisonFlip.wire_operator(), None);
    }

    #[test]
    fn test_flip_rejects_opaque_terms() {
        let doc = json!({"name": {"$like": "x%"}});
        let pred = Predicate::Opaque(doc.as_object().cloned().unwrap());
        let err = NegationDialect::ComparisonFlip.negate(&pred).unwrap_err();
        assert!(matches!(err, AccessError::Configuration { .. }));
    }
}
