//! Predicate normalization.
//!
//! The rule-combination step can leave `$and`/`$or` nodes wrapping a single
//! child. [`simplify`] flattens those redundant wrappers recursively to
//! minimize predicate tree depth. The pass is idempotent: simplifying twice
//! yields the same tree.

use palisade_core::Predicate;

/// Flattens redundant logical wrappers.
///
/// Single-child `And`/`Or` nodes collapse into their child, same-kind
/// children are hoisted, `Always` is dropped from conjunctions and
/// saturates disjunctions.
#[must_use]
pub fn simplify(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::And(children) => {
            let mut flat = Vec::new();
            for child in children {
                match simplify(child) {
                    Predicate::Always => {}
                    Predicate::And(grandchildren) => flat.extend(grandchildren),
                    other => flat.push(other),
                }
            }
            match flat.len() {
                0 => Predicate::Always,
                1 => flat.remove(0),
                _ => Predicate::And(flat),
            }
        }
        Predicate::Or(children) => {
            let mut flat = Vec::new();
            for child in children {
                match simplify(child) {
                    Predicate::Always => return Predicate::Always,
                    Predicate::Or(grandchildren) => flat.extend(grandchildren),
                    other => flat.push(other),
                }
            }
            match flat.len() {
                0 => Predicate::Always,
                1 => flat.remove(0),
                _ => Predicate::Or(flat),
            }
        }
        Predicate::Not(child) => Predicate::Not(Box::new(simplify(*child))),
        Predicate::Nor(children) => Predicate::Nor(children.into_iter().map(simplify).collect()),
        leaf => leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_child_wrappers_collapse_recursively() {
        let pred = Predicate::And(vec![Predicate::Or(vec![Predicate::eq("a", 1)])]);
        assert_eq!(simplify(pred), Predicate::eq("a", 1));
    }

    #[test]
    fn test_same_kind_children_are_hoisted() {
        let pred = Predicate::And(vec![
            Predicate::And(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]),
            Predicate::eq("c", 3),
        ]);
        assert_eq!(
            simplify(pred),
            Predicate::And(vec![
                Predicate::eq("a", 1),
                Predicate::eq("b", 2),
                Predicate::eq("c", 3),
            ])
        );
    }

    #[test]
    fn test_always_is_neutral_in_and_and_absorbing_in_or() {
        let and = Predicate::And(vec![Predicate::Always, Predicate::eq("a", 1)]);
        assert_eq!(simplify(and), Predicate::eq("a", 1));

        let or = Predicate::Or(vec![Predicate::Always, Predicate::eq("a", 1)]);
        assert_eq!(simplify(or), Predicate::Always);
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let pred = Predicate::And(vec![
            Predicate::Or(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]),
            Predicate::And(vec![Predicate::Or(vec![Predicate::eq("c", 3)])]),
        ]);
        let once = simplify(pred);
        let twice = simplify(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_multi_child_nodes_survive() {
        let pred = Predicate::Or(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]);
        assert_eq!(simplify(pred.clone()), pred);
    }
}
