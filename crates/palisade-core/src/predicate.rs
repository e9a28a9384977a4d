//! Query predicate model.
//!
//! A [`Predicate`] is a tree of logical nodes and leaf comparisons that the
//! condition compiler assembles per request and the storage layer receives
//! rendered as a Mongo-style operator document. Trees are built fresh per
//! compilation and never mutated in place across calls; merging always
//! copies.
//!
//! Caller-supplied filter terms the engine does not understand are carried
//! through untouched as [`Predicate::Opaque`] nodes.

use indexmap::IndexSet;
use serde_json::{Map, Value};

/// Comparison operators understood by the predicate model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equality. Rendered as a bare value, not an operator document.
    Eq,
    /// Inequality (`$ne`).
    Ne,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal (`$gte`).
    Gte,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal (`$lte`).
    Lte,
    /// Membership (`$in`).
    In,
    /// Non-membership (`$nin`).
    Nin,
}

impl CompareOp {
    /// The wire operator name for this comparison.
    #[must_use]
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
        }
    }

    /// Parses a wire operator name.
    #[must_use]
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::Nin),
            _ => None,
        }
    }

    /// The pairwise negation of this operator.
    ///
    /// `$gt↔$lte`, `$gte↔$lt`, `$in↔$nin`, equality↔`$ne`. Applying twice
    /// yields the original operator.
    #[must_use]
    pub fn negated(&self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Lte => Self::Gt,
            Self::Gte => Self::Lt,
            Self::Lt => Self::Gte,
            Self::In => Self::Nin,
            Self::Nin => Self::In,
        }
    }
}

/// A storage-query predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record. Rendered as the empty document.
    Always,
    /// A leaf comparison on one (possibly dotted) field path.
    Compare {
        /// Field path, dot-separated for nested values.
        field: String,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand value.
        value: Value,
    },
    /// Conjunction of children.
    And(Vec<Predicate>),
    /// Disjunction of children.
    Or(Vec<Predicate>),
    /// Native unary negation wrapper (`$not`). Only produced for dialects
    /// that support it.
    Not(Box<Predicate>),
    /// Array-wrapped negation (`$nor`). Only produced for dialects that
    /// negate via an array-valued operator.
    Nor(Vec<Predicate>),
    /// A caller-supplied term the engine does not understand, carried
    /// through to the backend untouched.
    Opaque(Map<String, Value>),
}

impl Predicate {
    /// Builds an equality comparison leaf.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Builds a comparison leaf with an explicit operator.
    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Renders the predicate as a Mongo-style operator document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Always => Value::Object(Map::new()),
            Self::Compare { field, op, value } => {
                let mut doc = Map::new();
                if *op == CompareOp::Eq {
                    doc.insert(field.clone(), value.clone());
                } else {
                    let mut inner = Map::new();
                    inner.insert(op.operator().to_string(), value.clone());
                    doc.insert(field.clone(), Value::Object(inner));
                }
                Value::Object(doc)
            }
            Self::And(children) => wrap_array("$and", children),
            Self::Or(children) => wrap_array("$or", children),
            Self::Nor(children) => wrap_array("$nor", children),
            Self::Not(child) => {
                let mut doc = Map::new();
                doc.insert("$not".to_string(), child.to_value());
                Value::Object(doc)
            }
            Self::Opaque(map) => Value::Object(map.clone()),
        }
    }

    /// Parses a condition document into a predicate tree.
    ///
    /// Every known logical operator is recognized. Use
    /// [`Predicate::parse_document`] with a whitelist when parsing
    /// caller-supplied queries for a specific backend.
    #[must_use]
    pub fn from_condition(map: &Map<String, Value>) -> Self {
        Self::parse_document(map, None)
    }

    /// Parses a query document, recognizing only logical operators present
    /// in `logical_whitelist` (all known operators when `None`). Entries
    /// that are not understood become [`Predicate::Opaque`] children.
    #[must_use]
    pub fn parse_document(
        map: &Map<String, Value>,
        logical_whitelist: Option<&IndexSet<String>>,
    ) -> Self {
        let recognized =
            |key: &str| logical_whitelist.is_none_or(|whitelist| whitelist.contains(key));
        let mut children = Vec::new();

        for (key, value) in map {
            match key.as_str() {
                "$and" | "$or" | "$nor" if recognized(key) => match value.as_array() {
                    Some(items) => {
                        let parsed: Vec<Predicate> = items
                            .iter()
                            .map(|item| match item.as_object() {
                                Some(obj) => Self::parse_document(obj, logical_whitelist),
                                None => opaque_entry(key, value),
                            })
                            .collect();
                        children.push(match key.as_str() {
                            "$and" => Self::And(parsed),
                            "$or" => Self::Or(parsed),
                            _ => Self::Nor(parsed),
                        });
                    }
                    None => children.push(opaque_entry(key, value)),
                },
                "$not" if recognized(key) => match value.as_object() {
                    Some(obj) => children.push(Self::Not(Box::new(Self::parse_document(
                        obj,
                        logical_whitelist,
                    )))),
                    None => children.push(opaque_entry(key, value)),
                },
                key if key.starts_with('$') => children.push(opaque_entry(key, value)),
                field => children.extend(parse_field_entry(field, value)),
            }
        }

        match children.len() {
            0 => Self::Always,
            1 => children.remove(0),
            _ => Self::And(children),
        }
    }

    /// Collects the top-level record fields this predicate reads.
    ///
    /// Dotted paths contribute their first segment, which is what a field
    /// selection has to include for the condition to be evaluable against
    /// the fetched record.
    pub fn fields_referenced(&self, out: &mut IndexSet<String>) {
        match self {
            Self::Always => {}
            Self::Compare { field, .. } => {
                out.insert(root_segment(field).to_string());
            }
            Self::And(children) | Self::Or(children) | Self::Nor(children) => {
                for child in children {
                    child.fields_referenced(out);
                }
            }
            Self::Not(child) => child.fields_referenced(out),
            Self::Opaque(map) => collect_map_fields(map, out),
        }
    }

    /// Evaluates the predicate against a concrete record.
    ///
    /// Opaque terms are evaluated best-effort: entries that cannot be
    /// interpreted are treated as matching, since the backend that owns
    /// them is the real authority.
    #[must_use]
    pub fn matches_record(&self, record: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::Compare { field, op, value } => {
                compare_matches(lookup(record, field), *op, value)
            }
            Self::And(children) => children.iter().all(|c| c.matches_record(record)),
            Self::Or(children) => children.iter().any(|c| c.matches_record(record)),
            Self::Nor(children) => !children.iter().any(|c| c.matches_record(record)),
            Self::Not(child) => !child.matches_record(record),
            Self::Opaque(map) => opaque_matches(map, record),
        }
    }
}

fn wrap_array(operator: &str, children: &[Predicate]) -> Value {
    let mut doc = Map::new();
    doc.insert(
        operator.to_string(),
        Value::Array(children.iter().map(Predicate::to_value).collect()),
    );
    Value::Object(doc)
}

fn opaque_entry(key: &str, value: &Value) -> Predicate {
    let mut map = Map::new();
    map.insert(key.to_string(), value.clone());
    Predicate::Opaque(map)
}

/// Parses one `field: value` entry. An all-operator object value becomes
/// one comparison per operator; anything else is plain equality, except
/// partially-understood operator objects which stay opaque.
fn parse_field_entry(field: &str, value: &Value) -> Vec<Predicate> {
    if let Some(obj) = value.as_object()
        && !obj.is_empty()
        && obj.keys().all(|k| k.starts_with('$'))
    {
        if obj.keys().all(|k| CompareOp::from_operator(k).is_some()) {
            return obj
                .iter()
                .filter_map(|(op, rhs)| {
                    CompareOp::from_operator(op)
                        .map(|op| Predicate::compare(field, op, rhs.clone()))
                })
                .collect();
        }
        return vec![opaque_entry(field, value)];
    }
    vec![Predicate::eq(field, value.clone())]
}

fn collect_map_fields(map: &Map<String, Value>, out: &mut IndexSet<String>) {
    for (key, value) in map {
        if key.starts_with('$') {
            if let Some(items) = value.as_array() {
                for item in items {
                    if let Some(obj) = item.as_object() {
                        collect_map_fields(obj, out);
                    }
                }
            } else if let Some(obj) = value.as_object() {
                collect_map_fields(obj, out);
            }
        } else {
            out.insert(root_segment(key).to_string());
        }
    }
}

fn root_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Resolves a dotted field path against a record.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

fn compare_matches(actual: Option<&Value>, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => equality_matches(actual, expected),
        CompareOp::Ne => !equality_matches(actual, expected),
        CompareOp::In => membership_matches(actual, expected),
        CompareOp::Nin => !membership_matches(actual, expected),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let Some(actual) = actual else { return false };
            let Some(ordering) = compare_values(actual, expected) else {
                return false;
            };
            match op {
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Gte => ordering.is_ge(),
                CompareOp::Lt => ordering.is_lt(),
                _ => ordering.is_le(),
            }
        }
    }
}

/// Equality with the usual array-containment convenience: a scalar matches
/// an array field that contains it.
fn equality_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(actual) => {
            actual == expected
                || actual
                    .as_array()
                    .is_some_and(|items| items.contains(expected))
        }
    }
}

fn membership_matches(actual: Option<&Value>, expected: &Value) -> bool {
    expected
        .as_array()
        .is_some_and(|allowed| allowed.iter().any(|e| equality_matches(actual, e)))
}

fn compare_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Best-effort evaluation of an opaque caller term against a record.
fn opaque_matches(map: &Map<String, Value>, record: &Value) -> bool {
    map.iter().all(|(key, value)| match key.as_str() {
        "$and" => value
            .as_array()
            .is_none_or(|items| items.iter().all(|i| opaque_item_matches(i, record))),
        "$or" => value
            .as_array()
            .is_none_or(|items| items.iter().any(|i| opaque_item_matches(i, record))),
        "$nor" => value
            .as_array()
            .is_none_or(|items| !items.iter().any(|i| opaque_item_matches(i, record))),
        "$not" => value
            .as_object()
            .is_none_or(|obj| !opaque_matches(obj, record)),
        key if key.starts_with('$') => true,
        field => field_matches(lookup(record, field), value),
    })
}

fn opaque_item_matches(item: &Value, record: &Value) -> bool {
    item.as_object().is_none_or(|obj| opaque_matches(obj, record))
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    if let Some(obj) = expected.as_object()
        && !obj.is_empty()
        && obj.keys().all(|k| k.starts_with('$'))
    {
        return obj
            .iter()
            .all(|(op, rhs)| match CompareOp::from_operator(op) {
                Some(op) => compare_matches(actual, op, rhs),
                None => true,
            });
    }
    compare_matches(actual, CompareOp::Eq, expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_equality_as_bare_value() {
        let pred = Predicate::eq("userId", 1);
        assert_eq!(pred.to_value(), json!({"userId": 1}));
    }

    #[test]
    fn test_render_operator_comparison() {
        let pred = Predicate::compare("age", CompareOp::Gte, 18);
        assert_eq!(pred.to_value(), json!({"age": {"$gte": 18}}));
    }

    #[test]
    fn test_render_logical_nodes() {
        let pred = Predicate::Or(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]);
        assert_eq!(pred.to_value(), json!({"$or": [{"a": 1}, {"b": 2}]}));

        let pred = Predicate::Nor(vec![Predicate::eq("a", 1)]);
        assert_eq!(pred.to_value(), json!({"$nor": [{"a": 1}]}));
    }

    #[test]
    fn test_parse_condition_round_trips() {
        let condition = obj(json!({"userId": 1, "age": {"$gte": 18}}));
        let pred = Predicate::from_condition(&condition);
        assert_eq!(
            pred,
            Predicate::And(vec![
                Predicate::eq("userId", 1),
                Predicate::compare("age", CompareOp::Gte, 18),
            ])
        );
    }

    #[test]
    fn test_parse_respects_whitelist() {
        let whitelist: IndexSet<String> = ["$and".to_string()].into_iter().collect();
        let doc = obj(json!({"$or": [{"a": 1}], "b": 2}));
        let pred = Predicate::parse_document(&doc, Some(&whitelist));
        // $or is not whitelisted, so it survives as an opaque term.
        assert_eq!(
            pred,
            Predicate::And(vec![
                Predicate::Opaque(obj(json!({"$or": [{"a": 1}]}))),
                Predicate::eq("b", 2),
            ])
        );
    }

    #[test]
    fn test_unknown_operator_object_stays_opaque() {
        let doc = obj(json!({"name": {"$like": "Smi%"}}));
        let pred = Predicate::from_condition(&doc);
        assert_eq!(pred, Predicate::Opaque(obj(json!({"name": {"$like": "Smi%"}}))));
    }

    #[test]
    fn test_matches_record_comparisons() {
        let record = json!({"userId": 1, "age": 30, "tags": ["a", "b"]});
        assert!(Predicate::eq("userId", 1).matches_record(&record));
        assert!(!Predicate::eq("userId", 2).matches_record(&record));
        assert!(Predicate::compare("age", CompareOp::Gt, 18).matches_record(&record));
        assert!(Predicate::compare("age", CompareOp::Lte, 30).matches_record(&record));
        assert!(Predicate::eq("tags", "a").matches_record(&record));
        assert!(
            Predicate::compare("userId", CompareOp::In, json!([1, 5])).matches_record(&record)
        );
        assert!(
            Predicate::compare("userId", CompareOp::Nin, json!([2, 3])).matches_record(&record)
        );
    }

    #[test]
    fn test_matches_record_dotted_path() {
        let record = json!({"owner": {"id": 7}});
        assert!(Predicate::eq("owner.id", 7).matches_record(&record));
        assert!(!Predicate::eq("owner.id", 8).matches_record(&record));
    }

    #[test]
    fn test_matches_record_logical() {
        let record = json!({"a": 1, "b": 2});
        let or = Predicate::Or(vec![Predicate::eq("a", 9), Predicate::eq("b", 2)]);
        assert!(or.matches_record(&record));
        let nor = Predicate::Nor(vec![Predicate::eq("a", 1)]);
        assert!(!nor.matches_record(&record));
        let not = Predicate::Not(Box::new(Predicate::eq("a", 9)));
        assert!(not.matches_record(&record));
    }

    #[test]
    fn test_fields_referenced_uses_root_segments() {
        let pred = Predicate::And(vec![
            Predicate::eq("owner.id", 7),
            Predicate::Or(vec![Predicate::eq("status", "open")]),
            Predicate::Opaque(obj(json!({"$or": [{"archived": false}]}))),
        ]);
        let mut out = IndexSet::new();
        pred.fields_referenced(&mut out);
        let fields: Vec<&str> = out.iter().map(String::as_str).collect();
        assert_eq!(fields, vec!["owner", "status", "archived"]);
    }

    #[test]
    fn test_negated_operator_is_an_involution() {
        for op in [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Gt,
            CompareOp::Gte,
            CompareOp::Lt,
            CompareOp::Lte,
            CompareOp::In,
            CompareOp::Nin,
        ] {
            assert_eq!(op.negated().negated(), op);
        }
    }
}
