//! Rules and the consumed ability interface.
//!
//! The engine never owns rule storage or evaluation; it consumes an ordered
//! rule list through the narrow [`Ability`] trait and inspects nothing
//! beyond the four [`Rule`] fields. [`StaticAbility`] is the adapter shim
//! around that contract: an in-memory rule list with a plain structural
//! condition matcher, suitable for wrapping an external rule engine's
//! output and for tests.

use indexmap::IndexSet;
use serde_json::Value;

use crate::predicate::Predicate;

/// The action wildcard: a rule for `manage` applies to every action.
pub const MANAGE: &str = "manage";

/// The resource-type wildcard: a rule on `all` applies to every type.
pub const ALL: &str = "all";

/// One permission rule, scoped to an action and a resource type.
///
/// Immutable once built. Rule order is significant: later rules take
/// precedence for polarity, while field restrictions accumulate across all
/// matching rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Action this rule is scoped to (`read`, `patch`, ... or [`MANAGE`]).
    pub action: String,
    /// Resource type this rule is scoped to, or [`ALL`].
    pub resource_type: String,
    /// Attribute condition, if any. `None` means the rule applies to every
    /// record of the type.
    pub condition: Option<Predicate>,
    /// Allowed (or, for inverted rules, removed) fields. `None` means the
    /// rule says nothing about fields.
    pub fields: Option<IndexSet<String>>,
    /// `true` for forbidding rules.
    pub inverted: bool,
}

impl Rule {
    /// Creates a permitting rule with no condition and no field list.
    #[must_use]
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            condition: None,
            fields: None,
            inverted: false,
        }
    }

    /// Returns `true` if this rule is scoped to the given action and
    /// resource type, honoring the `manage`/`all` wildcards.
    #[must_use]
    pub fn relevant_to(&self, action: &str, resource_type: &str) -> bool {
        (self.action == action || self.action == MANAGE)
            && (self.resource_type == resource_type || self.resource_type == ALL)
    }
}

/// The consumed rule-evaluation interface.
///
/// `rules_for` returns rules whose conditions can be pushed down into a
/// storage query; `possible_rules_for` returns every rule regardless of
/// pushability. Both preserve declaration order.
pub trait Ability: Send + Sync {
    /// Ordered rules for this action/type whose conditions are
    /// query-pushable.
    fn rules_for(&self, action: &str, resource_type: &str) -> Vec<&Rule>;

    /// Ordered rules for this action/type, pushable or not.
    fn possible_rules_for(&self, action: &str, resource_type: &str) -> Vec<&Rule>;

    /// Evaluates one rule's condition against a concrete record.
    fn matches(&self, rule: &Rule, record: &Value) -> bool;

    /// Whether the action is permitted, on a concrete record when one is
    /// available or on the type alone otherwise. Later rules win.
    fn can(&self, action: &str, resource_type: &str, record: Option<&Value>) -> bool;
}

/// In-memory [`Ability`] backed by an ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct StaticAbility {
    rules: Vec<Rule>,
}

impl StaticAbility {
    /// Starts building an ability from an empty rule list.
    #[must_use]
    pub fn builder() -> AbilityBuilder {
        AbilityBuilder::default()
    }

    fn relevant(&self, action: &str, resource_type: &str) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.relevant_to(action, resource_type))
            .collect()
    }
}

impl Ability for StaticAbility {
    fn rules_for(&self, action: &str, resource_type: &str) -> Vec<&Rule> {
        // Static conditions are plain predicate trees, always pushable.
        self.relevant(action, resource_type)
    }

    fn possible_rules_for(&self, action: &str, resource_type: &str) -> Vec<&Rule> {
        self.relevant(action, resource_type)
    }

    fn matches(&self, rule: &Rule, record: &Value) -> bool {
        rule.condition
            .as_ref()
            .is_none_or(|condition| condition.matches_record(record))
    }

    fn can(&self, action: &str, resource_type: &str, record: Option<&Value>) -> bool {
        for rule in self.rules.iter().rev() {
            if !rule.relevant_to(action, resource_type) {
                continue;
            }
            let matched = match record {
                Some(record) => self.matches(rule, record),
                // Type-level checks: a conditioned permit could match some
                // record, while a conditioned forbid only rules out some
                // records and says nothing about the type as a whole.
                None => rule.condition.is_none() || !rule.inverted,
            };
            if matched {
                return !rule.inverted;
            }
        }
        false
    }
}

/// Builder for [`StaticAbility`]. `when` and `fields` refine the most
/// recently added rule.
#[derive(Debug, Clone, Default)]
pub struct AbilityBuilder {
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    /// Adds a permitting rule.
    #[must_use]
    pub fn can(mut self, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        self.rules.push(Rule::new(action, resource_type));
        self
    }

    /// Adds a forbidding rule.
    #[must_use]
    pub fn cannot(mut self, action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let mut rule = Rule::new(action, resource_type);
        rule.inverted = true;
        self.rules.push(rule);
        self
    }

    /// Attaches a condition document to the last rule. Non-object values
    /// are ignored.
    #[must_use]
    pub fn when(mut self, condition: Value) -> Self {
        if let (Some(rule), Some(map)) = (self.rules.last_mut(), condition.as_object()) {
            rule.condition = Some(Predicate::from_condition(map));
        }
        self
    }

    /// Attaches an explicit field list to the last rule.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(rule) = self.rules.last_mut() {
            rule.fields = Some(fields.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Finishes the build.
    #[must_use]
    pub fn build(self) -> StaticAbility {
        StaticAbility { rules: self.rules }
    }
}
