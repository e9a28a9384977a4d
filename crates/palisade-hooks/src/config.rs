//! Engine configuration.
//!
//! Everything the original system kept as process-wide mutable defaults is
//! an explicit configuration struct here, passed to the engine at
//! construction: the negation dialect, the backend operator whitelist, the
//! available-fields universe provider, the internal-call policy and the
//! denial callback. No ambient lookup happens anywhere.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use palisade_core::{AccessError, AccessResult};
use palisade_query::{NegationDialect, default_operator_whitelist};

use crate::context::OperationContext;

/// A value that is either configured statically or produced per request.
///
/// This replaces dynamic branching on "is it a value, a function or a
/// promise": providers are resolved exactly once, at the start of each
/// request, through this single uniform step.
pub enum Provided<T> {
    /// A static value used for every request.
    Value(T),
    /// A provider consulted once per request with the operation context.
    Provider(Arc<dyn Fn(&OperationContext<'_>) -> T + Send + Sync>),
}

impl<T: Clone> Provided<T> {
    /// Resolves the value for one request.
    #[must_use]
    pub fn resolve(&self, ctx: &OperationContext<'_>) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider(ctx),
        }
    }
}

impl<T: Default> Default for Provided<T> {
    fn default() -> Self {
        Self::Value(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Provided<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl<T> Clone for Provided<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Provider(provider) => Self::Provider(Arc::clone(provider)),
        }
    }
}

/// Callback invoked when the engine denies an operation, before the error
/// is surfaced to the caller.
pub type ForbiddenHook = Arc<dyn Fn(&OperationContext<'_>, &AccessError) + Send + Sync>;

/// Configuration for the authorization engine.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// How the target backend expresses negation. Selected here, once per
    /// engine, never inferred from predicate shape.
    pub dialect: NegationDialect,

    /// Logical and comparison operators the backend accepts.
    pub operator_whitelist: IndexSet<String>,

    /// When `true`, internal calls (those the transport marks as not
    /// externally provided) are authorized like external ones. The default
    /// passes them through unchecked; this is the deliberate, documented
    /// escape hatch for service-to-service calls.
    pub check_internal_calls: bool,

    /// When `true`, a query-scoped operation for which the ability holds
    /// no rules at all proceeds unrestricted instead of being denied.
    pub allow_when_no_rules: bool,

    /// The available-fields universe per request, usually keyed off the
    /// resource type. `None` means no universe is declared.
    #[serde(skip)]
    pub available_fields: Provided<Option<IndexSet<String>>>,

    /// Denial callback, for audit trails.
    #[serde(skip)]
    pub on_forbidden: Option<ForbiddenHook>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: NegationDialect::default(),
            operator_whitelist: default_operator_whitelist(),
            check_internal_calls: false,
            allow_when_no_rules: false,
            available_fields: Provided::default(),
            on_forbidden: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("dialect", &self.dialect)
            .field("operator_whitelist", &self.operator_whitelist)
            .field("check_internal_calls", &self.check_internal_calls)
            .field("allow_when_no_rules", &self.allow_when_no_rules)
            .field("available_fields", &self.available_fields)
            .field("has_on_forbidden", &self.on_forbidden.is_some())
            .finish()
    }
}

impl EngineConfig {
    /// Sets the negation dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: NegationDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Declares a static available-fields universe for every request.
    #[must_use]
    pub fn with_universe<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_fields =
            Provided::Value(Some(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Declares a per-request universe provider.
    #[must_use]
    pub fn with_universe_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&OperationContext<'_>) -> Option<IndexSet<String>> + Send + Sync + 'static,
    {
        self.available_fields = Provided::Provider(Arc::new(provider));
        self
    }

    /// Also authorize internal calls.
    #[must_use]
    pub fn with_internal_checks(mut self) -> Self {
        self.check_internal_calls = true;
        self
    }

    /// Let actions without any rules proceed unrestricted.
    #[must_use]
    pub fn with_allow_when_no_rules(mut self) -> Self {
        self.allow_when_no_rules = true;
        self
    }

    /// Checks that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the negation dialect emits an
    /// operator the backend whitelist excludes.
    pub fn validate(&self) -> AccessResult<()> {
        if let Some(operator) = self.dialect.wire_operator()
            && !self.operator_whitelist.contains(operator)
        {
            return Err(AccessError::configuration(format!(
                "negation dialect requires the {operator} operator, which the backend whitelist excludes"
            )));
        }
        Ok(())
    }

    /// Installs a denial callback.
    #[must_use]
    pub fn with_on_forbidden<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationContext<'_>, &AccessError) + Send + Sync + 'static,
    {
        self.on_forbidden = Some(Arc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_resolves_per_request() {
        let config = EngineConfig::default().with_universe_provider(|ctx| {
            (ctx.resource_type == "tests").then(|| ["id".to_string()].into_iter().collect())
        });
        let ctx = OperationContext::find("tests", json!({}));
        assert!(config.available_fields.resolve(&ctx).is_some());
        let other = OperationContext::find("comments", json!({}));
        assert!(config.available_fields.resolve(&other).is_none());
    }

    #[test]
    fn test_defaults_are_permissive_for_internal_calls_only() {
        let config = EngineConfig::default();
        assert!(!config.check_internal_calls);
        assert!(!config.allow_when_no_rules);
        assert!(config.operator_whitelist.contains("$and"));
    }

    #[test]
    fn test_validate_rejects_dialect_outside_whitelist() {
        let mut config = EngineConfig::default();
        config.operator_whitelist.shift_remove("$not");
        assert!(config.validate().is_err());

        // Comparison-flip emits no operator of its own.
        let mut flip = EngineConfig::default().with_dialect(NegationDialect::ComparisonFlip);
        flip.operator_whitelist.shift_remove("$not");
        assert!(flip.validate().is_ok());
    }

    #[test]
    fn test_config_deserializes_from_document() {
        let config: EngineConfig = serde_json::from_value(json!({
            "dialect": "comparison-flip",
            "checkInternalCalls": true,
        }))
        .unwrap();
        assert_eq!(config.dialect, NegationDialect::ComparisonFlip);
        assert!(config.check_internal_calls);
    }
}
