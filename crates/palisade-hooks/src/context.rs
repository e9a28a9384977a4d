//! Per-operation context.
//!
//! One [`OperationContext`] is built per request from what the hook runtime
//! knows: the operation kind, single-vs-bulk shape, identifier, caller
//! query, write payload, and the ability (absent for internal calls). The
//! context is discarded when the request completes; nothing here outlives
//! a request.

use serde_json::{Map, Value};

use palisade_core::{Ability, AccessError, AccessResult};

/// The query key carrying the caller's field selection.
pub const SELECT_KEY: &str = "$select";

/// CRUD-style operation categories the state machine sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Fetch one record by identifier.
    Get,
    /// Query-based fetch.
    Find,
    /// Create one record or a batch.
    Create,
    /// Full replacement of one identified record.
    Update,
    /// Partial write, by identifier or in bulk by query.
    Patch,
    /// Removal, by identifier or in bulk by query.
    Remove,
}

impl OperationKind {
    /// The default ability action checked for this operation.
    #[must_use]
    pub fn default_action(&self) -> &'static str {
        match self {
            Self::Get | Self::Find => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Remove => "remove",
        }
    }

    /// Whether the operation writes through a payload.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Patch)
    }
}

/// Everything the state machine needs to know about one request.
pub struct OperationContext<'a> {
    /// Operation category.
    pub kind: OperationKind,
    /// Ability action name; defaults to [`OperationKind::default_action`].
    pub action: String,
    /// Resource type the operation targets.
    pub resource_type: String,
    /// Identifier for single-record operations.
    pub id: Option<String>,
    /// Caller-supplied query document, including any `$select`.
    pub query: Value,
    /// Caller-supplied write payload.
    pub payload: Option<Value>,
    /// The caller's ability, absent for unauthenticated internal calls.
    pub ability: Option<&'a dyn Ability>,
    /// Explicit internal-call marker set by the transport layer. Never
    /// inferred from the absence of an ability.
    pub internal: bool,
}

impl<'a> OperationContext<'a> {
    fn new(kind: OperationKind, resource_type: impl Into<String>) -> Self {
        Self {
            kind,
            action: kind.default_action().to_string(),
            resource_type: resource_type.into(),
            id: None,
            query: Value::Object(Map::new()),
            payload: None,
            ability: None,
            internal: false,
        }
    }

    /// Context for a fetch-by-identifier.
    #[must_use]
    pub fn get(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        let mut ctx = Self::new(OperationKind::Get, resource_type);
        ctx.id = Some(id.into());
        ctx
    }

    /// Context for a query-based fetch.
    #[must_use]
    pub fn find(resource_type: impl Into<String>, query: Value) -> Self {
        let mut ctx = Self::new(OperationKind::Find, resource_type);
        ctx.query = query;
        ctx
    }

    /// Context for a creation; an array payload is a multi-create batch.
    #[must_use]
    pub fn create(resource_type: impl Into<String>, payload: Value) -> Self {
        let mut ctx = Self::new(OperationKind::Create, resource_type);
        ctx.payload = Some(payload);
        ctx
    }

    /// Context for a full update of one identified record.
    #[must_use]
    pub fn update(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        payload: Value,
    ) -> Self {
        let mut ctx = Self::new(OperationKind::Update, resource_type);
        ctx.id = Some(id.into());
        ctx.payload = Some(payload);
        ctx
    }

    /// Context for a patch; `id: None` makes it a bulk patch by query.
    #[must_use]
    pub fn patch(
        resource_type: impl Into<String>,
        id: Option<String>,
        payload: Value,
        query: Value,
    ) -> Self {
        let mut ctx = Self::new(OperationKind::Patch, resource_type);
        ctx.id = id;
        ctx.payload = Some(payload);
        ctx.query = query;
        ctx
    }

    /// Context for a removal; `id: None` makes it a bulk removal by query.
    #[must_use]
    pub fn remove(resource_type: impl Into<String>, id: Option<String>, query: Value) -> Self {
        let mut ctx = Self::new(OperationKind::Remove, resource_type);
        ctx.id = id;
        ctx.query = query;
        ctx
    }

    /// Attaches the caller's ability.
    #[must_use]
    pub fn with_ability(mut self, ability: &'a dyn Ability) -> Self {
        self.ability = Some(ability);
        self
    }

    /// Replaces the query document.
    #[must_use]
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    /// Overrides the ability action checked for this operation.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Marks the request as an internal call.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Whether the operation addresses exactly one record.
    #[must_use]
    pub fn is_singular(&self) -> bool {
        match self.kind {
            OperationKind::Get | OperationKind::Update => true,
            OperationKind::Find => false,
            OperationKind::Patch | OperationKind::Remove => self.id.is_some(),
            OperationKind::Create => !matches!(self.payload, Some(Value::Array(_))),
        }
    }
}

impl std::fmt::Debug for OperationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("kind", &self.kind)
            .field("action", &self.action)
            .field("resource_type", &self.resource_type)
            .field("id", &self.id)
            .field("query", &self.query)
            .field("payload", &self.payload)
            .field("has_ability", &self.ability.is_some())
            .field("internal", &self.internal)
            .finish()
    }
}

/// Extracts the caller's `$select` field list from a query document.
///
/// # Errors
///
/// Returns a configuration error when `$select` is present but is not an
/// array of field names.
pub fn selection_from_query(query: &Value) -> AccessResult<Option<Vec<String>>> {
    let Some(value) = query.get(SELECT_KEY) else {
        return Ok(None);
    };
    let items = value.as_array().ok_or_else(|| {
        AccessError::configuration("$select must be an array of field names")
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(ToString::to_string).ok_or_else(|| {
                AccessError::configuration("$select entries must be field names")
            })
        })
        .collect::<AccessResult<Vec<String>>>()
        .map(Some)
}

/// Replaces the `$select` list in a query document.
pub fn set_selection(query: &mut Value, fields: &[String]) {
    if let Some(map) = query.as_object_mut() {
        map.insert(
            SELECT_KEY.to_string(),
            Value::Array(fields.iter().cloned().map(Value::String).collect()),
        );
    }
}

/// A copy of the query with any `$select` removed, for permission
/// pre-fetches that must see the whole record.
#[must_use]
pub fn query_without_selection(query: &Value) -> Value {
    match query.as_object() {
        Some(map) => {
            let mut copy = map.clone();
            copy.shift_remove(SELECT_KEY);
            Value::Object(copy)
        }
        None => query.clone(),
    }
}
