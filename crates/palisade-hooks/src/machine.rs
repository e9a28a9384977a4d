//! Operation authorization state machine.
//!
//! For every request the hook runtime invokes [`AuthzEngine::pre_operation`]
//! before the store call and [`AuthzEngine::post_operation`] after it;
//! [`AuthzEngine::execute`] sequences the whole thing for runtimes that
//! delegate the store calls too. Pre-phase and post-phase run strictly
//! sequentially around the store operation: authorization never overlaps
//! the call it gates, and no trimmed payload is ever submitted when the
//! preceding permission fetch failed.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use palisade_core::{
    Ability, AccessError, AccessResult, FieldSelection, RedactOptions, StoreError,
    expand_selection, minimal_fields, project_record, restrict_to_requested,
};
use palisade_query::{CompiledRestriction, compile_restriction, merge_restriction};

use crate::config::EngineConfig;
use crate::context::{
    OperationContext, OperationKind, query_without_selection, selection_from_query, set_selection,
};
use crate::store::RecordStore;

/// What an operation produced, before and after redaction.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    /// A single record.
    One(Value),
    /// Zero or more records.
    Many(Vec<Value>),
}

/// Pre-phase facts the post-phase needs.
///
/// Opaque to the runtime; build it with `pre_operation` and hand it back
/// unchanged to `post_operation`.
#[derive(Debug, Default)]
pub struct PhaseState {
    skip: bool,
    match_nothing: bool,
    original_select: Option<Vec<String>>,
    universe: Option<IndexSet<String>>,
}

/// The per-request authorization engine.
///
/// Holds only configuration; every evaluation is a pure function of the
/// request's context and the store callbacks, so one engine serves any
/// number of concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct AuthzEngine {
    config: EngineConfig,
}

impl AuthzEngine {
    /// Creates an engine from explicit configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the pre-operation phase.
    ///
    /// Depending on the operation kind this compiles and merges the
    /// condition restriction into the query, expands the caller's field
    /// selection so rule conditions stay evaluable, performs the
    /// permission pre-fetch for identified writes, and trims write
    /// payloads to writable fields. Query-scoped operations (find and
    /// bulk mutations) pass a type-level permission gate before any
    /// restriction is compiled; identified operations are judged against
    /// the concrete record instead.
    ///
    /// # Errors
    ///
    /// Denials surface as `NotFound` for identified records and
    /// `Forbidden` otherwise; configuration and store errors pass through.
    pub async fn pre_operation(
        &self,
        ctx: &mut OperationContext<'_>,
        store: &dyn RecordStore,
    ) -> AccessResult<PhaseState> {
        let mut state = PhaseState::default();

        if ctx.internal && !self.config.check_internal_calls {
            tracing::trace!(resource_type = %ctx.resource_type, "internal call passes through unchecked");
            state.skip = true;
            return Ok(state);
        }
        self.config.validate()?;
        let Some(ability) = ctx.ability else {
            return Err(self.deny(
                ctx,
                AccessError::forbidden("no ability available for this call"),
            ));
        };

        state.universe = self.config.available_fields.resolve(ctx);
        state.original_select = selection_from_query(&ctx.query)?;

        match ctx.kind {
            OperationKind::Get => {
                // Identifier lookups bypass query restriction; the ability
                // is evaluated against the fetched record post-phase.
                self.expand_ctx_selection(ctx, ability, &state);
            }
            OperationKind::Find => {
                self.assert_action_granted(ctx, ability)?;
                state.match_nothing = self.restrict_ctx_query(ctx, ability)?;
                self.expand_ctx_selection(ctx, ability, &state);
            }
            OperationKind::Create => {
                let Some(payload) = ctx.payload.as_ref() else {
                    return Err(AccessError::configuration("create requires a payload"));
                };
                let items: Vec<&Value> = match payload {
                    Value::Array(items) => items.iter().collect(),
                    single => vec![single],
                };
                // One denial fails the whole batch before anything is
                // created.
                for item in items {
                    if !ability.can(&ctx.action, &ctx.resource_type, Some(item)) {
                        return Err(self.deny(
                            ctx,
                            AccessError::forbidden("not allowed to create this record"),
                        ));
                    }
                }
            }
            OperationKind::Update | OperationKind::Patch | OperationKind::Remove => {
                if let Some(id) = ctx.id.clone() {
                    // The ability must be evaluated against the original
                    // state, never the data the caller is trying to write.
                    let fetch_query = query_without_selection(&ctx.query);
                    let original = store
                        .fetch_by_id(&ctx.resource_type, &id, &fetch_query)
                        .await?
                        .ok_or_else(|| AccessError::not_found(&ctx.resource_type, &id))?;
                    if !ability.can(&ctx.action, &ctx.resource_type, Some(&original)) {
                        return Err(
                            self.deny(ctx, AccessError::not_found(&ctx.resource_type, &id))
                        );
                    }
                    if ctx.kind.has_payload() {
                        self.trim_payload(ctx, ability, Some(&original), &state)?;
                    }
                } else {
                    if ctx.kind == OperationKind::Update {
                        return Err(AccessError::configuration(
                            "update requires an identifier",
                        ));
                    }
                    // A bulk mutation has no record to evaluate before the
                    // store call, so the type-level gate is the only thing
                    // standing between a ruleless ability and the whole
                    // collection.
                    self.assert_action_granted(ctx, ability)?;
                    state.match_nothing = self.restrict_ctx_query(ctx, ability)?;
                    if ctx.kind.has_payload() {
                        // Per-record evaluation is not possible before a
                        // bulk mutation; trim once against the
                        // record-free field rules.
                        self.trim_payload(ctx, ability, None, &state)?;
                    }
                }
            }
        }
        Ok(state)
    }

    /// Runs the post-operation phase: per-record redaction and projection,
    /// with the caller's original selection restored.
    ///
    /// # Errors
    ///
    /// A singular result that redacts to nothing is a `Forbidden` (for
    /// `Get`, a denied ability is `NotFound` so existence stays hidden).
    pub fn post_operation(
        &self,
        ctx: &OperationContext<'_>,
        state: &PhaseState,
        output: OperationOutput,
    ) -> AccessResult<OperationOutput> {
        if state.skip {
            return Ok(output);
        }
        let Some(ability) = ctx.ability else {
            return Ok(output);
        };
        let options = RedactOptions {
            universe: state.universe.as_ref(),
            check_can: false,
        };

        match output {
            OperationOutput::One(record) => {
                if ctx.kind == OperationKind::Get
                    && !ability.can(&ctx.action, &ctx.resource_type, Some(&record))
                {
                    let id = ctx.id.clone().unwrap_or_default();
                    return Err(self.deny(ctx, AccessError::not_found(&ctx.resource_type, id)));
                }
                let mut selection = minimal_fields(
                    ability,
                    &ctx.action,
                    &ctx.resource_type,
                    Some(&record),
                    &options,
                );
                if let Some(requested) = &state.original_select {
                    selection = restrict_to_requested(&selection, requested);
                }
                if selection.is_forbidden() {
                    return Err(self.deny(
                        ctx,
                        AccessError::forbidden("record exists but none of its fields are visible"),
                    ));
                }
                let projected = project_record(&record, &selection);
                let hidden_everything = !selection.is_unrestricted()
                    && projected.as_object().is_some_and(Map::is_empty)
                    && record.as_object().is_some_and(|source| !source.is_empty());
                if hidden_everything {
                    return Err(self.deny(
                        ctx,
                        AccessError::forbidden("record exists but none of its fields are visible"),
                    ));
                }
                Ok(OperationOutput::One(projected))
            }
            OperationOutput::Many(records) => {
                let check = RedactOptions {
                    check_can: true,
                    ..options
                };
                let mut out = Vec::with_capacity(records.len());
                for record in records {
                    let mut selection = minimal_fields(
                        ability,
                        &ctx.action,
                        &ctx.resource_type,
                        Some(&record),
                        &check,
                    );
                    if selection.is_forbidden() {
                        // A correctly compiled query should not have
                        // returned this record; the post-check is the
                        // final authority.
                        tracing::trace!(resource_type = %ctx.resource_type, "dropping record denied to caller");
                        continue;
                    }
                    if let Some(requested) = &state.original_select {
                        selection = restrict_to_requested(&selection, requested);
                    }
                    out.push(project_record(&record, &selection));
                }
                Ok(OperationOutput::Many(out))
            }
        }
    }

    /// Sequences pre-phase, store call and post-phase for one operation.
    ///
    /// # Errors
    ///
    /// Everything `pre_operation` and `post_operation` return, plus store
    /// failures, which abort the sequence where they occur.
    pub async fn execute(
        &self,
        mut ctx: OperationContext<'_>,
        store: &dyn RecordStore,
    ) -> AccessResult<OperationOutput> {
        let state = self.pre_operation(&mut ctx, store).await?;

        let output = if state.match_nothing {
            OperationOutput::Many(Vec::new())
        } else {
            match ctx.kind {
                OperationKind::Get => {
                    let Some(id) = ctx.id.clone() else {
                        return Err(AccessError::configuration("get requires an identifier"));
                    };
                    let record = store
                        .fetch_by_id(&ctx.resource_type, &id, &ctx.query)
                        .await?
                        .ok_or_else(|| AccessError::not_found(&ctx.resource_type, &id))?;
                    OperationOutput::One(record)
                }
                OperationKind::Find => {
                    OperationOutput::Many(store.run_query(&ctx.resource_type, &ctx.query).await?)
                }
                _ => {
                    let records = store
                        .mutate(
                            ctx.kind,
                            &ctx.resource_type,
                            ctx.id.as_deref(),
                            &ctx.query,
                            ctx.payload.as_ref(),
                        )
                        .await?;
                    if ctx.is_singular() {
                        let record = records.into_iter().next().ok_or_else(|| {
                            StoreError::backend("store returned no record for a singular mutation")
                        })?;
                        OperationOutput::One(record)
                    } else {
                        OperationOutput::Many(records)
                    }
                }
            }
        };

        self.post_operation(&ctx, &state, output)
    }

    /// Type-level permission gate for query-scoped operations.
    ///
    /// Identified operations evaluate the ability against the concrete
    /// record instead; this gate covers the paths where no record exists
    /// before the store call.
    fn assert_action_granted(
        &self,
        ctx: &OperationContext<'_>,
        ability: &dyn Ability,
    ) -> AccessResult<()> {
        if ability
            .possible_rules_for(&ctx.action, &ctx.resource_type)
            .is_empty()
        {
            if self.config.allow_when_no_rules {
                tracing::trace!(
                    action = %ctx.action,
                    resource_type = %ctx.resource_type,
                    "no rules for action, proceeding unrestricted"
                );
                return Ok(());
            }
            return Err(self.deny(
                ctx,
                AccessError::forbidden("no rule grants this action on this resource type"),
            ));
        }
        if !ability.can(&ctx.action, &ctx.resource_type, None) {
            return Err(self.deny(
                ctx,
                AccessError::forbidden("action is forbidden on this resource type"),
            ));
        }
        Ok(())
    }

    fn restrict_ctx_query(
        &self,
        ctx: &mut OperationContext<'_>,
        ability: &dyn Ability,
    ) -> AccessResult<bool> {
        match compile_restriction(ability, &ctx.action, &ctx.resource_type, self.config.dialect)? {
            CompiledRestriction::Unrestricted => Ok(false),
            CompiledRestriction::Nothing => Ok(true),
            CompiledRestriction::Where(predicate) => {
                ctx.query =
                    merge_restriction(&ctx.query, &predicate, &self.config.operator_whitelist)?;
                Ok(false)
            }
        }
    }

    fn expand_ctx_selection(
        &self,
        ctx: &mut OperationContext<'_>,
        ability: &dyn Ability,
        state: &PhaseState,
    ) {
        if let Some(requested) = &state.original_select
            && let Some(expanded) =
                expand_selection(requested, ability, &ctx.action, &ctx.resource_type)
        {
            set_selection(&mut ctx.query, &expanded);
        }
    }

    fn trim_payload(
        &self,
        ctx: &mut OperationContext<'_>,
        ability: &dyn Ability,
        original: Option<&Value>,
        state: &PhaseState,
    ) -> AccessResult<()> {
        let selection = minimal_fields(
            ability,
            &ctx.action,
            &ctx.resource_type,
            original,
            &RedactOptions {
                universe: state.universe.as_ref(),
                check_can: false,
            },
        );
        let everything_dropped = match &selection {
            FieldSelection::Unrestricted => false,
            FieldSelection::Forbidden => {
                let Some(object) = ctx.payload.as_mut().and_then(Value::as_object_mut) else {
                    return Ok(());
                };
                let had_fields = !object.is_empty();
                object.clear();
                had_fields
            }
            FieldSelection::Fields(allowed) => {
                let Some(object) = ctx.payload.as_mut().and_then(Value::as_object_mut) else {
                    return Ok(());
                };
                let had_fields = !object.is_empty();
                object.retain(|key, _| allowed.contains(key));
                had_fields && object.is_empty()
            }
        };
        if everything_dropped {
            return Err(self.deny(
                ctx,
                AccessError::forbidden("none of the submitted fields are writable"),
            ));
        }
        Ok(())
    }

    fn deny(&self, ctx: &OperationContext<'_>, error: AccessError) -> AccessError {
        tracing::debug!(
            kind = ?ctx.kind,
            action = %ctx.action,
            resource_type = %ctx.resource_type,
            %error,
            "authorization denied"
        );
        if let Some(hook) = &self.config.on_forbidden {
            hook(ctx, &error);
        }
        error
    }
}
