//! # palisade-hooks
//!
//! The operation authorization state machine of the Palisade engine. For
//! each CRUD-style operation (single item, bulk-by-query, or creation) it
//! sequences query restriction, conditional-select expansion, permission
//! pre-fetches, payload trimming and per-record projection around the
//! store calls the hook runtime hands it.
//!
//! All work is request-scoped: the engine holds configuration only, and
//! every evaluation is a pure function of the operation context and the
//! store callbacks. Cancellation and timeouts belong to the surrounding
//! store and transport layers; a failed permission fetch simply aborts the
//! sequence before any mutation is submitted.
//!
//! ## Example
//!
//! ```ignore
//! use palisade_core::StaticAbility;
//! use palisade_hooks::{AuthzEngine, EngineConfig, OperationContext};
//! use serde_json::json;
//!
//! let engine = AuthzEngine::new(EngineConfig::default().with_universe(["id", "title"]));
//! let ability = StaticAbility::builder()
//!     .can("read", "articles")
//!     .when(json!({"authorId": 7}))
//!     .build();
//!
//! let ctx = OperationContext::find("articles", json!({})).with_ability(&ability);
//! let output = engine.execute(ctx, &store).await?;
//! ```

mod config;
mod context;
mod machine;
mod store;

pub use config::{EngineConfig, ForbiddenHook, Provided};
pub use context::{
    OperationContext, OperationKind, SELECT_KEY, query_without_selection, selection_from_query,
    set_selection,
};
pub use machine::{AuthzEngine, OperationOutput, PhaseState};
pub use store::RecordStore;

// The compile/project/expand primitives are part of this crate's surface
// so a hook runtime only needs one dependency.
pub use palisade_core::{
    FieldSelection, RedactOptions, expand_selection, minimal_fields, project_record,
    restrict_to_requested,
};
pub use palisade_query::{CompiledRestriction, NegationDialect, compile_restriction};
