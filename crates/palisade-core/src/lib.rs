//! # palisade-core
//!
//! Core model for the Palisade attribute-based access-control engine: the
//! rule and ability interfaces consumed from an external rule evaluator,
//! the query predicate tree handed to storage backends, the field-selection
//! tri-state, and the field redaction engine with its conditional-select
//! expander.
//!
//! Everything here is request-scoped and free of shared mutable state:
//! predicate trees are built fresh per compilation and read-only once
//! constructed, and redaction is a pure function of its inputs.
//!
//! ## Example
//!
//! ```
//! use palisade_core::{FieldSelection, RedactOptions, StaticAbility, minimal_fields};
//! use serde_json::json;
//!
//! let ability = StaticAbility::builder()
//!     .can("read", "articles")
//!     .fields(["id", "title"])
//!     .build();
//!
//! let record = json!({"id": 1, "title": "hello", "draftNotes": "..."});
//! let selection = minimal_fields(&ability, "read", "articles", Some(&record), &RedactOptions::default());
//! assert_eq!(selection, FieldSelection::fields(["id", "title"]));
//! ```

pub mod ability;
pub mod error;
pub mod fields;
pub mod predicate;
pub mod redact;
pub mod select;

pub use ability::{ALL, Ability, AbilityBuilder, MANAGE, Rule, StaticAbility};
pub use error::{AccessError, AccessResult, StoreError};
pub use fields::{FieldSelection, SelectionKey};
pub use predicate::{CompareOp, Predicate};
pub use redact::{RedactOptions, minimal_fields, project_record};
pub use select::{expand_selection, restrict_to_requested};
