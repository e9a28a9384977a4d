//! # palisade-query
//!
//! Rule-set to storage-query compilation for the Palisade access-control
//! engine: dialect-specific negation strategies, predicate normalization,
//! and the merge step that ANDs the compiled restriction into the caller's
//! query without disturbing terms the engine does not understand.
//!
//! ## Example
//!
//! ```
//! use palisade_core::StaticAbility;
//! use palisade_query::{CompiledRestriction, NegationDialect, compile_restriction};
//! use serde_json::json;
//!
//! let ability = StaticAbility::builder()
//!     .can("read", "articles")
//!     .when(json!({"authorId": 7}))
//!     .build();
//!
//! let compiled =
//!     compile_restriction(&ability, "read", "articles", NegationDialect::NativeUnary).unwrap();
//! assert!(matches!(compiled, CompiledRestriction::Where(_)));
//! ```

mod compiler;
mod dialect;
mod merge;
mod normalize;

pub use compiler::{CompiledRestriction, compile_restriction};
pub use dialect::NegationDialect;
pub use merge::{default_operator_whitelist, merge_restriction, parse_query};
pub use normalize::simplify;
