//! Schema Canonicalizer
//!
//! Normalization of JSON-shaped schema documents into a canonical form.
//!
//! This library resolves `$ref` chains (including cycles) into shared node
//! instances, merges `allOf` lists under keyword-aware policies, optionally
//! lifts `oneOf`/`anyOf` outward, and tracks where every resulting field
//! came from. Provenance, content hashes, and other metadata live in side
//! tables and only appear in the output under explicitly configured marker
//! keys.
//!
//! # Example
//!
//! ```
//! use schema_canon::{normalize, NormalizeOptions};
//! use serde_json::json;
//!
//! let document = json!({
//!     "person": {
//!         "allOf": [
//!             { "type": "object", "minProperties": 1 },
//!             { "minProperties": 2, "title": "Person" }
//!         ]
//!     }
//! });
//!
//! let options = NormalizeOptions::new();
//! let result = normalize(&document, &options).unwrap();
//!
//! // Bounds tighten, annotations take the last value.
//! assert_eq!(result.to_value()["person"], json!({
//!     "type": "object",
//!     "minProperties": 2,
//!     "title": "Person"
//! }));
//! ```
//!
//! # Merge Policies
//!
//! | Keywords | Policy |
//! |----------|--------|
//! | `minimum`, `maximum`, `minLength`, ... | most restrictive bound wins |
//! | `multipleOf` | least common multiple |
//! | `enum`, `type` | intersection |
//! | `required` | union |
//! | `properties` | merged per property |
//! | `title`, `description`, `default`, `examples` | last value wins |
//!
//! Contradictions (an empty `enum` intersection, disjoint `type` sets,
//! disagreeing `const` values) report through `on_merge_error` and, when
//! synthetic changes are allowed, collapse to `{"type": "nothing"}`.
//!
//! # Metadata Markers
//!
//! Each kind of metadata stays out of the document until its marker key is
//! configured. With `origins_flag("x-origins")` a normalized node carries
//! its field provenance inline:
//!
//! ```json
//! {
//!     "type": "string",
//!     "x-origins": { "type": ["/defs/name/allOf/0/type"] }
//! }
//! ```
//!
//! [`denormalize`] strips every configured marker key back out of a tree.

mod error;
mod graph;
mod hash;
mod lift;
mod loader;
mod merge;
mod normalize;
mod origins;
mod resolver;
mod rules;
mod types;
mod walker;

pub use error::{LoadError, NormalizeError};
pub use graph::{pointer_segments, Node, NodeId, Segment};
pub use loader::{load_document, load_document_str};
pub use normalize::{
    denormalize, denormalize_keys, normalize, normalize_with_rules, normalize_with_source,
    NormalizedDocument,
};
pub use origins::OriginId;
pub use rules::{JsonSchemaRules, KeyRule, Role, RuleSet};
pub use types::{json_type_name, Combinator, MergeErrorHandler, NormalizeOptions, RefErrorHandler};
