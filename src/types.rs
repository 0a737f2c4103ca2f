//! Core types for schema normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default recursion depth cap for a single normalization pass.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Composition keyword kind.
///
/// `allOf` intersects its members; `oneOf` and `anyOf` are union-style and
/// are the targets of combinator lifting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Combinator {
    AllOf,
    OneOf,
    AnyOf,
}

impl Combinator {
    /// Returns the document key for this combinator.
    pub fn key(&self) -> &'static str {
        match self {
            Combinator::AllOf => "allOf",
            Combinator::OneOf => "oneOf",
            Combinator::AnyOf => "anyOf",
        }
    }

    /// Parse a combinator from its document key.
    ///
    /// Returns `None` for non-combinator keys.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "allOf" => Some(Combinator::AllOf),
            "oneOf" => Some(Combinator::OneOf),
            "anyOf" => Some(Combinator::AnyOf),
            _ => None,
        }
    }

    /// True for the union-style combinators (`oneOf`, `anyOf`).
    pub fn is_union(&self) -> bool {
        matches!(self, Combinator::OneOf | Combinator::AnyOf)
    }
}

/// Callback invoked when a reference cannot be resolved.
///
/// Arguments: human-readable message, JSON Pointer to the referencing node,
/// the reference string itself.
pub type RefErrorHandler = Box<dyn Fn(&str, &str, &str)>;

/// Callback invoked when an `allOf` merge hits a conflict.
pub type MergeErrorHandler = Box<dyn Fn(&str)>;

/// Options for schema normalization.
///
/// Marker keys (`*_flag`) are opaque strings chosen by the caller; setting one
/// enables the corresponding tracked metadata, and [`crate::NormalizedDocument::to_value`]
/// embeds it under that key. Unset flags keep the output free of the metadata
/// entirely. Error callbacks report and continue; they never abort the call.
pub struct NormalizeOptions {
    /// Resolve `$ref` pointers into shared node instances.
    pub resolve_ref: bool,
    /// Merge `allOf` contributor lists into canonical nodes.
    pub merge_all_of: bool,
    /// Lift `oneOf`/`anyOf` to the outermost position per node.
    pub lift_combiners: bool,
    /// Structurally pre-check the input (combinator keys must hold arrays,
    /// references must be strings) and report anomalies via the callbacks.
    pub validate: bool,
    /// Permit synthetic `{"type": "nothing"}` / `{"type": "any"}` sentinels
    /// instead of dropping keywords on impossible or empty merges.
    pub allow_not_valid_synthetic_changes: bool,
    /// Marker key for per-field origin chains.
    pub origins_flag: Option<String>,
    /// Marker key for materialized keyword defaults.
    pub defaults_flag: Option<String>,
    /// Marker key tagging fabricated `title` values.
    pub synthetic_title_flag: Option<String>,
    /// Marker key tagging fabricated `allOf` wrappers.
    pub synthetic_all_of_flag: Option<String>,
    /// Marker key for the list of references traversed to reach a node.
    pub inline_refs_flag: Option<String>,
    /// Marker key for per-node content hashes.
    pub hash_flag: Option<String>,
    /// Give materialized defaults origin chains pointing at the field that
    /// implied them. Only meaningful with both `origins_flag` and
    /// `defaults_flag` set.
    pub create_origins_for_defaults: bool,
    /// Hard cap on recursion depth; exceeding it fails the call.
    pub max_depth: usize,
    /// Invoked for each unresolvable or malformed reference.
    pub on_ref_resolve_error: Option<RefErrorHandler>,
    /// Invoked for each merge conflict.
    pub on_merge_error: Option<MergeErrorHandler>,
}

impl NormalizeOptions {
    /// Create options with resolution and merging enabled, everything else off.
    pub fn new() -> Self {
        Self {
            resolve_ref: true,
            merge_all_of: true,
            lift_combiners: false,
            validate: false,
            allow_not_valid_synthetic_changes: false,
            origins_flag: None,
            defaults_flag: None,
            synthetic_title_flag: None,
            synthetic_all_of_flag: None,
            inline_refs_flag: None,
            hash_flag: None,
            create_origins_for_defaults: false,
            max_depth: DEFAULT_MAX_DEPTH,
            on_ref_resolve_error: None,
            on_merge_error: None,
        }
    }

    /// Set whether `$ref` pointers are resolved.
    pub fn resolve_ref(mut self, resolve: bool) -> Self {
        self.resolve_ref = resolve;
        self
    }

    /// Set whether `allOf` lists are merged.
    pub fn merge_all_of(mut self, merge: bool) -> Self {
        self.merge_all_of = merge;
        self
    }

    /// Set whether `oneOf`/`anyOf` are lifted outward.
    pub fn lift_combiners(mut self, lift: bool) -> Self {
        self.lift_combiners = lift;
        self
    }

    /// Set whether the structural pre-check runs.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Permit impossible/anything sentinels instead of dropped keywords.
    pub fn allow_not_valid_synthetic_changes(mut self, allow: bool) -> Self {
        self.allow_not_valid_synthetic_changes = allow;
        self
    }

    /// Track per-field origins under the given marker key.
    pub fn origins_flag(mut self, key: impl Into<String>) -> Self {
        self.origins_flag = Some(key.into());
        self
    }

    /// Materialize keyword defaults under the given marker key.
    pub fn defaults_flag(mut self, key: impl Into<String>) -> Self {
        self.defaults_flag = Some(key.into());
        self
    }

    /// Tag fabricated titles under the given marker key.
    pub fn synthetic_title_flag(mut self, key: impl Into<String>) -> Self {
        self.synthetic_title_flag = Some(key.into());
        self
    }

    /// Tag fabricated `allOf` wrappers under the given marker key.
    pub fn synthetic_all_of_flag(mut self, key: impl Into<String>) -> Self {
        self.synthetic_all_of_flag = Some(key.into());
        self
    }

    /// Record traversed references under the given marker key.
    pub fn inline_refs_flag(mut self, key: impl Into<String>) -> Self {
        self.inline_refs_flag = Some(key.into());
        self
    }

    /// Emit per-node hashes under the given marker key.
    pub fn hash_flag(mut self, key: impl Into<String>) -> Self {
        self.hash_flag = Some(key.into());
        self
    }

    /// Give materialized defaults their own origin chains.
    pub fn create_origins_for_defaults(mut self, create: bool) -> Self {
        self.create_origins_for_defaults = create;
        self
    }

    /// Set the recursion depth cap.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Install the reference-error callback.
    pub fn on_ref_resolve_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &str, &str) + 'static,
    {
        self.on_ref_resolve_error = Some(Box::new(handler));
        self
    }

    /// Install the merge-conflict callback.
    pub fn on_merge_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + 'static,
    {
        self.on_merge_error = Some(Box::new(handler));
        self
    }

    /// Every configured marker key, in a fixed order.
    ///
    /// This is the key set `denormalize` strips.
    pub fn marker_keys(&self) -> Vec<&str> {
        [
            self.origins_flag.as_deref(),
            self.defaults_flag.as_deref(),
            self.synthetic_title_flag.as_deref(),
            self.synthetic_all_of_flag.as_deref(),
            self.inline_refs_flag.as_deref(),
            self.hash_flag.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub(crate) fn report_ref_error(&self, message: &str, path: &str, reference: &str) {
        if let Some(handler) = &self.on_ref_resolve_error {
            handler(message, path, reference);
        }
    }

    pub(crate) fn report_merge_error(&self, message: &str) {
        if let Some(handler) = &self.on_merge_error {
            handler(message);
        }
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NormalizeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizeOptions")
            .field("resolve_ref", &self.resolve_ref)
            .field("merge_all_of", &self.merge_all_of)
            .field("lift_combiners", &self.lift_combiners)
            .field("validate", &self.validate)
            .field(
                "allow_not_valid_synthetic_changes",
                &self.allow_not_valid_synthetic_changes,
            )
            .field("origins_flag", &self.origins_flag)
            .field("defaults_flag", &self.defaults_flag)
            .field("synthetic_title_flag", &self.synthetic_title_flag)
            .field("synthetic_all_of_flag", &self.synthetic_all_of_flag)
            .field("inline_refs_flag", &self.inline_refs_flag)
            .field("hash_flag", &self.hash_flag)
            .field("create_origins_for_defaults", &self.create_origins_for_defaults)
            .field("max_depth", &self.max_depth)
            .field("on_ref_resolve_error", &self.on_ref_resolve_error.is_some())
            .field("on_merge_error", &self.on_merge_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinator_keys_round_trip() {
        for c in [Combinator::AllOf, Combinator::OneOf, Combinator::AnyOf] {
            assert_eq!(Combinator::parse(c.key()), Some(c));
        }
        assert_eq!(Combinator::parse("not"), None);
        assert_eq!(Combinator::parse("allof"), None);
    }

    #[test]
    fn combinator_union_split() {
        assert!(!Combinator::AllOf.is_union());
        assert!(Combinator::OneOf.is_union());
        assert!(Combinator::AnyOf.is_union());
    }

    #[test]
    fn options_defaults() {
        let opts = NormalizeOptions::new();
        assert!(opts.resolve_ref);
        assert!(opts.merge_all_of);
        assert!(!opts.lift_combiners);
        assert!(!opts.validate);
        assert!(opts.origins_flag.is_none());
        assert_eq!(opts.max_depth, DEFAULT_MAX_DEPTH);
        assert!(opts.marker_keys().is_empty());
    }

    #[test]
    fn options_builder_chains() {
        let opts = NormalizeOptions::new()
            .merge_all_of(false)
            .lift_combiners(true)
            .origins_flag("x-origins")
            .hash_flag("x-hash");
        assert!(!opts.merge_all_of);
        assert!(opts.lift_combiners);
        assert_eq!(opts.marker_keys(), vec!["x-origins", "x-hash"]);
    }

    #[test]
    fn json_type_names() {
        use serde_json::json;
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(3)), "number");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({"a": 1})), "object");
    }
}
