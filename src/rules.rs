//! Keyword classification rules.
//!
//! The engine is document-type agnostic: everything it needs to know about a
//! schema dialect is which child keys hold references, combinators, nested
//! schemas, or plain data. [`JsonSchemaRules`] covers JSON Schema and the
//! schema objects embedded in OpenAPI documents; other dialects implement
//! [`RuleSet`] themselves.

use crate::types::Combinator;

/// Classification of one child key of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    /// Pointer-style reference (`$ref`).
    Reference,
    /// Combinator list of the given kind.
    Combinator(Combinator),
    /// The value is itself a schema (or, for array values, a list of schemas).
    Schema,
    /// The value is a map whose values are schemas.
    SchemaMap,
    /// Plain data; never resolved, merged, or descended as schema.
    Data,
}

/// Position of a node during traversal.
///
/// A `SchemaMap` node (the value under `properties`, `$defs`, ...) holds
/// field names, not keywords; its children are schemas. Data subtrees
/// (`const`, `enum`, `examples`, `default` values) are walked structurally
/// but no schema semantics apply to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Schema,
    SchemaMap,
    Data,
}

/// Role of the child under `key` of an object node positioned as `parent`.
pub(crate) fn child_role(rules: &dyn RuleSet, parent: Role, key: &str) -> Role {
    match parent {
        Role::Data => Role::Data,
        Role::SchemaMap => Role::Schema,
        Role::Schema => match rules.classify(key) {
            KeyRule::Reference | KeyRule::Data => Role::Data,
            KeyRule::Schema | KeyRule::Combinator(_) => Role::Schema,
            KeyRule::SchemaMap => Role::SchemaMap,
        },
    }
}

/// Role of the elements of an array node positioned as `parent`. Map values
/// are objects; an array reached through one holds schemas.
pub(crate) fn element_role(parent: Role) -> Role {
    match parent {
        Role::SchemaMap => Role::Schema,
        other => other,
    }
}

/// Per-dialect keyword tables.
pub trait RuleSet {
    /// Classify a child key of a schema-positioned object node.
    fn classify(&self, key: &str) -> KeyRule;

    /// Keys carrying annotations only, ignored by the hash calculator.
    fn annotation_keys(&self) -> &[&str] {
        &["title", "description", "examples", "$comment"]
    }

    /// True when the array under `key` hashes order-independently.
    ///
    /// Covers value sets (`enum`, `required`) and combinator branch lists;
    /// order-sensitive arrays (tuple `items`) stay order-dependent.
    fn hash_unordered(&self, key: &str) -> bool {
        matches!(key, "enum" | "required")
            || matches!(self.classify(key), KeyRule::Combinator(_))
    }
}

/// Keyword tables for JSON Schema documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaRules;

impl RuleSet for JsonSchemaRules {
    fn classify(&self, key: &str) -> KeyRule {
        match key {
            "$ref" => KeyRule::Reference,
            "allOf" => KeyRule::Combinator(Combinator::AllOf),
            "oneOf" => KeyRule::Combinator(Combinator::OneOf),
            "anyOf" => KeyRule::Combinator(Combinator::AnyOf),
            "properties" | "patternProperties" | "$defs" | "definitions"
            | "dependentSchemas" | "dependencies" => KeyRule::SchemaMap,
            // Value-carrying and annotation keywords; their subtrees hold
            // document data, never schemas.
            "enum" | "const" | "default" | "examples" | "title" | "description"
            | "$comment" | "required" | "type" => KeyRule::Data,
            // Everything else descends as schema: named keywords (`items`,
            // `not`, ...) and unknown keys alike, so definition containers
            // at arbitrary paths still resolve.
            _ => KeyRule::Schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_core_keywords() {
        let rules = JsonSchemaRules;
        assert_eq!(rules.classify("$ref"), KeyRule::Reference);
        assert_eq!(
            rules.classify("allOf"),
            KeyRule::Combinator(Combinator::AllOf)
        );
        assert_eq!(
            rules.classify("oneOf"),
            KeyRule::Combinator(Combinator::OneOf)
        );
        assert_eq!(rules.classify("properties"), KeyRule::SchemaMap);
        assert_eq!(rules.classify("items"), KeyRule::Schema);
        assert_eq!(rules.classify("not"), KeyRule::Schema);
        assert_eq!(rules.classify("enum"), KeyRule::Data);
        assert_eq!(rules.classify("const"), KeyRule::Data);
        // Unknown keys stay schema-positioned.
        assert_eq!(rules.classify("components"), KeyRule::Schema);
    }

    #[test]
    fn hash_ordering_rules() {
        let rules = JsonSchemaRules;
        assert!(rules.hash_unordered("enum"));
        assert!(rules.hash_unordered("required"));
        assert!(rules.hash_unordered("oneOf"));
        assert!(rules.hash_unordered("allOf"));
        assert!(!rules.hash_unordered("items"));
        assert!(!rules.hash_unordered("prefixItems"));
    }

    #[test]
    fn annotations_are_data() {
        let rules = JsonSchemaRules;
        for key in rules.annotation_keys() {
            assert_eq!(rules.classify(key), KeyRule::Data, "{key}");
        }
    }

    #[test]
    fn roles_flow_through_containers() {
        let rules = JsonSchemaRules;
        assert_eq!(child_role(&rules, Role::Schema, "properties"), Role::SchemaMap);
        assert_eq!(child_role(&rules, Role::SchemaMap, "title"), Role::Schema);
        assert_eq!(child_role(&rules, Role::Schema, "const"), Role::Data);
        assert_eq!(child_role(&rules, Role::Data, "properties"), Role::Data);
        assert_eq!(element_role(Role::SchemaMap), Role::Schema);
        assert_eq!(element_role(Role::Data), Role::Data);
    }
}
