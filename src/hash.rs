//! Structural hashing.
//!
//! Digests cover semantically meaningful fields only: annotation keys and
//! keys injected by default materialization stay out of schema nodes, so two
//! nodes that constrain instances identically hash identically. Object keys
//! and the members of order-irrelevant collections (`enum`, `required`,
//! combinator branch lists) are folded in sorted order; tuple `items` and
//! other arrays stay order-sensitive. None of this applies inside literal
//! subtrees (`const`, `enum`, `default` values): there every key contributes
//! and array order counts, because the value itself is the constraint.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::graph::{Graph, Node, NodeId};
use crate::rules::{child_role, element_role, Role, RuleSet};

/// Stands in for a child still being digested up-stack. Not valid hex, so it
/// cannot collide with a finished digest.
const CYCLE_TOKEN: &str = "~cycle";

enum Slot {
    InProgress,
    Done(String),
}

/// One hashing run over a graph.
///
/// Digests are memoized by node identity and role for the lifetime of the
/// run; the memo doubles as the cycle guard. A shared node reached both as a
/// schema and as literal data digests separately per position.
pub(crate) struct NodeHasher<'a> {
    graph: &'a Graph,
    rules: &'a dyn RuleSet,
    injected: &'a HashMap<NodeId, Vec<String>>,
    memo: HashMap<(NodeId, Role), Slot>,
}

impl<'a> NodeHasher<'a> {
    pub(crate) fn new(
        graph: &'a Graph,
        rules: &'a dyn RuleSet,
        injected: &'a HashMap<NodeId, Vec<String>>,
    ) -> Self {
        NodeHasher {
            graph,
            rules,
            injected,
            memo: HashMap::new(),
        }
    }

    /// Digest every object node reachable from `root`.
    pub(crate) fn run(mut self, root: NodeId) -> HashMap<NodeId, String> {
        let mut out = HashMap::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(root, Role::Schema)];
        while let Some((id, role)) = stack.pop() {
            if !seen.insert((id, role)) {
                continue;
            }
            match self.graph.node(id) {
                Node::Object(map) => {
                    for (key, value) in map {
                        stack.push((*value, child_role(self.rules, role, key)));
                    }
                    let digest = self.digest(id, role);
                    // A node shared across roles keeps its first digest.
                    out.entry(id).or_insert(digest);
                }
                Node::Array(items) => {
                    let element = element_role(role);
                    stack.extend(items.iter().map(|&item| (item, element)));
                }
                _ => {}
            }
        }
        out
    }

    pub(crate) fn digest(&mut self, id: NodeId, role: Role) -> String {
        match self.memo.get(&(id, role)) {
            Some(Slot::Done(digest)) => return digest.clone(),
            Some(Slot::InProgress) => return CYCLE_TOKEN.to_string(),
            None => {}
        }
        self.memo.insert((id, role), Slot::InProgress);

        let text = match self.graph.node(id) {
            Node::Null => "z".to_string(),
            Node::Bool(b) => format!("b:{}", b),
            Node::Number(n) => format!("n:{}", n),
            Node::String(s) => format!("s:{}", s),
            Node::Array(items) => {
                let items = items.clone();
                let element = element_role(role);
                let mut buffer = String::from("a:");
                for item in items {
                    buffer.push_str(&self.digest(item, element));
                    buffer.push(',');
                }
                buffer
            }
            Node::Object(map) => {
                let mut entries: Vec<(String, NodeId)> =
                    map.iter().map(|(k, v)| (k.clone(), *v)).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                let mut buffer = String::from("o:");
                for (key, value) in entries {
                    if role == Role::Schema {
                        if self.rules.annotation_keys().contains(&key.as_str()) {
                            continue;
                        }
                        if self
                            .injected
                            .get(&id)
                            .is_some_and(|keys| keys.contains(&key))
                        {
                            continue;
                        }
                    }
                    let child = child_role(self.rules, role, &key);
                    let value_digest = match self.graph.node(value) {
                        Node::Array(items)
                            if role == Role::Schema && self.rules.hash_unordered(&key) =>
                        {
                            let items = items.clone();
                            self.sorted_digest(&items, element_role(child))
                        }
                        _ => self.digest(value, child),
                    };
                    buffer.push_str(&sha_hex(&format!("k:{}", key)));
                    buffer.push('=');
                    buffer.push_str(&value_digest);
                    buffer.push(';');
                }
                buffer
            }
        };

        let digest = sha_hex(&text);
        self.memo.insert((id, role), Slot::Done(digest.clone()));
        digest
    }

    fn sorted_digest(&mut self, items: &[NodeId], role: Role) -> String {
        let mut parts: Vec<String> = items
            .iter()
            .map(|&item| self.digest(item, role))
            .collect();
        parts.sort();
        let mut buffer = String::from("u:");
        for part in parts {
            buffer.push_str(&part);
            buffer.push(',');
        }
        sha_hex(&buffer)
    }
}

fn sha_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::JsonSchemaRules;
    use serde_json::json;

    fn digest_of(value: serde_json::Value) -> String {
        let mut graph = Graph::new();
        let root = graph.import(&value);
        let injected = HashMap::new();
        let mut hasher = NodeHasher::new(&graph, &JsonSchemaRules, &injected);
        hasher.digest(root, Role::Schema)
    }

    #[test]
    fn enum_and_required_order_irrelevant() {
        assert_eq!(
            digest_of(json!({ "enum": [1, 2, 3] })),
            digest_of(json!({ "enum": [3, 1, 2] }))
        );
        assert_eq!(
            digest_of(json!({ "required": ["a", "b"] })),
            digest_of(json!({ "required": ["b", "a"] }))
        );
    }

    #[test]
    fn combinator_branch_order_irrelevant() {
        assert_eq!(
            digest_of(json!({ "oneOf": [ { "type": "string" }, { "type": "number" } ] })),
            digest_of(json!({ "oneOf": [ { "type": "number" }, { "type": "string" } ] }))
        );
    }

    #[test]
    fn annotations_do_not_contribute() {
        let plain = digest_of(json!({ "type": "string" }));
        assert_eq!(
            plain,
            digest_of(json!({ "type": "string", "title": "Name" }))
        );
        assert_eq!(
            plain,
            digest_of(json!({
                "type": "string",
                "description": "a label",
                "examples": ["x"]
            }))
        );
    }

    #[test]
    fn semantic_fields_contribute() {
        assert_ne!(
            digest_of(json!({ "type": "string" })),
            digest_of(json!({ "type": "number" }))
        );
        assert_ne!(
            digest_of(json!({ "minLength": 1 })),
            digest_of(json!({ "minLength": 2 }))
        );
    }

    #[test]
    fn tuple_items_order_sensitive() {
        assert_ne!(
            digest_of(json!({ "items": [ { "type": "string" }, { "type": "number" } ] })),
            digest_of(json!({ "items": [ { "type": "number" }, { "type": "string" } ] }))
        );
    }

    #[test]
    fn object_key_order_irrelevant() {
        assert_eq!(
            digest_of(json!({ "type": "string", "minLength": 2 })),
            digest_of(json!({ "minLength": 2, "type": "string" }))
        );
    }

    #[test]
    fn scalar_kinds_distinct() {
        assert_ne!(
            digest_of(json!({ "const": "1" })),
            digest_of(json!({ "const": 1 }))
        );
    }

    #[test]
    fn const_values_hash_verbatim() {
        // Inside a literal, "title" is data, not an annotation.
        assert_ne!(
            digest_of(json!({ "const": { "title": "X" } })),
            digest_of(json!({ "const": { "title": "Y" } }))
        );
        // Key order of a literal object still does not matter.
        assert_eq!(
            digest_of(json!({ "const": { "a": 1, "b": 2 } })),
            digest_of(json!({ "const": { "b": 2, "a": 1 } }))
        );
    }

    #[test]
    fn arrays_inside_literals_stay_ordered() {
        assert_ne!(
            digest_of(json!({ "enum": [ { "required": ["a", "b"] } ] })),
            digest_of(json!({ "enum": [ { "required": ["b", "a"] } ] }))
        );
        assert_ne!(
            digest_of(json!({ "default": { "enum": [1, 2] } })),
            digest_of(json!({ "default": { "enum": [2, 1] } }))
        );
    }

    #[test]
    fn map_keys_named_like_annotations_contribute() {
        assert_ne!(
            digest_of(json!({ "properties": { "title": { "type": "string" } } })),
            digest_of(json!({ "properties": { "description": { "type": "string" } } }))
        );
    }

    #[test]
    fn cycles_terminate_and_match() {
        let build = || {
            let mut graph = Graph::new();
            let root = graph.import(&json!({ "properties": { "next": null } }));
            let props = graph.key(root, "properties").unwrap();
            if let Node::Object(map) = graph.node_mut(props) {
                map.insert("next".to_string(), root);
            }
            (graph, root)
        };
        let (g1, r1) = build();
        let (g2, r2) = build();
        let injected = HashMap::new();
        let d1 = NodeHasher::new(&g1, &JsonSchemaRules, &injected).digest(r1, Role::Schema);
        let d2 = NodeHasher::new(&g2, &JsonSchemaRules, &injected).digest(r2, Role::Schema);
        assert_eq!(d1, d2);
    }

    #[test]
    fn injected_keys_stay_out() {
        let mut graph = Graph::new();
        let root = graph.import(&json!({
            "properties": { "a": { "type": "string" } },
            "required": []
        }));
        let mut injected = HashMap::new();
        injected.insert(root, vec!["required".to_string()]);
        let with_marker =
            NodeHasher::new(&graph, &JsonSchemaRules, &injected).digest(root, Role::Schema);
        assert_eq!(
            with_marker,
            digest_of(json!({ "properties": { "a": { "type": "string" } } }))
        );
    }

    #[test]
    fn run_covers_every_object() {
        let mut graph = Graph::new();
        let root = graph.import(&json!({
            "properties": { "a": { "type": "string" } },
            "items": [ { "type": "number" } ]
        }));
        let injected = HashMap::new();
        let hashes = NodeHasher::new(&graph, &JsonSchemaRules, &injected).run(root);
        assert_eq!(hashes.len(), 4);
        assert!(hashes.contains_key(&root));
    }
}
