//! Combinator lifting.
//!
//! Rewrites a node whose keys mix sibling fields with `oneOf`/`anyOf` (and,
//! when merging was disabled, `allOf`) into one outer union whose branches
//! are complete standalone alternatives: each branch is the member merged
//! with every sibling field and every `allOf` member. When both union kinds
//! occur at one level, the key occurring later among the node's own keys
//! becomes the outer one and the other nests inside each branch, where the
//! next round of this pass lifts it in turn; the nesting is what makes the
//! cross-product materialize. Idempotent on an already-lifted tree.

use indexmap::IndexMap;

use crate::error::NormalizeError;
use crate::graph::{Node, NodeId};
use crate::merge::merge_nodes;
use crate::rules::{KeyRule, Role};
use crate::walker::{Hook, Visit, Walker};

/// Sole link of the lifting pass.
pub(crate) const HOOK: Hook = Hook { enter };

struct Combinators {
    /// (key, position among the node's keys, members) per union present.
    unions: Vec<(String, usize, Vec<NodeId>)>,
    all_of: Vec<NodeId>,
    all_of_key: Option<String>,
}

fn collect(w: &Walker<'_>, id: NodeId) -> Option<Combinators> {
    let map = w.graph.object(id)?;
    let mut found = Combinators {
        unions: Vec::new(),
        all_of: Vec::new(),
        all_of_key: None,
    };
    for (position, (key, value)) in map.iter().enumerate() {
        let KeyRule::Combinator(kind) = w.rules.classify(key) else {
            continue;
        };
        let Some(members) = w.graph.array(*value) else {
            continue;
        };
        if kind.is_union() {
            found.unions.push((key.clone(), position, members.to_vec()));
        } else {
            found.all_of = members.to_vec();
            found.all_of_key = Some(key.clone());
        }
    }
    if found.unions.is_empty() {
        None
    } else {
        Some(found)
    }
}

fn enter(w: &mut Walker<'_>, id: NodeId, role: Role) -> Result<Visit, NormalizeError> {
    if role != Role::Schema || !w.opts.lift_combiners {
        return Ok(Visit::descend());
    }
    let Some(found) = collect(w, id) else {
        return Ok(Visit::descend());
    };
    let key_count = w.graph.object(id).map(|m| m.len()).unwrap_or(0);
    if found.unions.len() == 1 && found.all_of_key.is_none() && key_count == 1 {
        // Already a bare union; keep the node and its members untouched.
        return Ok(Visit::descend());
    }

    // The later-occurring union key becomes the outer combinator; any other
    // union re-nests inside each branch and lifts on the descent.
    let outer_index = found
        .unions
        .iter()
        .enumerate()
        .max_by_key(|(_, (_, position, _))| *position)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (outer_key, _, outer_members) = found.unions[outer_index].clone();

    let combinator_keys: Vec<&str> = found
        .unions
        .iter()
        .map(|(k, _, _)| k.as_str())
        .chain(found.all_of_key.as_deref())
        .collect();
    let siblings: Vec<(String, NodeId)> = w
        .graph
        .object(id)
        .map(|m| {
            m.iter()
                .filter(|(k, _)| !combinator_keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), *v))
                .collect()
        })
        .unwrap_or_default();
    let sibling_node = if siblings.is_empty() {
        None
    } else {
        let mut map = IndexMap::new();
        for (key, value) in siblings {
            map.insert(key, value);
        }
        let node = w.graph.insert(Node::Object(map));
        if let Some(origin) = w.cx.defining.get(&id).copied() {
            w.cx.defining.insert(node, origin);
        }
        Some(node)
    };

    let mut branches = Vec::with_capacity(outer_members.len());
    for &member in &outer_members {
        let mut contributors = found.all_of.clone();
        contributors.push(member);
        for (i, (inner_key, _, inner_members)) in found.unions.iter().enumerate() {
            if i == outer_index {
                continue;
            }
            match inner_members.len() {
                0 => {}
                // A one-branch union is no union; its member merges straight in.
                1 => contributors.push(inner_members[0]),
                _ => {
                    let list = w.graph.insert(Node::Array(inner_members.clone()));
                    let mut map = IndexMap::new();
                    map.insert(inner_key.clone(), list);
                    contributors.push(w.graph.insert(Node::Object(map)));
                }
            }
        }
        contributors.extend(sibling_node);
        branches.push(merge_nodes(w, &contributors)?);
    }

    let list = w.graph.insert(Node::Array(branches));
    if let Some(map) = w.graph.object_mut(id) {
        map.clear();
        map.insert(outer_key, list);
    }
    Ok(Visit::descend())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::normalize::Engine;
    use crate::rules::JsonSchemaRules;
    use crate::types::NormalizeOptions;
    use serde_json::json;

    fn lift_doc(value: serde_json::Value) -> serde_json::Value {
        let mut graph = Graph::new();
        let root = graph.import(&value);
        lift_in(&mut graph, root);
        graph.export(root)
    }

    fn lift_in(graph: &mut Graph, root: NodeId) {
        let rules = JsonSchemaRules;
        let opts = NormalizeOptions::new().lift_combiners(true);
        let mut cx = Engine::new(root, None);
        let hooks = [HOOK];
        let mut walker = Walker::new(graph, &rules, &opts, &mut cx, &hooks);
        walker.process(root, Role::Schema).unwrap();
    }

    #[test]
    fn siblings_merge_into_every_branch() {
        let out = lift_doc(json!({
            "minLength": 2,
            "oneOf": [ { "type": "string" }, { "type": "number" } ]
        }));
        assert_eq!(
            out,
            json!({ "oneOf": [
                { "type": "string", "minLength": 2 },
                { "type": "number", "minLength": 2 }
            ] })
        );
    }

    #[test]
    fn later_key_becomes_outer() {
        let out = lift_doc(json!({
            "anyOf": [ { "minimum": 1 }, { "minimum": 2 } ],
            "oneOf": [ { "type": "integer" }, { "type": "number" } ]
        }));
        assert_eq!(
            out,
            json!({ "oneOf": [
                { "anyOf": [
                    { "minimum": 1, "type": "integer" },
                    { "minimum": 2, "type": "integer" }
                ] },
                { "anyOf": [
                    { "minimum": 1, "type": "number" },
                    { "minimum": 2, "type": "number" }
                ] }
            ] })
        );
    }

    #[test]
    fn outer_order_flips_with_key_order() {
        let out = lift_doc(json!({
            "oneOf": [ { "type": "integer" } ],
            "anyOf": [ { "minimum": 1 }, { "minimum": 2 } ]
        }));
        assert_eq!(
            out,
            json!({ "anyOf": [
                { "minimum": 1, "type": "integer" },
                { "minimum": 2, "type": "integer" }
            ] })
        );
    }

    #[test]
    fn unmerged_all_of_joins_every_branch() {
        let out = lift_doc(json!({
            "allOf": [ { "minLength": 1 } ],
            "oneOf": [ { "type": "string" }, { "pattern": "^x" } ]
        }));
        assert_eq!(
            out,
            json!({ "oneOf": [
                { "minLength": 1, "type": "string" },
                { "minLength": 1, "pattern": "^x" }
            ] })
        );
    }

    #[test]
    fn lifting_is_idempotent() {
        let mut graph = Graph::new();
        let root = graph.import(&json!({
            "minLength": 2,
            "oneOf": [ { "type": "string" }, { "type": "number" } ]
        }));
        lift_in(&mut graph, root);
        let first = graph.export(root);
        lift_in(&mut graph, root);
        assert_eq!(graph.export(root), first);
    }

    #[test]
    fn plain_union_untouched() {
        let doc = json!({ "oneOf": [ { "type": "string" }, { "type": "number" } ] });
        let mut graph = Graph::new();
        let root = graph.import(&doc);
        let members_before = graph
            .key(root, "oneOf")
            .and_then(|l| graph.array(l).map(|m| m.to_vec()))
            .unwrap();
        lift_in(&mut graph, root);
        let members_after = graph
            .key(root, "oneOf")
            .and_then(|l| graph.array(l).map(|m| m.to_vec()))
            .unwrap();
        assert_eq!(members_before, members_after);
        assert_eq!(graph.export(root), doc);
    }

    #[test]
    fn lift_disabled_leaves_node_alone() {
        let doc = json!({
            "minLength": 2,
            "oneOf": [ { "type": "string" } ]
        });
        let mut graph = Graph::new();
        let root = graph.import(&doc);
        let rules = JsonSchemaRules;
        let opts = NormalizeOptions::new();
        let mut cx = Engine::new(root, None);
        let hooks = [HOOK];
        let mut walker = Walker::new(&mut graph, &rules, &opts, &mut cx, &hooks);
        walker.process(root, Role::Schema).unwrap();
        assert_eq!(graph.export(root), doc);
    }

    #[test]
    fn single_member_inner_union_merges_away() {
        let out = lift_doc(json!({
            "anyOf": [ { "minimum": 5 } ],
            "oneOf": [ { "type": "integer" }, { "type": "number" } ]
        }));
        assert_eq!(
            out,
            json!({ "oneOf": [
                { "type": "integer", "minimum": 5 },
                { "type": "number", "minimum": 5 }
            ] })
        );
    }

    #[test]
    fn cycle_through_branch_preserved() {
        let mut graph = Graph::new();
        let root = graph.import(&json!({
            "title": "Node",
            "oneOf": [ { "properties": { "next": null } }, { "type": "null" } ]
        }));
        let member = graph.resolve_pointer(root, "/oneOf/0").unwrap();
        let props = graph.key(member, "properties").unwrap();
        if let Node::Object(map) = graph.node_mut(props) {
            map.insert("next".to_string(), root);
        }
        lift_in(&mut graph, root);

        let branch = graph.resolve_pointer(root, "/oneOf/0").unwrap();
        let branch_props = graph.key(branch, "properties").unwrap();
        assert_eq!(graph.key(branch_props, "next"), Some(root));
        assert_eq!(
            graph.export(root),
            json!({ "oneOf": [
                { "properties": { "next": { "$ref": "#" } }, "title": "Node" },
                { "type": "null", "title": "Node" }
            ] })
        );
    }
}
