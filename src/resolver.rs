//! Reference resolution.
//!
//! Resolves pointer-style references against the output-so-far, falling back
//! to an optional external source document. A pure-reference node (its only
//! key is the reference keyword) is replaced by the fully processed target,
//! so every position naming the same target shares one node instance. A
//! reference with sibling keys is rewrapped in place into a synthetic
//! `allOf` of [reference, siblings] for the merge engine to collapse.
//!
//! Resolution failures never abort the pass: the node keeps its `$ref` shape
//! as a placeholder and the failure reports through `on_ref_resolve_error`.
//! Hard walk errors raised while processing a target (the depth cap) do
//! propagate.

use crate::error::NormalizeError;
use crate::graph::{pointer_segments, Graph, Node, NodeId, Segment};
use crate::rules::{KeyRule, Role, RuleSet};
use crate::walker::{Flow, Hook, Visit, Walker};

/// Resolver link of the main hook chain.
pub(crate) const HOOK: Hook = Hook { enter };

/// A decomposed reference: optional external file part plus in-document
/// pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reference {
    pub file: Option<String>,
    pub pointer: String,
}

/// Split a reference string at the fragment marker.
///
/// `#/a/b` and `/a/b` are in-document pointers; `other.json#/a/b` and
/// `other.json` carry an external file part. Returns `None` for an empty
/// reference.
pub(crate) fn parse_reference(raw: &str) -> Option<Reference> {
    if raw.is_empty() {
        return None;
    }
    match raw.find('#') {
        Some(pos) => {
            let file = &raw[..pos];
            Some(Reference {
                file: (!file.is_empty()).then(|| file.to_string()),
                pointer: raw[pos + 1..].to_string(),
            })
        }
        None if raw.starts_with('/') => Some(Reference {
            file: None,
            pointer: raw.to_string(),
        }),
        None => Some(Reference {
            file: Some(raw.to_string()),
            pointer: String::new(),
        }),
    }
}

/// True when `id` is an object whose only key is an (unresolved) string
/// reference.
pub(crate) fn is_pure_ref(graph: &Graph, rules: &dyn RuleSet, id: NodeId) -> bool {
    let Some(map) = graph.object(id) else {
        return false;
    };
    if map.len() != 1 {
        return false;
    }
    let (key, value) = match map.iter().next() {
        Some((k, v)) => (k, *v),
        None => return false,
    };
    rules.classify(key) == KeyRule::Reference && graph.string(value).is_some()
}

fn enter(w: &mut Walker<'_>, id: NodeId, role: Role) -> Result<Visit, NormalizeError> {
    if role != Role::Schema || !w.opts.resolve_ref {
        return Ok(Visit::descend());
    }
    let Some(map) = w.graph.object(id) else {
        return Ok(Visit::descend());
    };

    let mut ref_entry = None;
    for (key, value) in map {
        if w.rules.classify(key) == KeyRule::Reference {
            ref_entry = Some((key.clone(), *value));
            break;
        }
    }
    let Some((ref_key, ref_value)) = ref_entry else {
        return Ok(Visit::descend());
    };

    let Some(raw) = w.graph.string(ref_value).map(str::to_string) else {
        let actual = w.graph.node(ref_value).type_name();
        w.opts.report_ref_error(
            &format!("reference must be a string, got {}", actual),
            &w.pointer(),
            "",
        );
        return Ok(Visit::descend());
    };

    let sibling_count = w
        .graph
        .object(id)
        .map(|m| m.len().saturating_sub(1))
        .unwrap_or(0);
    if sibling_count == 0 {
        // Pure reference: the node's result is the target itself.
        return match resolve_reference(w, &raw)? {
            Some(target) => Ok(Visit {
                flow: Flow::Replace(target),
                after: None,
            }),
            // Broken reference: the placeholder stays exactly as written.
            None => Ok(Visit::skip()),
        };
    }

    rewrap_with_siblings(w, id, &ref_key, ref_value);
    Ok(Visit::descend())
}

/// Rewrite `{$ref: r, ...siblings}` in place into
/// `{allOf: [{$ref: r}, {...siblings}]}`.
///
/// The wrapper is recorded as a synthetic jump so later pointer navigation
/// can see through it when merging is disabled, and tagged synthetic-allOf
/// for export.
fn rewrap_with_siblings(w: &mut Walker<'_>, id: NodeId, ref_key: &str, ref_value: NodeId) {
    let entries: Vec<(String, NodeId)> = w
        .graph
        .object(id)
        .map(|m| {
            m.iter()
                .filter(|(k, _)| k.as_str() != ref_key)
                .map(|(k, v)| (k.clone(), *v))
                .collect()
        })
        .unwrap_or_default();

    let mut sibling_map = indexmap::IndexMap::new();
    for (key, value) in entries {
        sibling_map.insert(key, value);
    }
    let siblings = w.graph.insert(Node::Object(sibling_map));

    let mut ref_map = indexmap::IndexMap::new();
    ref_map.insert(ref_key.to_string(), ref_value);
    let reference = w.graph.insert(Node::Object(ref_map));

    let branches = w.graph.insert(Node::Array(vec![reference, siblings]));
    if let Some(map) = w.graph.object_mut(id) {
        map.clear();
        map.insert("allOf".to_string(), branches);
    }

    // Both branches stand in for the original source location.
    if let Some(origin) = w.cx.defining.get(&id).copied() {
        w.cx.defining.insert(siblings, origin);
        w.cx.defining.insert(reference, origin);
    }
    w.cx.jumps.insert(id);
    w.cx.synthetic_all_of.insert(id);
}

/// Resolve a reference string from the node at the walker's current path.
///
/// Returns the fully processed target, or `Ok(None)` after reporting a soft
/// failure; hard errors from processing the target propagate. The resolving
/// set holds the raw reference for the duration of the attempt; re-entering
/// the same reference on the call stack is a terminal-less cycle and fails,
/// while cycles that close through concrete nodes resolve to shared
/// identity upstream and never re-enter here.
fn resolve_reference(w: &mut Walker<'_>, raw: &str) -> Result<Option<NodeId>, NormalizeError> {
    let at = w.pointer();
    let Some(reference) = parse_reference(raw) else {
        w.opts.report_ref_error("empty reference", &at, raw);
        return Ok(None);
    };
    if let Some(file) = &reference.file {
        w.opts.report_ref_error(
            &format!("cannot resolve external document \"{}\"", file),
            &at,
            raw,
        );
        return Ok(None);
    }
    let Some(segments) = pointer_segments(&reference.pointer) else {
        w.opts.report_ref_error(
            &format!("malformed pointer \"{}\"", reference.pointer),
            &at,
            raw,
        );
        return Ok(None);
    };

    if !w.cx.resolving.insert(raw.to_string()) {
        w.opts.report_ref_error(
            &format!("circular reference \"{}\" has no concrete terminal", raw),
            &at,
            raw,
        );
        return Ok(None);
    }
    let result = navigate(w, &segments);
    w.cx.resolving.remove(raw);

    match result? {
        Some(target) => {
            attach_resolution_metadata(w, target, raw, &segments);
            Ok(Some(target))
        }
        None => {
            w.opts.report_ref_error(
                &format!("cannot resolve reference \"{}\"", raw),
                &at,
                raw,
            );
            Ok(None)
        }
    }
}

/// Walk pointer segments from the output root, falling back to the external
/// source document when the pointer misses.
fn navigate(w: &mut Walker<'_>, segments: &[String]) -> Result<Option<NodeId>, NormalizeError> {
    let roots: Vec<NodeId> = std::iter::once(w.cx.doc_root)
        .chain(w.cx.source_root)
        .collect();
    for root in roots {
        if let Some(target) = navigate_from(w, root, segments)? {
            return Ok(Some(target));
        }
    }
    Ok(None)
}

fn navigate_from(
    w: &mut Walker<'_>,
    root: NodeId,
    segments: &[String],
) -> Result<Option<NodeId>, NormalizeError> {
    let mut current = root;
    let mut walked: Vec<Segment> = Vec::new();
    for segment in segments {
        let Some(resolved) = ensure_resolved(w, current, &walked)? else {
            return Ok(None);
        };
        let is_index = matches!(w.graph.node(resolved), Node::Array(_));
        let Some(child) = step(w, resolved, segment)? else {
            return Ok(None);
        };
        current = child;
        walked.push(match segment.parse::<usize>() {
            Ok(index) if is_index => Segment::Index(index),
            _ => Segment::Key(segment.clone()),
        });
    }
    let Some(target) = ensure_resolved(w, current, &walked)? else {
        return Ok(None);
    };
    // Process the target in full so merge and origin rules have applied
    // before it replaces the referencing node.
    let processed = w.process_at(target, Role::Schema, walked)?;
    if is_pure_ref(w.graph, w.rules, processed) {
        return Ok(None);
    }
    Ok(Some(processed))
}

/// If `id` still carries an unresolved reference (pure or with siblings),
/// push it through the hook chain first so navigation continues inside the
/// resolved shape.
fn ensure_resolved(
    w: &mut Walker<'_>,
    id: NodeId,
    at: &[Segment],
) -> Result<Option<NodeId>, NormalizeError> {
    if !has_string_ref(w.graph, w.rules, id) {
        return Ok(Some(id));
    }
    let processed = w.process_at(id, Role::Schema, at.to_vec())?;
    if is_pure_ref(w.graph, w.rules, processed) {
        // Still a bare reference: broken target, navigation cannot continue.
        return Ok(None);
    }
    Ok(Some(processed))
}

fn has_string_ref(graph: &Graph, rules: &dyn RuleSet, id: NodeId) -> bool {
    graph.object(id).is_some_and(|map| {
        map.iter().any(|(key, value)| {
            rules.classify(key) == KeyRule::Reference && graph.string(*value).is_some()
        })
    })
}

/// One navigation step, seeing through synthetic `allOf` wrappers.
fn step(
    w: &mut Walker<'_>,
    current: NodeId,
    segment: &str,
) -> Result<Option<NodeId>, NormalizeError> {
    if let Some(child) = w.graph.step(current, segment) {
        return Ok(Some(child));
    }
    if !w.cx.jumps.contains(&current) {
        return Ok(None);
    }
    // Wrapper layout is [reference-branch, siblings-branch]; prefer the
    // siblings, then look inside the (resolved) reference payload.
    let Some(branches) = w.graph.key(current, "allOf") else {
        return Ok(None);
    };
    let Some(items) = w.graph.array(branches).map(|items| items.to_vec()) else {
        return Ok(None);
    };
    if let Some(&siblings) = items.get(1) {
        if let Some(child) = w.graph.step(siblings, segment) {
            return Ok(Some(child));
        }
    }
    let Some(&reference) = items.first() else {
        return Ok(None);
    };
    let Some(payload) = ensure_resolved(w, reference, &[])? else {
        return Ok(None);
    };
    Ok(w.graph.step(payload, segment))
}

/// Record inline-ref history and fabricate a title on the resolved target
/// when the corresponding flags ask for them.
fn attach_resolution_metadata(
    w: &mut Walker<'_>,
    target: NodeId,
    raw: &str,
    segments: &[String],
) {
    if w.opts.inline_refs_flag.is_some() {
        w.cx.record_inline_ref(target, raw);
    }
    if w.opts.synthetic_title_flag.is_some() {
        fabricate_title(w, target, segments);
    }
}

fn fabricate_title(w: &mut Walker<'_>, target: NodeId, segments: &[String]) {
    let Some(last) = segments.last() else {
        return;
    };
    let Some(map) = w.graph.object(target) else {
        return;
    };
    if map.contains_key("title") {
        return;
    }
    let title = w.graph.insert(Node::String(last.clone()));
    if let Some(map) = w.graph.object_mut(target) {
        map.insert("title".to_string(), title);
    }
    w.cx.synthetic_titles.insert(target);
    if w.opts.origins_flag.is_some() {
        let parent = w.cx.defining.get(&target).copied();
        let chain = w.cx.origins.chain(parent, Segment::Key("title".to_string()));
        w.cx.record_origin(target, "title", chain);
    }
}
