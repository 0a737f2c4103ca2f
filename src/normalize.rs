//! Normalization driver.
//!
//! Imports the caller's document into a private arena, runs the main hook
//! chain (reference resolution, `allOf` merging, origin tracking, keyword
//! default materialization) in one depth-first pass, then the optional
//! lifting and hashing passes, and packages the arena plus every metadata
//! side table as a [`NormalizedDocument`]. Marker keys only materialize in
//! exported `Value` trees; [`denormalize`] strips them back out of any tree.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::graph::{pointer_of, Graph, Node, NodeId, Segment};
use crate::hash::NodeHasher;
use crate::origins::{OriginId, OriginStore};
use crate::rules::{JsonSchemaRules, KeyRule, Role, RuleSet};
use crate::types::{json_type_name, NormalizeOptions};
use crate::walker::{Flow, Hook, Visit, Walker};
use crate::{lift, merge, resolver};

/// Shared state of one normalization call, threaded through every hook.
pub(crate) struct Engine {
    pub(crate) doc_root: NodeId,
    pub(crate) source_root: Option<NodeId>,
    /// Interned provenance chains.
    pub(crate) origins: OriginStore,
    /// Source location per node. Roots have none; fabricated nodes inherit
    /// the location of the node they stand in for, or stay unlisted.
    pub(crate) defining: HashMap<NodeId, OriginId>,
    /// Per node, per field: the chain of every source that contributed.
    pub(crate) origin_fields: HashMap<NodeId, IndexMap<String, Vec<OriginId>>>,
    pub(crate) synthetic_titles: HashSet<NodeId>,
    pub(crate) synthetic_all_of: HashSet<NodeId>,
    pub(crate) inline_refs: HashMap<NodeId, Vec<String>>,
    pub(crate) injected_defaults: HashMap<NodeId, Vec<String>>,
    pub(crate) hashes: HashMap<NodeId, String>,
    /// Fabricated `allOf` wrappers pointer navigation may see through.
    pub(crate) jumps: HashSet<NodeId>,
    /// Raw reference strings currently being expanded on the call stack.
    pub(crate) resolving: HashSet<String>,
    /// Merge results keyed by ordered contributor list.
    pub(crate) merge_memo: HashMap<Vec<NodeId>, NodeId>,
}

impl Engine {
    pub(crate) fn new(doc_root: NodeId, source_root: Option<NodeId>) -> Self {
        Engine {
            doc_root,
            source_root,
            origins: OriginStore::new(),
            defining: HashMap::new(),
            origin_fields: HashMap::new(),
            synthetic_titles: HashSet::new(),
            synthetic_all_of: HashSet::new(),
            inline_refs: HashMap::new(),
            injected_defaults: HashMap::new(),
            hashes: HashMap::new(),
            jumps: HashSet::new(),
            resolving: HashSet::new(),
            merge_memo: HashMap::new(),
        }
    }

    /// Source chain of `id` when known; `Some(None)` is a document root.
    pub(crate) fn location(&self, id: NodeId) -> Option<Option<OriginId>> {
        if id == self.doc_root || Some(id) == self.source_root {
            Some(None)
        } else {
            self.defining.get(&id).copied().map(Some)
        }
    }

    pub(crate) fn record_origin(&mut self, node: NodeId, key: &str, origin: OriginId) {
        let chains = self
            .origin_fields
            .entry(node)
            .or_default()
            .entry(key.to_string())
            .or_default();
        if !chains.contains(&origin) {
            chains.push(origin);
        }
    }

    pub(crate) fn record_inline_ref(&mut self, node: NodeId, raw: &str) {
        let history = self.inline_refs.entry(node).or_default();
        if !history.iter().any(|r| r == raw) {
            history.push(raw.to_string());
        }
    }
}

/// Record a chain for every field the earlier hooks did not claim.
///
/// Runs after resolution and merging in the same visit, so merged fields
/// already carry their contributor chains and keep them; everything else
/// originates at the node's own location.
const ORIGINS_HOOK: Hook = Hook {
    enter: origins_enter,
};

fn origins_enter(w: &mut Walker<'_>, id: NodeId, role: Role) -> Result<Visit, NormalizeError> {
    if w.opts.origins_flag.is_none() || role == Role::Data {
        return Ok(Visit::descend());
    }
    let Some(parent) = w.cx.location(id) else {
        return Ok(Visit::descend());
    };
    let keys: Vec<String> = w
        .graph
        .object(id)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    for key in keys {
        let recorded = w
            .cx
            .origin_fields
            .get(&id)
            .is_some_and(|fields| fields.contains_key(&key));
        if recorded {
            continue;
        }
        let chain = w.cx.origins.chain(parent, Segment::Key(key.clone()));
        w.cx.record_origin(id, &key, chain);
    }
    Ok(Visit::descend())
}

/// Keyword defaults injected when the triggering keyword is present and the
/// defaulted one absent.
const DEFAULT_TABLE: &[(&str, &str)] = &[("properties", "required"), ("items", "uniqueItems")];

const DEFAULTS_HOOK: Hook = Hook {
    enter: defaults_enter,
};

fn defaults_enter(w: &mut Walker<'_>, id: NodeId, role: Role) -> Result<Visit, NormalizeError> {
    if w.opts.defaults_flag.is_none() || role != Role::Schema {
        return Ok(Visit::descend());
    }
    if w.graph.object(id).is_none() {
        return Ok(Visit::descend());
    }
    // Inject after the children settle so merged-in keywords count.
    Ok(Visit {
        flow: Flow::Descend,
        after: Some(inject_defaults),
    })
}

fn inject_defaults(w: &mut Walker<'_>, id: NodeId, _role: Role) -> Result<(), NormalizeError> {
    for &(trigger, keyword) in DEFAULT_TABLE {
        let applies = w
            .graph
            .object(id)
            .is_some_and(|m| m.contains_key(trigger) && !m.contains_key(keyword));
        if !applies {
            continue;
        }
        let value = match keyword {
            "required" => w.graph.insert(Node::Array(Vec::new())),
            _ => w.graph.insert(Node::Bool(false)),
        };
        if let Some(map) = w.graph.object_mut(id) {
            map.insert(keyword.to_string(), value);
        }
        w.cx
            .injected_defaults
            .entry(id)
            .or_default()
            .push(keyword.to_string());
        if w.opts.create_origins_for_defaults && w.opts.origins_flag.is_some() {
            // The injected entry originates at the field that implied it.
            if let Some(parent) = w.cx.location(id) {
                let chain = w.cx.origins.chain(parent, Segment::Key(trigger.to_string()));
                w.cx.record_origin(id, keyword, chain);
            }
        }
    }
    Ok(())
}

/// Intern a location chain for every node under `root`.
fn seed_defining(graph: &Graph, cx: &mut Engine, root: NodeId) {
    let mut seen = HashSet::new();
    seen.insert(root);
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let parent = cx.defining.get(&id).copied();
        let children: Vec<(Segment, NodeId)> = match graph.node(id) {
            Node::Object(map) => map
                .iter()
                .map(|(k, v)| (Segment::Key(k.clone()), *v))
                .collect(),
            Node::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Segment::Index(i), *v))
                .collect(),
            _ => continue,
        };
        for (segment, child) in children {
            if !seen.insert(child) {
                continue;
            }
            let chain = cx.origins.chain(parent, segment);
            cx.defining.insert(child, chain);
            stack.push(child);
        }
    }
}

/// Structural pre-check: combinator keys must hold arrays, references must
/// be strings. Findings report through the option callbacks; nothing aborts.
fn validate_input(
    graph: &Graph,
    rules: &dyn RuleSet,
    opts: &NormalizeOptions,
    id: NodeId,
    path: &mut Vec<Segment>,
) {
    match graph.node(id) {
        Node::Object(map) => {
            for (key, value) in map {
                match rules.classify(key) {
                    KeyRule::Reference => {
                        if graph.string(*value).is_none() {
                            opts.report_ref_error(
                                &format!(
                                    "reference must be a string, got {}",
                                    graph.node(*value).type_name()
                                ),
                                &pointer_of(path),
                                "",
                            );
                        }
                    }
                    KeyRule::Combinator(_) => {
                        if graph.array(*value).is_none() {
                            opts.report_merge_error(&format!(
                                "\"{}\" must hold an array, got {} at \"{}\"",
                                key,
                                graph.node(*value).type_name(),
                                pointer_of(path)
                            ));
                        }
                    }
                    _ => {}
                }
                path.push(Segment::Key(key.clone()));
                validate_input(graph, rules, opts, *value, path);
                path.pop();
            }
        }
        Node::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                validate_input(graph, rules, opts, *item, path);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Normalize `document` under JSON Schema rules.
pub fn normalize(
    document: &Value,
    options: &NormalizeOptions,
) -> Result<NormalizedDocument, NormalizeError> {
    normalize_with_source(document, None, options)
}

/// Normalize `document`, resolving references that miss it against `source`.
pub fn normalize_with_source(
    document: &Value,
    source: Option<&Value>,
    options: &NormalizeOptions,
) -> Result<NormalizedDocument, NormalizeError> {
    normalize_with_rules(document, source, &JsonSchemaRules, options)
}

/// Normalize under a caller-provided rule table.
pub fn normalize_with_rules(
    document: &Value,
    source: Option<&Value>,
    rules: &dyn RuleSet,
    options: &NormalizeOptions,
) -> Result<NormalizedDocument, NormalizeError> {
    if !document.is_object() {
        return Err(NormalizeError::InvalidDocument {
            actual: json_type_name(document).to_string(),
        });
    }

    let mut graph = Graph::new();
    let root = graph.import(document);
    let source_root = source.map(|value| graph.import(value));
    let mut cx = Engine::new(root, source_root);

    if options.origins_flag.is_some() {
        seed_defining(&graph, &mut cx, root);
        if let Some(source_root) = source_root {
            seed_defining(&graph, &mut cx, source_root);
        }
    }
    if options.validate {
        validate_input(&graph, rules, options, root, &mut Vec::new());
    }

    let root = {
        let hooks = [resolver::HOOK, merge::HOOK, ORIGINS_HOOK, DEFAULTS_HOOK];
        let mut walker = Walker::new(&mut graph, rules, options, &mut cx, &hooks);
        walker.process(root, Role::Schema)?
    };
    if options.lift_combiners {
        let hooks = [lift::HOOK];
        let mut walker = Walker::new(&mut graph, rules, options, &mut cx, &hooks);
        walker.process(root, Role::Schema)?;
    }
    if options.hash_flag.is_some() {
        let hashes = NodeHasher::new(&graph, rules, &cx.injected_defaults).run(root);
        cx.hashes = hashes;
    }

    Ok(NormalizedDocument {
        graph,
        root,
        origins: cx.origins,
        origin_fields: cx.origin_fields,
        synthetic_titles: cx.synthetic_titles,
        synthetic_all_of: cx.synthetic_all_of,
        inline_refs: cx.inline_refs,
        injected_defaults: cx.injected_defaults,
        hashes: cx.hashes,
        markers: MarkerKeys::from_options(options),
    })
}

/// Strip every marker key configured in `options` from `document`, in place.
///
/// Works on any tree, not only trees this crate produced. Marker-keyed
/// subtrees are removed wholesale, never descended into.
pub fn denormalize(document: &mut Value, options: &NormalizeOptions) {
    denormalize_keys(document, &options.marker_keys());
}

/// Strip an explicit set of marker keys from `document`, in place.
pub fn denormalize_keys(document: &mut Value, keys: &[&str]) {
    if keys.is_empty() {
        return;
    }
    strip_markers(document, keys);
}

fn strip_markers(value: &mut Value, keys: &[&str]) {
    match value {
        Value::Object(map) => {
            for key in keys {
                map.remove(*key);
            }
            for (_, child) in map.iter_mut() {
                strip_markers(child, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_markers(item, keys);
            }
        }
        _ => {}
    }
}

/// Marker keys captured at normalize time, so exporting needs no options.
#[derive(Debug)]
struct MarkerKeys {
    origins: Option<String>,
    defaults: Option<String>,
    synthetic_title: Option<String>,
    synthetic_all_of: Option<String>,
    inline_refs: Option<String>,
    hash: Option<String>,
}

impl MarkerKeys {
    fn from_options(options: &NormalizeOptions) -> Self {
        MarkerKeys {
            origins: options.origins_flag.clone(),
            defaults: options.defaults_flag.clone(),
            synthetic_title: options.synthetic_title_flag.clone(),
            synthetic_all_of: options.synthetic_all_of_flag.clone(),
            inline_refs: options.inline_refs_flag.clone(),
            hash: options.hash_flag.clone(),
        }
    }
}

/// The result of a normalization call.
///
/// Holds the node arena plus identity-keyed side tables for every kind of
/// tracked metadata. Structure sharing and cycles are visible as repeated
/// [`NodeId`]s; [`NormalizedDocument::to_value`] re-emits cycle back-edges
/// as `$ref` pointers.
#[derive(Debug)]
pub struct NormalizedDocument {
    graph: Graph,
    root: NodeId,
    origins: OriginStore,
    origin_fields: HashMap<NodeId, IndexMap<String, Vec<OriginId>>>,
    synthetic_titles: HashSet<NodeId>,
    synthetic_all_of: HashSet<NodeId>,
    inline_refs: HashMap<NodeId, Vec<String>>,
    injected_defaults: HashMap<NodeId, Vec<String>>,
    hashes: HashMap<NodeId, String>,
    markers: MarkerKeys,
}

impl NormalizedDocument {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.graph.node(id)
    }

    /// Node at a JSON Pointer below the root.
    pub fn id_at(&self, pointer: &str) -> Option<NodeId> {
        self.graph.resolve_pointer(self.root, pointer)
    }

    /// Exported subtree at a JSON Pointer below the root.
    pub fn value_at(&self, pointer: &str) -> Option<Value> {
        self.id_at(pointer).map(|id| self.graph.export(id))
    }

    /// Content hash of a node; present when hashing was requested.
    pub fn hash_of(&self, id: NodeId) -> Option<&str> {
        self.hashes.get(&id).map(String::as_str)
    }

    /// Origin chains recorded for one field of a node.
    pub fn origins_of(&self, id: NodeId, key: &str) -> Option<&[OriginId]> {
        self.origin_fields.get(&id)?.get(key).map(Vec::as_slice)
    }

    /// JSON Pointer form of an origin chain.
    pub fn origin_pointer(&self, origin: OriginId) -> String {
        self.origins.pointer(origin)
    }

    pub fn is_synthetic_title(&self, id: NodeId) -> bool {
        self.synthetic_titles.contains(&id)
    }

    pub fn is_synthetic_all_of(&self, id: NodeId) -> bool {
        self.synthetic_all_of.contains(&id)
    }

    /// References traversed to reach this node, oldest first.
    pub fn inline_refs(&self, id: NodeId) -> Option<&[String]> {
        self.inline_refs.get(&id).map(Vec::as_slice)
    }

    /// Keyword defaults materialized on this node.
    pub fn injected_defaults(&self, id: NodeId) -> Option<&[String]> {
        self.injected_defaults.get(&id).map(Vec::as_slice)
    }

    /// Export the document, embedding requested metadata under the
    /// configured marker keys.
    pub fn to_value(&self) -> Value {
        self.graph
            .export_with(self.root, &mut |id| self.marker_entries(id))
    }

    fn marker_entries(&self, id: NodeId) -> Vec<(String, Value)> {
        let mut entries = Vec::new();
        if let Some(key) = &self.markers.origins {
            if let Some(fields) = self.origin_fields.get(&id) {
                let mut map = serde_json::Map::new();
                for (field, chains) in fields {
                    let pointers: Vec<Value> = chains
                        .iter()
                        .map(|&chain| Value::String(self.origins.pointer(chain)))
                        .collect();
                    map.insert(field.clone(), Value::Array(pointers));
                }
                entries.push((key.clone(), Value::Object(map)));
            }
        }
        if let Some(key) = &self.markers.defaults {
            if let Some(keys) = self.injected_defaults.get(&id) {
                let list = keys.iter().cloned().map(Value::String).collect();
                entries.push((key.clone(), Value::Array(list)));
            }
        }
        if let Some(key) = &self.markers.synthetic_title {
            if self.synthetic_titles.contains(&id) {
                entries.push((key.clone(), Value::Bool(true)));
            }
        }
        if let Some(key) = &self.markers.synthetic_all_of {
            if self.synthetic_all_of.contains(&id) {
                entries.push((key.clone(), Value::Bool(true)));
            }
        }
        if let Some(key) = &self.markers.inline_refs {
            if let Some(history) = self.inline_refs.get(&id) {
                let list = history.iter().cloned().map(Value::String).collect();
                entries.push((key.clone(), Value::Array(list)));
            }
        }
        if let Some(key) = &self.markers.hash {
            if let Some(hash) = self.hashes.get(&id) {
                entries.push((key.clone(), Value::String(hash.clone())));
            }
        }
        entries
    }
}
