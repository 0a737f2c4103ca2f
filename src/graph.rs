//! Arena-backed document graph.
//!
//! `serde_json::Value` trees have no instance identity, so normalization works
//! on an arena of [`Node`]s addressed by [`NodeId`]. Structural sharing and
//! cycles are expressed as repeated ids; "same instance" is id equality.
//! Caller input is imported once and never mutated; results are exported back
//! to `Value` on demand, with cycle back-edges re-emitted as `$ref` pointers.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Number, Value};

/// Identity of a node in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single document node.
///
/// Container nodes hold child ids, not child values; everything else mirrors
/// the JSON data model.
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NodeId>),
    Object(IndexMap<String, NodeId>),
}

impl Node {
    /// JSON type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }
}

/// One step of a document path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{}", escape_segment(k)),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Render path segments as a JSON Pointer (RFC 6901). Empty slice is the root.
pub fn pointer_of(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(&seg.to_string());
    }
    out
}

/// Split a JSON Pointer into unescaped segments.
///
/// Returns `None` when the pointer is non-empty but does not start with `/`.
pub fn pointer_segments(pointer: &str) -> Option<Vec<String>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let rest = pointer.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|part| part.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Arena of document nodes.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// The object map behind `id`, if it is an object.
    pub fn object(&self, id: NodeId) -> Option<&IndexMap<String, NodeId>> {
        match self.node(id) {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, id: NodeId) -> Option<&mut IndexMap<String, NodeId>> {
        match self.node_mut(id) {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The element list behind `id`, if it is an array.
    pub fn array(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.node(id) {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The string behind `id`, if it is a string.
    pub fn string(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Child of an object node by key.
    pub fn key(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.object(id).and_then(|map| map.get(key).copied())
    }

    /// Import a JSON value, returning the root id of the imported tree.
    pub fn import(&mut self, value: &Value) -> NodeId {
        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => {
                let children = items.iter().map(|item| self.import(item)).collect();
                Node::Array(children)
            }
            Value::Object(map) => {
                let mut children = IndexMap::with_capacity(map.len());
                for (key, child) in map {
                    let child_id = self.import(child);
                    children.insert(key.clone(), child_id);
                }
                Node::Object(children)
            }
        };
        self.insert(node)
    }

    /// Export a subtree as a plain JSON value.
    ///
    /// Cycle back-edges become `{"$ref": "#<pointer to first visit>"}` so the
    /// export always terminates.
    pub fn export(&self, root: NodeId) -> Value {
        self.export_with(root, &mut |_| Vec::new())
    }

    /// Export with per-object annotations.
    ///
    /// `annotate` is called once per exported object node; returned entries
    /// are appended after the node's own keys. Back-edge stubs are not
    /// annotated.
    pub fn export_with(
        &self,
        root: NodeId,
        annotate: &mut dyn FnMut(NodeId) -> Vec<(String, Value)>,
    ) -> Value {
        let mut on_stack = HashMap::new();
        let mut path = Vec::new();
        self.export_inner(root, &mut path, &mut on_stack, annotate)
    }

    fn export_inner(
        &self,
        id: NodeId,
        path: &mut Vec<Segment>,
        on_stack: &mut HashMap<NodeId, String>,
        annotate: &mut dyn FnMut(NodeId) -> Vec<(String, Value)>,
    ) -> Value {
        if let Some(pointer) = on_stack.get(&id) {
            let mut stub = serde_json::Map::new();
            stub.insert("$ref".to_string(), Value::String(format!("#{}", pointer)));
            return Value::Object(stub);
        }

        match self.node(id) {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => {
                on_stack.insert(id, pointer_of(path));
                let children = items.iter().copied();
                let mut out = Vec::with_capacity(items.len());
                for (i, child) in children.enumerate() {
                    path.push(Segment::Index(i));
                    out.push(self.export_inner(child, path, on_stack, annotate));
                    path.pop();
                }
                on_stack.remove(&id);
                Value::Array(out)
            }
            Node::Object(map) => {
                on_stack.insert(id, pointer_of(path));
                let entries: Vec<(String, NodeId)> =
                    map.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let mut out = serde_json::Map::new();
                for (key, child) in entries {
                    path.push(Segment::Key(key.clone()));
                    out.insert(key, self.export_inner(child, path, on_stack, annotate));
                    path.pop();
                }
                for (key, value) in annotate(id) {
                    out.insert(key, value);
                }
                on_stack.remove(&id);
                Value::Object(out)
            }
        }
    }

    /// Navigate a JSON Pointer from `root`.
    ///
    /// Plain structural navigation; returns `None` on a missing key, a bad
    /// index, or a malformed pointer.
    pub fn resolve_pointer(&self, root: NodeId, pointer: &str) -> Option<NodeId> {
        let segments = pointer_segments(pointer)?;
        let mut current = root;
        for segment in &segments {
            current = self.step(current, segment)?;
        }
        Some(current)
    }

    /// One navigation step: object key or array index.
    pub fn step(&self, id: NodeId, segment: &str) -> Option<NodeId> {
        match self.node(id) {
            Node::Object(map) => map.get(segment).copied(),
            Node::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index).copied()
            }
            _ => None,
        }
    }

    /// Deep structural equality, cycle-safe.
    ///
    /// Two nodes are equal when their unfolded trees match; shared or cyclic
    /// structure on either side is handled by assuming equality for pairs
    /// already under comparison.
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> bool {
        let mut in_progress = HashSet::new();
        self.structural_eq_inner(a, b, &mut in_progress)
    }

    fn structural_eq_inner(
        &self,
        a: NodeId,
        b: NodeId,
        in_progress: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        if a == b {
            return true;
        }
        if !in_progress.insert((a, b)) {
            return true;
        }
        let equal = match (self.node(a), self.node(b)) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(x), Node::Bool(y)) => x == y,
            (Node::Number(x), Node::Number(y)) => x == y,
            (Node::String(x), Node::String(y)) => x == y,
            (Node::Array(xs), Node::Array(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|(x, y)| self.structural_eq_inner(*x, *y, in_progress))
            }
            (Node::Object(xs), Node::Object(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().all(|(key, x)| {
                        ys.get(key)
                            .is_some_and(|y| self.structural_eq_inner(*x, *y, in_progress))
                    })
            }
            _ => false,
        };
        in_progress.remove(&(a, b));
        equal
    }
}
