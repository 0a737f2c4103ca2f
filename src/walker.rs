//! Generic depth-first tree walker.
//!
//! One traversal drives every per-node concern (reference resolution, `allOf`
//! merging, origin bookkeeping, default materialization) as an ordered chain
//! of hooks. Each hook sees an object node before its children and decides
//! whether the walk descends, skips, or replaces the node; it may register a
//! callback to run after the children complete. The walker itself owns the
//! cycle guard and the identity-keyed result table, so hooks never have to
//! reason about shared or cyclic structure.

use std::collections::HashMap;

use crate::error::NormalizeError;
use crate::graph::{pointer_of, Graph, Node, NodeId, Segment};
use crate::normalize::Engine;
use crate::rules::{child_role, element_role, Role, RuleSet};
use crate::types::NormalizeOptions;

/// Pre-descent decision of a hook.
pub(crate) enum Flow {
    /// Hand off to the next hook, then descend into children.
    Descend,
    /// Stop the chain; keep the node as-is, children untouched.
    Skip,
    /// Stop the chain; the node's result is another (already processed) node.
    Replace(NodeId),
}

pub(crate) type EnterFn = fn(&mut Walker<'_>, NodeId, Role) -> Result<Visit, NormalizeError>;
pub(crate) type AfterFn = fn(&mut Walker<'_>, NodeId, Role) -> Result<(), NormalizeError>;

/// Outcome of one hook's enter call.
pub(crate) struct Visit {
    pub flow: Flow,
    /// Runs after the node's children are processed (or immediately on
    /// skip/replace), in hook order.
    pub after: Option<AfterFn>,
}

impl Visit {
    pub fn descend() -> Self {
        Visit {
            flow: Flow::Descend,
            after: None,
        }
    }

    pub fn skip() -> Self {
        Visit {
            flow: Flow::Skip,
            after: None,
        }
    }
}

/// One link of the hook chain.
#[derive(Clone, Copy)]
pub(crate) struct Hook {
    pub enter: EnterFn,
}

// White/gray/black node states: absent = untouched, InProgress = on the
// current DFS stack, Done = finished with a known result.
enum State {
    InProgress,
    Done(NodeId),
}

/// Depth-first driver over a [`Graph`], parameterized by a hook chain.
///
/// A walker instance covers one pass; its visited states are not shared
/// between passes.
pub(crate) struct Walker<'a> {
    pub graph: &'a mut Graph,
    pub rules: &'a dyn RuleSet,
    pub opts: &'a NormalizeOptions,
    pub cx: &'a mut Engine,
    hooks: &'a [Hook],
    states: HashMap<NodeId, State>,
    path: Vec<Segment>,
}

impl<'a> Walker<'a> {
    pub fn new(
        graph: &'a mut Graph,
        rules: &'a dyn RuleSet,
        opts: &'a NormalizeOptions,
        cx: &'a mut Engine,
        hooks: &'a [Hook],
    ) -> Self {
        Self {
            graph,
            rules,
            opts,
            cx,
            hooks,
            states: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// JSON Pointer of the node currently being processed.
    pub fn pointer(&self) -> String {
        pointer_of(&self.path)
    }

    /// Process a node reached from somewhere other than the current path
    /// (reference targets). The walk continues at the target's own location.
    pub fn process_at(
        &mut self,
        id: NodeId,
        role: Role,
        at: Vec<Segment>,
    ) -> Result<NodeId, NormalizeError> {
        let saved = std::mem::replace(&mut self.path, at);
        let result = self.process(id, role);
        self.path = saved;
        result
    }

    /// Process a node, returning its result id.
    ///
    /// A node already on the DFS stack returns itself: rewrites are in-place,
    /// so the id is the correct forward result and the cycle stays a cycle.
    pub fn process(&mut self, id: NodeId, role: Role) -> Result<NodeId, NormalizeError> {
        if self.path.len() > self.opts.max_depth {
            return Err(NormalizeError::DepthExceeded {
                limit: self.opts.max_depth,
                path: self.pointer(),
            });
        }
        match self.states.get(&id) {
            Some(State::Done(result)) => return Ok(*result),
            Some(State::InProgress) => return Ok(id),
            None => {}
        }

        match self.graph.node(id) {
            Node::Object(_) => self.process_object(id, role),
            Node::Array(_) => self.process_array(id, role),
            _ => {
                self.states.insert(id, State::Done(id));
                Ok(id)
            }
        }
    }

    fn process_array(&mut self, id: NodeId, role: Role) -> Result<NodeId, NormalizeError> {
        self.states.insert(id, State::InProgress);
        let element_role = element_role(role);
        let items: Vec<NodeId> = self
            .graph
            .array(id)
            .map(|items| items.to_vec())
            .unwrap_or_default();
        for (i, item) in items.into_iter().enumerate() {
            self.path.push(Segment::Index(i));
            let result = self.process(item, element_role);
            self.path.pop();
            let result = result?;
            if result != item {
                if let Node::Array(slots) = self.graph.node_mut(id) {
                    slots[i] = result;
                }
            }
        }
        self.states.insert(id, State::Done(id));
        Ok(id)
    }

    fn process_object(&mut self, id: NodeId, role: Role) -> Result<NodeId, NormalizeError> {
        self.states.insert(id, State::InProgress);

        let mut afters: Vec<AfterFn> = Vec::new();
        let mut outcome = None;
        for i in 0..self.hooks.len() {
            let enter = self.hooks[i].enter;
            let visit = enter(self, id, role)?;
            if let Some(after) = visit.after {
                afters.push(after);
            }
            match visit.flow {
                Flow::Descend => {}
                Flow::Skip => {
                    outcome = Some(id);
                    break;
                }
                Flow::Replace(result) => {
                    outcome = Some(result);
                    break;
                }
            }
        }

        if outcome.is_none() {
            // Snapshot entries: hooks already rewrote the node if they were
            // going to, but child results are written back one at a time.
            let entries: Vec<(String, NodeId)> = match self.graph.node(id) {
                Node::Object(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                _ => Vec::new(),
            };
            for (key, child) in entries {
                let child_role = child_role(self.rules, role, &key);
                self.path.push(Segment::Key(key.clone()));
                let result = self.process(child, child_role);
                self.path.pop();
                let result = result?;
                if result != child {
                    if let Node::Object(map) = self.graph.node_mut(id) {
                        map.insert(key, result);
                    }
                }
            }
        }

        for after in afters {
            after(self, id, role)?;
        }

        let result = outcome.unwrap_or(id);
        self.states.insert(id, State::Done(result));
        Ok(result)
    }
}
