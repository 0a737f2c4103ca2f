//! Per-field provenance chains.
//!
//! An origin is a linked chain of path segments from a source-document
//! location up to its root. Chains are interned: asking for the same
//! (parent, segment) pair always returns the same [`OriginId`], so "same
//! source location" is id equality everywhere, exactly like node identity in
//! the graph arena.

use std::collections::HashMap;

use crate::graph::{pointer_of, Segment};

/// Identity of an interned origin chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginId(u32);

/// One link of an origin chain. `parent: None` means the next step up is the
/// document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginLeaf {
    pub value: Segment,
    pub parent: Option<OriginId>,
}

/// Interning arena for origin chains, scoped to one normalization call.
#[derive(Debug, Default)]
pub struct OriginStore {
    leaves: Vec<OriginLeaf>,
    interned: HashMap<(Option<OriginId>, Segment), OriginId>,
}

impl OriginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain for `segment` below `parent`, reusing an existing instance
    /// when one was built before.
    pub fn chain(&mut self, parent: Option<OriginId>, segment: Segment) -> OriginId {
        if let Some(id) = self.interned.get(&(parent, segment.clone())) {
            return *id;
        }
        let id = OriginId(self.leaves.len() as u32);
        self.leaves.push(OriginLeaf {
            value: segment.clone(),
            parent,
        });
        self.interned.insert((parent, segment), id);
        id
    }

    pub fn leaf(&self, id: OriginId) -> &OriginLeaf {
        &self.leaves[id.0 as usize]
    }

    /// Render a chain as a JSON Pointer from the document root.
    pub fn pointer(&self, id: OriginId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(link) = current {
            let leaf = self.leaf(link);
            segments.push(leaf.value.clone());
            current = leaf.parent;
        }
        segments.reverse();
        pointer_of(&segments)
    }
}
