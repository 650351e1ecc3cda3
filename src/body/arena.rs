//! Implementation of an [arena allocated](https://en.wikipedia.org/wiki/Region-based_memory_management)
//! rigid-body tree with id lookup, parent references and per-body mounting sides.

use super::{BodyTree, HousingSide, MountingSide};
use crate::errors::TreeError;
use core::fmt;
use itertools::Itertools;
use std::{collections::HashMap, fmt::Debug, hash::Hash};

/// A node structure to be used in the arena allocated [BodyArena].
#[derive(Debug)]
pub struct BodyNode<Load, BodyId> {
    /// The user-defined load that the node owns
    load: Load,
    /// Index in the arena allocation
    index: usize,
    /// identifier for lookups
    id: BodyId,
    /// references for children
    children: Vec<usize>,
    /// Distance to the root
    depth: usize,
    parent_ref: Option<usize>,
    /// Side of this body's housing the parent is attached to. Only meaningful for servo bodies
    parent_side: HousingSide,
}

impl<Load, BodyId: Clone> BodyNode<Load, BodyId> {
    pub fn load(&self) -> &Load {
        &self.load
    }

    pub fn id(&self) -> BodyId {
        self.id.clone()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn parent_side(&self) -> HousingSide {
        self.parent_side
    }
}

impl<Load, BodyId> fmt::Display for BodyNode<Load, BodyId>
where
    Load: fmt::Display,
    BodyId: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Body {:?} ({}), children: {:?}, payload: {} ",
            self.id, self.index, self.children, self.load
        )
    }
}

/// Rigid-body tree that uses arena allocation.
///
/// Bodies are only ever added, so indices stay valid. Lookup by id is O(1).
pub struct BodyArena<Load, BodyId> {
    /// Memory allocated area for nodes
    nodes: Vec<BodyNode<Load, BodyId>>,
    lookup: HashMap<BodyId, usize>,
}

impl<Load, BodyId> BodyArena<Load, BodyId>
where
    BodyId: Eq + Clone + Hash + Debug,
{
    pub fn new() -> Self {
        BodyArena {
            nodes: vec![],
            lookup: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BodyArena {
            nodes: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
        }
    }

    /// Deletes all bodies and sets a new root
    pub fn set_root(&mut self, load: Load, id: BodyId) -> BodyId {
        self.nodes.clear();
        self.lookup.clear();
        self.lookup.insert(id.clone(), 0);
        self.nodes.push(BodyNode {
            load,
            index: 0,
            id: id.clone(),
            children: vec![],
            depth: 0,
            parent_ref: None,
            parent_side: HousingSide::Base,
        });
        id
    }

    /// Adds a body below `parent`, attached with its base side
    pub fn add(&mut self, load: Load, id: BodyId, parent: &BodyId) -> Result<BodyId, TreeError<BodyId>> {
        self.add_mounted(load, id, parent, HousingSide::Base)
    }

    /// Adds a body below `parent`, which attaches to the given side of the new body's housing
    pub fn add_mounted(
        &mut self,
        load: Load,
        id: BodyId,
        parent: &BodyId,
        parent_side: HousingSide,
    ) -> Result<BodyId, TreeError<BodyId>> {
        if self.nodes.is_empty() {
            return Err(TreeError::RootNotSet);
        }
        // First check whether we can add the node (id not used yet)
        if self.lookup.contains_key(&id) {
            return Err(TreeError::NotUnique(id));
        }
        let parent_index = *self
            .lookup
            .get(parent)
            .ok_or_else(|| TreeError::UnknownBody(parent.clone()))?;

        let index = self.nodes.len();
        let depth = self.nodes[parent_index].depth + 1;
        self.nodes[parent_index].children.push(index);

        self.lookup.insert(id.clone(), index);
        self.nodes.push(BodyNode {
            load,
            index,
            id: id.clone(),
            children: vec![],
            depth,
            parent_ref: Some(parent_index),
            parent_side,
        });
        Ok(id)
    }

    pub fn root(&self) -> Result<&BodyNode<Load, BodyId>, TreeError<BodyId>> {
        self.nodes.first().ok_or(TreeError::RootNotSet)
    }

    pub fn node_by_id(&self, id: &BodyId) -> Option<&BodyNode<Load, BodyId>> {
        self.nodes.get(*self.lookup.get(id)?)
    }

    pub fn nodes(&self) -> &[BodyNode<Load, BodyId>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<Load, BodyId> Default for BodyArena<Load, BodyId>
where
    BodyId: Eq + Clone + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Load, BodyId> BodyTree for BodyArena<Load, BodyId>
where
    BodyId: Eq + Clone + Hash + Debug,
{
    type BodyId = BodyId;

    fn parent_of(&self, body: &BodyId) -> Option<BodyId> {
        let parent = self.node_by_id(body)?.parent_ref?;
        Some(self.nodes[parent].id.clone())
    }

    fn children_of(&self, body: &BodyId) -> Vec<BodyId> {
        self.node_by_id(body)
            .map(|node| node.children.iter().map(|child| self.nodes[*child].id.clone()).collect_vec())
            .unwrap_or_default()
    }
}

impl<Load, BodyId> MountingSide<BodyId> for BodyArena<Load, BodyId>
where
    BodyId: Eq + Clone + Hash + Debug,
{
    /// Uses the side recorded when the joint body was added. `parent_body` is implied by the tree.
    fn parent_side(&self, joint_body: &BodyId, _parent_body: &BodyId) -> HousingSide {
        self.node_by_id(joint_body)
            .map(|node| node.parent_side)
            .unwrap_or_default()
    }
}
