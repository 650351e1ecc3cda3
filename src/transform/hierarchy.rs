//! Implementation of the transform arena. Nodes and chains live in two separate arenas
//! (plain vectors with free lists) and refer to each other by index.

use super::{ChainIndex, TransformIndex, TransformNode};
use crate::errors::HierarchyError;
use crate::pose::{compose, Pose};
use itertools::Itertools;
use nalgebra::{UnitQuaternion, Vector3};
use tracing::trace;

/// Arena holding transform nodes linked into root-first chains.
///
/// Invariants:
/// * every live node is a member of exactly one chain, the one its `chain` field points to
/// * element 0 of a chain is its root and the only member without a parent
/// * the parent of element `i > 0` is element `i - 1`
/// * if a node is dirty, all nodes after it in its chain are treated as dirty
#[derive(Debug, Default)]
pub struct TransformHierarchy {
    nodes: Vec<Option<TransformNode>>,
    free_nodes: Vec<usize>,
    /// An empty chain marks a free slot
    chains: Vec<Vec<TransformIndex>>,
    free_chains: Vec<usize>,
    count: usize,
}

impl TransformHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            chains: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, index: TransformIndex) -> bool {
        matches!(self.nodes.get(index.0), Some(Some(_)))
    }

    /// Read access to a node. Cached world values are not exposed here as they may be stale.
    pub fn node(&self, index: TransformIndex) -> Result<&TransformNode, HierarchyError> {
        self.nodes
            .get(index.0)
            .and_then(Option::as_ref)
            .ok_or(HierarchyError::UnknownNode(index))
    }

    fn node_mut(&mut self, index: TransformIndex) -> Result<&mut TransformNode, HierarchyError> {
        self.nodes
            .get_mut(index.0)
            .and_then(Option::as_mut)
            .ok_or(HierarchyError::UnknownNode(index))
    }

    /// Adds a standalone root node whose world pose is `(position, rotation)`.
    pub fn insert(&mut self, position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> TransformIndex {
        let index = match self.free_nodes.pop() {
            Some(slot) => TransformIndex(slot),
            None => {
                self.nodes.push(None);
                TransformIndex(self.nodes.len() - 1)
            }
        };
        let chain = self.allocate_chain(vec![index]);
        let rotation = UnitQuaternion::new_normalize(rotation.into_inner());
        self.nodes[index.0] = Some(TransformNode::new(position, rotation, chain));
        self.count += 1;
        index
    }

    /// Adds a node below `parent` with the given local pose. An existing child of `parent`
    /// is split off into a hierarchy of its own.
    pub fn insert_child(
        &mut self,
        parent: TransformIndex,
        local_position: Vector3<f64>,
        local_rotation: UnitQuaternion<f64>,
    ) -> Result<TransformIndex, HierarchyError> {
        self.node(parent)?;
        let index = self.insert(local_position, local_rotation);
        self.attach(index, parent)?;
        Ok(index)
    }

    /// Removes a node. Its child (if any) becomes a root and keeps its world pose.
    pub fn remove(&mut self, index: TransformIndex) -> Result<(), HierarchyError> {
        if let Some(child) = self.child(index)? {
            self.set_parent_keep_world_pose(child, None)?;
        }
        self.split(index)?;
        let chain = self.node(index)?.chain;
        self.chains[chain.0].clear();
        self.free_chains.push(chain.0);
        self.nodes[index.0] = None;
        self.free_nodes.push(index.0);
        self.count -= 1;
        Ok(())
    }

    // Topology

    pub fn parent(&self, index: TransformIndex) -> Result<Option<TransformIndex>, HierarchyError> {
        Ok(self.node(index)?.parent)
    }

    pub fn child(&self, index: TransformIndex) -> Result<Option<TransformIndex>, HierarchyError> {
        let chain = self.node(index)?.chain;
        let offset = self.offset(index, chain);
        Ok(self.chains[chain.0].get(offset + 1).copied())
    }

    /// The root of the hierarchy `index` is part of (possibly `index` itself)
    pub fn root(&self, index: TransformIndex) -> Result<TransformIndex, HierarchyError> {
        Ok(self.chain(index)?[0])
    }

    /// All members of the hierarchy `index` is part of, root first.
    pub fn chain(&self, index: TransformIndex) -> Result<&[TransformIndex], HierarchyError> {
        let chain = self.node(index)?.chain;
        Ok(&self.chains[chain.0])
    }

    // Local pose

    pub fn local_position(&self, index: TransformIndex) -> Result<Vector3<f64>, HierarchyError> {
        Ok(self.node(index)?.local_position)
    }

    pub fn local_rotation(&self, index: TransformIndex) -> Result<UnitQuaternion<f64>, HierarchyError> {
        Ok(self.node(index)?.local_rotation)
    }

    pub fn set_local_position(&mut self, index: TransformIndex, position: Vector3<f64>) -> Result<(), HierarchyError> {
        let node = self.node_mut(index)?;
        node.local_position = position;
        node.dirty = true;
        Ok(())
    }

    /// Sets the rotation relative to the parent. The input is renormalized.
    pub fn set_local_rotation(
        &mut self,
        index: TransformIndex,
        rotation: UnitQuaternion<f64>,
    ) -> Result<(), HierarchyError> {
        let node = self.node_mut(index)?;
        node.local_rotation = UnitQuaternion::new_normalize(rotation.into_inner());
        node.dirty = true;
        Ok(())
    }

    // World pose

    pub fn position(&mut self, index: TransformIndex) -> Result<Vector3<f64>, HierarchyError> {
        self.update_world_pose(index)?;
        Ok(self.node(index)?.world_position)
    }

    pub fn rotation(&mut self, index: TransformIndex) -> Result<UnitQuaternion<f64>, HierarchyError> {
        self.update_world_pose(index)?;
        Ok(self.node(index)?.world_rotation)
    }

    pub fn pose(&mut self, index: TransformIndex) -> Result<Pose, HierarchyError> {
        self.update_world_pose(index)?;
        let node = self.node(index)?;
        Ok(Pose::new(node.world_position, node.world_rotation))
    }

    /// World pose of the parent, `None` for roots
    fn parent_pose(&mut self, index: TransformIndex) -> Result<Option<Pose>, HierarchyError> {
        match self.node(index)?.parent {
            Some(parent) => Ok(Some(self.pose(parent)?)),
            None => Ok(None),
        }
    }

    pub fn set_position(&mut self, index: TransformIndex, position: Vector3<f64>) -> Result<(), HierarchyError> {
        let local = match self.parent_pose(index)? {
            Some(parent) => parent.rotation.inverse() * (position - parent.position),
            None => position,
        };
        self.set_local_position(index, local)
    }

    pub fn set_rotation(&mut self, index: TransformIndex, rotation: UnitQuaternion<f64>) -> Result<(), HierarchyError> {
        let local = match self.parent_pose(index)? {
            Some(parent) => compose(&parent.rotation.inverse(), &rotation),
            None => rotation,
        };
        self.set_local_rotation(index, local)
    }

    /// Sets world position and rotation with a single lookup of the parent's pose.
    pub fn set_pos_and_rot(
        &mut self,
        index: TransformIndex,
        position: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Result<(), HierarchyError> {
        let (local_position, local_rotation) = match self.parent_pose(index)? {
            Some(parent) => {
                let inverse = parent.rotation.inverse();
                (inverse * (position - parent.position), compose(&inverse, &rotation))
            }
            None => (position, rotation),
        };
        let node = self.node_mut(index)?;
        node.local_position = local_position;
        node.local_rotation = UnitQuaternion::new_normalize(local_rotation.into_inner());
        node.dirty = true;
        Ok(())
    }

    /// Recomputes the cached world poses from the chain's root up to `index` in one forward pass.
    ///
    /// Only nodes that are dirty or follow a dirty node are recomputed. Nodes after `index` are
    /// left alone, but if the recomputation reached `index`, its successor is flagged dirty so the
    /// staleness is not lost.
    pub fn update_world_pose(&mut self, index: TransformIndex) -> Result<(), HierarchyError> {
        let chain = self.node(index)?.chain;
        let offset = self.offset(index, chain);
        let members = &self.chains[chain.0];

        let mut propagate = false;
        let mut parent: Option<(Vector3<f64>, UnitQuaternion<f64>)> = None;
        for member in &members[..=offset] {
            let node = self.nodes[member.0]
                .as_mut()
                .expect("Internal error. Chain refers to a removed node!");
            if node.dirty || propagate {
                match parent {
                    Some((position, rotation)) => {
                        node.world_position = position + rotation * node.local_position;
                        node.world_rotation = compose(&rotation, &node.local_rotation);
                    }
                    None => {
                        node.world_position = node.local_position;
                        node.world_rotation = node.local_rotation;
                    }
                }
                node.dirty = false;
                propagate = true;
            }
            parent = Some((node.world_position, node.world_rotation));
        }

        if propagate {
            if let Some(next) = members.get(offset + 1) {
                if let Some(node) = self.nodes[next.0].as_mut() {
                    node.dirty = true;
                }
            }
        }
        Ok(())
    }

    // Re-parenting

    /// Attaches `index` (together with everything below it) to `parent`, or detaches it with `None`.
    /// The local pose is reset to the identity, i.e., the node moves onto its new parent.
    ///
    /// If `parent` already has a child, that child and its descendants are split off into a
    /// separate hierarchy. Nothing happens if the parent does not change.
    pub fn set_parent(&mut self, index: TransformIndex, parent: Option<TransformIndex>) -> Result<(), HierarchyError> {
        if !self.reparent(index, parent)? {
            return Ok(());
        }
        let node = self.node_mut(index)?;
        node.local_position = Vector3::zeros();
        node.local_rotation = UnitQuaternion::identity();
        node.dirty = true;
        Ok(())
    }

    /// Same as [TransformHierarchy::set_parent] but the world pose of `index` is preserved.
    pub fn set_parent_keep_world_pose(
        &mut self,
        index: TransformIndex,
        parent: Option<TransformIndex>,
    ) -> Result<(), HierarchyError> {
        let pose = self.pose(index)?;
        if self.reparent(index, parent)? {
            self.set_pos_and_rot(index, pose.position, pose.rotation)?;
        }
        Ok(())
    }

    /// Returns whether the topology changed
    fn reparent(&mut self, index: TransformIndex, parent: Option<TransformIndex>) -> Result<bool, HierarchyError> {
        if self.node(index)?.parent == parent {
            return Ok(false);
        }
        match parent {
            Some(parent) => self.attach(index, parent)?,
            None => self.split(index)?,
        }
        Ok(true)
    }

    /// Moves `index` and its descendants to the end of `parent`'s chain. Keeps the local pose.
    fn attach(&mut self, index: TransformIndex, parent: TransformIndex) -> Result<(), HierarchyError> {
        let chain = self.node(index)?.chain;
        let parent_chain = self.node(parent)?.chain;
        if parent == index || (chain == parent_chain && self.offset(parent, chain) > self.offset(index, chain)) {
            return Err(HierarchyError::Cycle { node: index, parent });
        }

        self.split(index)?;
        if let Some(child) = self.child(parent)? {
            self.split(child)?;
        }

        let chain = self.node(index)?.chain;
        let parent_chain = self.node(parent)?.chain;
        let moved = std::mem::take(&mut self.chains[chain.0]);
        self.free_chains.push(chain.0);
        for member in &moved {
            self.node_mut(*member)?.chain = parent_chain;
        }
        trace!(
            "Merging {} into the chain of {parent}",
            moved.iter().map(|i| i.to_string()).join(", ")
        );
        self.chains[parent_chain.0].extend(moved);

        let node = self.node_mut(index)?;
        node.parent = Some(parent);
        node.dirty = true;
        Ok(())
    }

    /// Splits `index` and its descendants off into a new chain of which `index` is the root.
    /// Keeps the local pose (i.e., the world pose changes).
    fn split(&mut self, index: TransformIndex) -> Result<(), HierarchyError> {
        let chain = self.node(index)?.chain;
        let offset = self.offset(index, chain);
        if offset == 0 {
            return Ok(());
        }
        let suffix = self.chains[chain.0].split_off(offset);
        trace!("Splitting {} chain members off at {index}", suffix.len());
        self.allocate_chain(suffix);

        let node = self.node_mut(index)?;
        node.parent = None;
        node.dirty = true;
        Ok(())
    }

    /// Stores a list of members in a free chain slot and points the members to it
    fn allocate_chain(&mut self, members: Vec<TransformIndex>) -> ChainIndex {
        let chain = match self.free_chains.pop() {
            Some(slot) => {
                self.chains[slot] = Vec::new();
                ChainIndex(slot)
            }
            None => {
                self.chains.push(Vec::new());
                ChainIndex(self.chains.len() - 1)
            }
        };
        for member in &members {
            if let Some(node) = self.nodes[member.0].as_mut() {
                node.chain = chain;
            }
        }
        self.chains[chain.0] = members;
        chain
    }

    /// Position of a node within its chain
    fn offset(&self, index: TransformIndex, chain: ChainIndex) -> usize {
        self.chains[chain.0]
            .iter()
            .position(|member| *member == index)
            .expect("Internal error. Node is not a member of its chain!")
    }
}
