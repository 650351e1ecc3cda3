//! A lightweight, [arena allocated](https://en.wikipedia.org/wiki/Region-based_memory_management)
//! transform hierarchy with lazy world poses.
//!
//! Every node has at most one child. A maximal run of nodes linked parent → child is a *chain*,
//! stored as one flat, root-first list of indices that is shared by all its members. Updating the
//! world poses of a whole kinematic arm therefore is a single forward pass over that list instead
//! of a pointer walk. Re-parenting splits and merges these lists (see
//! [TransformHierarchy::set_parent]).

mod hierarchy;

pub use hierarchy::TransformHierarchy;

use nalgebra::{UnitQuaternion, Vector3};
use std::fmt;

/// Handle of a node in a [TransformHierarchy].
///
/// Indices of removed nodes are recycled, so a handle must not be used after
/// [TransformHierarchy::remove] has been called on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformIndex(pub(crate) usize);

impl fmt::Display for TransformIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a chain (the shared list of nodes) inside a [TransformHierarchy]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChainIndex(pub(crate) usize);

/// A node structure to be used in the [TransformHierarchy] arena.
#[derive(Debug, Clone)]
pub struct TransformNode {
    pub(crate) local_position: Vector3<f64>,
    pub(crate) local_rotation: UnitQuaternion<f64>,
    /// Cached, only valid if neither this node nor any node before it in the chain is dirty
    pub(crate) world_position: Vector3<f64>,
    pub(crate) world_rotation: UnitQuaternion<f64>,
    pub(crate) dirty: bool,
    pub(crate) parent: Option<TransformIndex>,
    pub(crate) chain: ChainIndex,
}

impl TransformNode {
    fn new(local_position: Vector3<f64>, local_rotation: UnitQuaternion<f64>, chain: ChainIndex) -> Self {
        Self {
            local_position,
            local_rotation,
            world_position: local_position,
            world_rotation: local_rotation,
            dirty: true,
            parent: None,
            chain,
        }
    }

    pub fn local_position(&self) -> Vector3<f64> {
        self.local_position
    }

    pub fn local_rotation(&self) -> UnitQuaternion<f64> {
        self.local_rotation
    }

    pub fn parent(&self) -> Option<TransformIndex> {
        self.parent
    }

    /// Whether the cached world pose of this node itself is stale. Note that a clean node
    /// may still be outdated if a node before it in its chain is dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
