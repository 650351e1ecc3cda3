//! The rigid-body tree the servos are mounted in.
//!
//! The resolver only needs two capabilities from the host: walking the tree ([BodyTree]) and
//! knowing on which side of a servo housing its parent body is attached ([MountingSide]).
//! [BodyArena] is an arena allocated tree providing both.

mod arena;

pub use arena::{BodyArena, BodyNode};

use std::{fmt::Debug, hash::Hash};

/// Read access to a tree of rigid bodies.
pub trait BodyTree {
    /// Stable identity of a body
    type BodyId: Eq + Hash + Clone + Debug;

    fn parent_of(&self, body: &Self::BodyId) -> Option<Self::BodyId>;
    fn children_of(&self, body: &Self::BodyId) -> Vec<Self::BodyId>;
}

/// The two halves of a servo housing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HousingSide {
    /// The fixed half the actuator is mounted with
    #[default]
    Base,
    /// The half that turns
    Moving,
}

/// Answers to which side of a joint's housing its parent body in the tree is attached.
///
/// Host specific (stack vs. surface attachment ...), hence a pluggable predicate. Closures
/// `Fn(&joint_body, &parent_body) -> HousingSide` implement it.
pub trait MountingSide<Id> {
    fn parent_side(&self, joint_body: &Id, parent_body: &Id) -> HousingSide;
}

impl<Id, F> MountingSide<Id> for F
where
    F: Fn(&Id, &Id) -> HousingSide,
{
    fn parent_side(&self, joint_body: &Id, parent_body: &Id) -> HousingSide {
        self(joint_body, parent_body)
    }
}
