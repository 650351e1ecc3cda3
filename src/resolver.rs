//! Discovers the order of a set of servos relative to the effector in the rigid-body tree.
//!
//! Two layouts are valid: the servos are ancestors of the effector (the arm hangs from the
//! vehicle and the effector is its tip), or the servos are descendants of the effector (the arm
//! is anchored below the effector and moves the effector's side). In both cases the servos have
//! to form a single line. Resolution is a pure function, so a failed attempt cannot damage a
//! previously resolved chain.

use crate::body::{BodyTree, HousingSide};
use crate::errors::ChainError;
use itertools::Itertools;
use tracing::debug;

/// How the effector relates to the servos in the body tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectorRelation {
    /// The servos are ancestors of the effector
    EffectorIsChild,
    /// The servos are descendants of the effector
    EffectorIsParent,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder<Id> {
    /// Nearest to the effector first
    joints: Vec<Id>,
    relation: EffectorRelation,
}

impl<Id> ResolvedOrder<Id> {
    /// Joint bodies ordered from the effector toward the root
    pub fn joints(&self) -> &[Id] {
        &self.joints
    }

    pub fn relation(&self) -> EffectorRelation {
        self.relation
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// Orders the `joints` (given by their bodies) from the effector on.
///
/// First, the ancestors of `effector` are searched. If that finds some but not all joints,
/// the effector sits in the middle of the chain. Otherwise, the tree is descended from the
/// effector: at each level the first child carrying a joint is taken and its siblings are
/// discarded, so joints on different branches or separated by a body without a joint are
/// reported as a discontinuous chain.
pub fn resolve_order<T>(
    tree: &T,
    joints: &[T::BodyId],
    effector: Option<&T::BodyId>,
) -> Result<ResolvedOrder<T::BodyId>, ChainError>
where
    T: BodyTree,
{
    let effector = effector.ok_or(ChainError::NoEffector)?;
    if joints.is_empty() {
        return Err(ChainError::NoJoints);
    }

    let mut pending = joints.iter().unique().cloned().collect_vec();
    let mut found = Vec::with_capacity(pending.len());

    let mut current = tree.parent_of(effector);
    while let Some(body) = current {
        if take(&mut pending, &body) {
            found.push(body.clone());
            if pending.is_empty() {
                break;
            }
        }
        current = tree.parent_of(&body);
    }

    if !found.is_empty() {
        if !pending.is_empty() {
            debug!("{} joints above the effector, {} elsewhere", found.len(), pending.len());
            return Err(ChainError::EffectorNotAtChainEnd);
        }
        debug!("Resolved {} joints above the effector", found.len());
        return Ok(ResolvedOrder {
            joints: found,
            relation: EffectorRelation::EffectorIsChild,
        });
    }

    let mut current = effector.clone();
    while !pending.is_empty() {
        let candidates = tree
            .children_of(&current)
            .into_iter()
            .filter(|child| pending.contains(child))
            .collect_vec();
        let Some(next) = candidates.first().cloned() else {
            break;
        };
        if candidates.len() > 1 {
            debug!("Chain branches below {current:?}, following {next:?} only");
        }
        take(&mut pending, &next);
        found.push(next.clone());
        current = next;
    }

    if !pending.is_empty() {
        debug!("{} of {} joints not reachable in a single line", pending.len(), joints.len());
        return Err(ChainError::DiscontinuousChain);
    }
    debug!("Resolved {} joints below the effector", found.len());
    Ok(ResolvedOrder {
        joints: found,
        relation: EffectorRelation::EffectorIsParent,
    })
}

/// Whether a joint has to be driven with its main axis flipped.
///
/// `parent_side` is the side of the joint's housing its tree parent is attached to (`None` for a
/// joint without a parent, which is never inverted). A joint is inverted exactly when its moving
/// housing faces the effector in an [EffectorRelation::EffectorIsChild] chain, or faces the root
/// in an [EffectorRelation::EffectorIsParent] chain.
pub fn is_inverted(relation: EffectorRelation, parent_side: Option<HousingSide>) -> bool {
    let Some(parent_side) = parent_side else {
        return false;
    };
    let parent_faces_effector = relation == EffectorRelation::EffectorIsParent;
    let moving_faces_parent = parent_side == HousingSide::Moving;
    let moving_faces_effector = moving_faces_parent == parent_faces_effector;
    // Both cases come down to the parent holding the base side
    match relation {
        EffectorRelation::EffectorIsChild => moving_faces_effector,
        EffectorRelation::EffectorIsParent => !moving_faces_effector,
    }
}

/// Removes `item` from `pending`, returns whether it was there
fn take<Id: PartialEq>(pending: &mut Vec<Id>, item: &Id) -> bool {
    match pending.iter().position(|candidate| candidate == item) {
        Some(index) => {
            pending.remove(index);
            true
        }
        None => false,
    }
}
