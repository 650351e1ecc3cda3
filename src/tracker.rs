//! The entry point for hosts: a set of servos, an effector and the hierarchy wiring them up.
//!
//! A [ChainTracker] is fed with joints and an effector, [ChainTracker::resolve]d against the
//! host's rigid-body tree, and then [ChainTracker::step]ped once per frame toward a target.

use crate::actuator::Actuator;
use crate::body::{BodyTree, MountingSide};
use crate::errors::ChainError;
use crate::joint::KinematicJoint;
use crate::pose::Pose;
use crate::resolver::{is_inverted, resolve_order, EffectorRelation, ResolvedOrder};
use crate::solver::{CcdSolver, Inverse, SolverConfig, StepInfo};
use crate::transform::{TransformHierarchy, TransformIndex};
use itertools::Itertools;
use std::{fmt::Debug, hash::Hash};
use tracing::{debug, warn};

/// Owns the joints of one servo chain and keeps the last valid resolution.
#[derive(Debug)]
pub struct ChainTracker<Id, A> {
    hierarchy: TransformHierarchy,
    /// In insertion order
    joints: Vec<KinematicJoint<Id, A>>,
    effector: Option<(Id, TransformIndex)>,
    order: Option<ResolvedOrder<Id>>,
    solver: CcdSolver,
}

impl<Id, A> ChainTracker<Id, A>
where
    Id: Eq + Hash + Clone + Debug,
    A: Actuator,
{
    pub fn new(config: SolverConfig) -> Self {
        Self {
            hierarchy: TransformHierarchy::new(),
            joints: vec![],
            effector: None,
            order: None,
            solver: CcdSolver::new(config),
        }
    }

    /// Adds a servo mounted in `body`. A joint already present on that body is removed first.
    ///
    /// The new joint takes part in the chain after the next [ChainTracker::resolve].
    pub fn add_joint(&mut self, body: Id, actuator: A) -> Result<&mut KinematicJoint<Id, A>, ChainError> {
        self.remove_joint(&body)?;
        let joint = KinematicJoint::new(body, actuator, &mut self.hierarchy)?;
        let index = self.joints.len();
        self.joints.push(joint);
        Ok(&mut self.joints[index])
    }

    /// Removes the joint on `body` and returns its actuator.
    ///
    /// If the joint was part of the resolved chain, the chain is torn down and has to be resolved again.
    pub fn remove_joint(&mut self, body: &Id) -> Result<Option<A>, ChainError> {
        let Some(index) = self.position_of(body) else {
            return Ok(None);
        };
        if self.order.as_ref().is_some_and(|order| order.joints().contains(body)) {
            self.tear_down()?;
            self.order = None;
        }
        let joint = self.joints.remove(index);
        Ok(Some(joint.detach(&mut self.hierarchy)?))
    }

    pub fn joint(&self, body: &Id) -> Option<&KinematicJoint<Id, A>> {
        self.joints.iter().find(|joint| joint.body() == body)
    }

    pub fn joint_mut(&mut self, body: &Id) -> Option<&mut KinematicJoint<Id, A>> {
        self.joints.iter_mut().find(|joint| joint.body() == body)
    }

    /// All joints in insertion order
    pub fn joints(&self) -> &[KinematicJoint<Id, A>] {
        &self.joints
    }

    /// Designates `body` as the effector, located at `pose` (world frame).
    ///
    /// For the current effector body, only the pose is updated. Changing the body invalidates
    /// the resolved chain.
    pub fn set_effector(&mut self, body: Id, pose: Pose) -> Result<TransformIndex, ChainError> {
        if let Some((current, node)) = &self.effector {
            if *current == body {
                let node = *node;
                self.hierarchy.set_pos_and_rot(node, pose.position, pose.rotation)?;
                return Ok(node);
            }
        }
        self.clear_effector()?;
        let node = self.hierarchy.insert(pose.position, pose.rotation);
        self.effector = Some((body, node));
        Ok(node)
    }

    /// Drops the effector and with it the resolved chain
    pub fn clear_effector(&mut self) -> Result<(), ChainError> {
        if let Some((_, node)) = self.effector.take() {
            self.order = None;
            self.hierarchy.remove(node)?;
        }
        Ok(())
    }

    pub fn effector(&self) -> Option<&Id> {
        self.effector.as_ref().map(|(body, _)| body)
    }

    pub fn effector_node(&self) -> Option<TransformIndex> {
        self.effector.as_ref().map(|(_, node)| *node)
    }

    /// Current world pose of the effector
    pub fn effector_pose(&mut self) -> Result<Pose, ChainError> {
        let node = self.effector_node().ok_or(ChainError::NoEffector)?;
        self.node_pose(node)
    }

    /// Current world pose of a node of the hierarchy, e.g. a joint's base
    pub fn node_pose(&mut self, node: TransformIndex) -> Result<Pose, ChainError> {
        Ok(self.hierarchy.pose(node)?)
    }

    /// Orders the joints relative to the effector in `tree` and wires the hierarchy accordingly.
    ///
    /// On a resolution error, the previously resolved chain stays in place and in use.
    #[tracing_attributes::instrument(skip_all)]
    pub fn resolve<T, M>(&mut self, tree: &T, mounting: &M) -> Result<&ResolvedOrder<Id>, ChainError>
    where
        T: BodyTree<BodyId = Id>,
        M: MountingSide<Id>,
    {
        let bodies = self.joints.iter().map(|joint| joint.body().clone()).collect_vec();
        let order = match resolve_order(tree, &bodies, self.effector()) {
            Ok(order) => order,
            Err(error) => {
                warn!("Keeping the last valid chain: {error}");
                return Err(error);
            }
        };
        if let Err(error) = self.wire(tree, mounting, &order) {
            self.order = None;
            return Err(error);
        }
        debug!("Wired {} joints ({:?})", order.len(), order.relation());
        Ok(&*self.order.insert(order))
    }

    /// Runs the solver on the resolved chain toward `target`.
    #[tracing_attributes::instrument(skip_all)]
    pub fn step(&mut self, target: &Pose) -> Result<StepInfo, ChainError> {
        let order = self.order.as_ref().ok_or(ChainError::Unresolved)?;
        let (_, effector) = self.effector.as_ref().ok_or(ChainError::Unresolved)?;
        let mut joints = ordered(&mut self.joints, order)?;
        Ok(self.solver.solve(&mut self.hierarchy, &mut joints, *effector, target)?)
    }

    /// Re-reads mounting frames and angles from all actuators, e.g. after the vehicle moved.
    ///
    /// Chained joints are synchronized furthest from the effector first.
    pub fn sync_with_actuators(&mut self) -> Result<(), ChainError> {
        let chained = match &self.order {
            Some(order) => order
                .joints()
                .iter()
                .rev()
                .filter_map(|body| self.position_of(body))
                .collect_vec(),
            None => vec![],
        };
        let loose = (0..self.joints.len()).filter(|index| !chained.contains(index));
        for index in chained.iter().copied().chain(loose).collect_vec() {
            self.joints[index].sync_with_actuator(&mut self.hierarchy)?;
        }
        Ok(())
    }

    pub fn order(&self) -> Option<&ResolvedOrder<Id>> {
        self.order.as_ref()
    }

    pub fn relation(&self) -> Option<EffectorRelation> {
        self.order.as_ref().map(ResolvedOrder::relation)
    }

    pub fn hierarchy(&self) -> &TransformHierarchy {
        &self.hierarchy
    }

    pub fn solver_config(&self) -> &SolverConfig {
        self.solver.config()
    }

    pub fn solver_config_mut(&mut self) -> &mut SolverConfig {
        self.solver.config_mut()
    }

    fn position_of(&self, body: &Id) -> Option<usize> {
        self.joints.iter().position(|joint| joint.body() == body)
    }

    /// Detaches every joint and the effector from whatever they hang below
    fn tear_down(&mut self) -> Result<(), ChainError> {
        for joint in &self.joints {
            self.hierarchy.set_parent_keep_world_pose(joint.base(), None)?;
        }
        if let Some((_, node)) = &self.effector {
            self.hierarchy.set_parent_keep_world_pose(*node, None)?;
        }
        Ok(())
    }

    fn wire<T, M>(&mut self, tree: &T, mounting: &M, order: &ResolvedOrder<Id>) -> Result<(), ChainError>
    where
        T: BodyTree<BodyId = Id>,
        M: MountingSide<Id>,
    {
        let effector = self.effector_node().ok_or(ChainError::NoEffector)?;
        let positions = order
            .joints()
            .iter()
            .map(|body| {
                self.position_of(body)
                    .ok_or_else(|| ChainError::InvariantViolation(format!("No joint on resolved body {body:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.tear_down()?;

        // Moving nodes get their final rotation while nothing hangs below them yet
        for &index in &positions {
            let joint = &mut self.joints[index];
            let parent_side = tree
                .parent_of(joint.body())
                .map(|parent| mounting.parent_side(joint.body(), &parent));
            joint.set_inverted(is_inverted(order.relation(), parent_side));
            joint.update_axis(&mut self.hierarchy)?;
        }
        for (&nearer, &further) in positions.iter().tuple_windows() {
            let parent = self.joints[further].moving();
            self.hierarchy
                .set_parent_keep_world_pose(self.joints[nearer].base(), Some(parent))?;
        }

        let nearest = positions
            .first()
            .map(|&index| self.joints[index].moving())
            .ok_or(ChainError::NoJoints)?;
        self.hierarchy.set_parent_keep_world_pose(effector, Some(nearest))?;
        Ok(())
    }
}

impl<Id, A> Default for ChainTracker<Id, A>
where
    Id: Eq + Hash + Clone + Debug,
    A: Actuator,
{
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

/// The joints of `order`, nearest to the effector first
fn ordered<'a, Id, A>(
    joints: &'a mut [KinematicJoint<Id, A>],
    order: &ResolvedOrder<Id>,
) -> Result<Vec<&'a mut KinematicJoint<Id, A>>, ChainError>
where
    Id: PartialEq + Debug,
    A: Actuator,
{
    let mut slots = (0..order.len()).map(|_| None).collect_vec();
    for joint in joints.iter_mut() {
        if let Some(position) = order.joints().iter().position(|body| body == joint.body()) {
            slots[position] = Some(joint);
        }
    }
    slots
        .into_iter()
        .zip(order.joints())
        .map(|(slot, body)| {
            slot.ok_or_else(|| ChainError::InvariantViolation(format!("Resolved joint {body:?} is missing")))
        })
        .collect()
}
