//! Interface and implementor of the inverse kinematic model: cyclic coordinate descent (CCD).

use crate::actuator::Actuator;
use crate::errors::HierarchyError;
use crate::joint::KinematicJoint;
use crate::pose::Pose;
use crate::transform::{TransformHierarchy, TransformIndex};
use tracing::trace;

/// Trait representing a stateful inverse kinematics algorithm working on an ordered chain.
pub trait Inverse<Id, A>
where
    A: Actuator,
{
    /// The return type of [Inverse::solve] that carries information about the outcome
    type Info;

    /// Moves the `joints` (nearest to the effector first) so that the effector approaches `target`.
    fn solve(
        &mut self,
        hierarchy: &mut TransformHierarchy,
        joints: &mut [&mut KinematicJoint<Id, A>],
        effector: TransformIndex,
        target: &Pose,
    ) -> Result<Self::Info, HierarchyError>;
}

/// Parameters of the [CcdSolver]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Maximal number of passes over the chain per call. At least one pass always runs.
    pub iterations: usize,
    /// Distance between effector and target below which no further pass is started
    pub tolerance: f64,
}

impl SolverConfig {
    pub fn new(iterations: usize, tolerance: f64) -> Self {
        Self { iterations, tolerance }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Default for SolverConfig {
    /// One pass per tick. The tracking loop converges over consecutive ticks.
    fn default() -> Self {
        Self {
            iterations: 1,
            tolerance: 1e-4,
        }
    }
}

/// Information about the solution of the [CcdSolver]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    /// Number of passes over the chain
    pub iteration_count: usize,
    /// Remaining distance between effector and target position
    pub distance: f64,
}

/// Cyclic coordinate descent: each joint in turn, starting next to the effector, rotates so that
/// the effector gets closer to the target, within the joint's axis and soft limits.
#[derive(Debug, Clone, Default)]
pub struct CcdSolver {
    config: SolverConfig,
}

impl CcdSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }
}

impl<Id, A> Inverse<Id, A> for CcdSolver
where
    A: Actuator,
{
    type Info = StepInfo;

    fn solve(
        &mut self,
        hierarchy: &mut TransformHierarchy,
        joints: &mut [&mut KinematicJoint<Id, A>],
        effector: TransformIndex,
        target: &Pose,
    ) -> Result<Self::Info, HierarchyError> {
        let mut counter = 0;
        let mut distance;
        loop {
            step(joints, hierarchy, effector, target)?;
            counter += 1;
            distance = (hierarchy.position(effector)? - target.position).norm();
            if distance <= self.config.tolerance || counter >= self.config.iterations {
                break;
            }
        }
        trace!("{counter} passes, remaining distance {distance:.6}");

        Ok(StepInfo {
            iteration_count: counter,
            distance,
        })
    }
}

/// A single pass over the ordered `joints`, nearest to the effector first.
pub fn step<Id, A>(
    joints: &mut [&mut KinematicJoint<Id, A>],
    hierarchy: &mut TransformHierarchy,
    effector: TransformIndex,
    target: &Pose,
) -> Result<(), HierarchyError>
where
    A: Actuator,
{
    for (position, joint) in joints.iter_mut().enumerate() {
        let angle = joint.evaluate(hierarchy, effector, target)?;
        trace!("Joint {position} at {angle:.3}°");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Servo;
    use approx::assert_abs_diff_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    /// Two joints turning about z, one unit apart, with the effector one more unit along x
    fn two_link_arm() -> (TransformHierarchy, Vec<KinematicJoint<usize, Servo>>, TransformIndex) {
        let mut hierarchy = TransformHierarchy::new();
        let shoulder = KinematicJoint::new(0, Servo::new(Pose::identity(), Vector3::z()), &mut hierarchy).unwrap();
        let elbow = KinematicJoint::new(
            1,
            Servo::new(Pose::from_position(Vector3::x()), Vector3::z()),
            &mut hierarchy,
        )
        .unwrap();
        hierarchy
            .set_parent_keep_world_pose(elbow.base(), Some(shoulder.moving()))
            .unwrap();
        let effector = hierarchy.insert(Vector3::new(2.0, 0.0, 0.0), UnitQuaternion::identity());
        hierarchy
            .set_parent_keep_world_pose(effector, Some(elbow.moving()))
            .unwrap();
        // nearest to the effector first
        (hierarchy, vec![elbow, shoulder], effector)
    }

    #[test]
    fn test_config() {
        let config = SolverConfig::default();
        assert_eq!(config.iterations, 1);
        assert_eq!(config.tolerance, 1e-4);

        let config = config.with_iterations(10).with_tolerance(0.5);
        assert_eq!(config, SolverConfig::new(10, 0.5));
    }

    #[test_log::test]
    fn test_single_pass_by_default() {
        let (mut hierarchy, mut joints, effector) = two_link_arm();
        let mut joints = joints.iter_mut().collect::<Vec<_>>();
        let target = Pose::from_position(Vector3::new(1.0, 1.0, 0.0));

        let mut solver = CcdSolver::default();
        let info = solver.solve(&mut hierarchy, &mut joints, effector, &target).unwrap();

        assert_eq!(info.iteration_count, 1);
        assert!(info.distance < 2.0_f64.sqrt());
    }

    #[test_log::test]
    fn test_converges() {
        let (mut hierarchy, mut joints, effector) = two_link_arm();
        let mut joints = joints.iter_mut().collect::<Vec<_>>();
        let target = Pose::from_position(Vector3::new(1.0, 1.0, 0.0));

        let mut solver = CcdSolver::new(SolverConfig::new(200, 1e-6));
        let info = solver.solve(&mut hierarchy, &mut joints, effector, &target).unwrap();

        assert!(info.iteration_count < 200);
        assert!(info.distance <= 1e-6);
        assert_abs_diff_eq!(hierarchy.position(effector).unwrap(), target.position, epsilon = 1e-6);
    }

    #[test]
    fn test_target_at_effector() {
        let (mut hierarchy, mut joints, effector) = two_link_arm();
        let mut joints = joints.iter_mut().collect::<Vec<_>>();
        let target = Pose::from_position(Vector3::new(2.0, 0.0, 0.0));

        step(&mut joints, &mut hierarchy, effector, &target).unwrap();

        for joint in joints {
            assert_abs_diff_eq!(joint.actuator().angle(), 0.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(hierarchy.position(effector).unwrap(), target.position, epsilon = 1e-12);
    }
}
