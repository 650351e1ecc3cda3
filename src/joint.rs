//! A servo as a link of a kinematic chain.
//!
//! Each [KinematicJoint] owns two nodes in a [TransformHierarchy]: the *base* node sits at the
//! actuator's mounting frame and the *moving* node is its child, rotated about the hinge axis.
//! Everything further down the chain (the next joint's base node or the effector) hangs below the
//! moving node.

use crate::actuator::Actuator;
use crate::errors::HierarchyError;
use crate::pose::{
    axis_angle, compose, from_to_rotation, limit_range, perpendicular, signed_angle, Pose, DIRECTION_EPSILON,
};
use crate::transform::{TransformHierarchy, TransformIndex};
use nalgebra::Vector3;
use tracing::{trace, warn};

/// One hinge joint of the chain driven by an [Actuator].
///
/// The angle measured about [KinematicJoint::axis] is always the actuator's angle. For an
/// inverted joint the axis is the negated main axis of the actuator, which also mirrors the
/// direction the soft limits apply in.
#[derive(Debug)]
pub struct KinematicJoint<Id, A> {
    body: Id,
    actuator: A,
    base: TransformIndex,
    moving: TransformIndex,
    axis: Vector3<f64>,
    /// Reference direction perpendicular to `axis` the angle is measured from
    perpendicular: Vector3<f64>,
    rotate_to_direction: bool,
    is_inverted: bool,
}

impl<Id, A> KinematicJoint<Id, A>
where
    A: Actuator,
{
    /// Creates the joint's base node at the actuator's mounting frame and its moving node
    /// rotated to the actuator's current angle.
    pub fn new(body: Id, actuator: A, hierarchy: &mut TransformHierarchy) -> Result<Self, HierarchyError> {
        let mounting = actuator.mounting_pose();
        let (axis, perpendicular) = hinge(&actuator, false);
        let base = hierarchy.insert(mounting.position, mounting.rotation);
        let moving = hierarchy.insert_child(base, Vector3::zeros(), axis_angle(&axis, actuator.angle()))?;
        Ok(Self {
            body,
            actuator,
            base,
            moving,
            axis,
            perpendicular,
            rotate_to_direction: false,
            is_inverted: false,
        })
    }

    pub fn body(&self) -> &Id {
        &self.body
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn base(&self) -> TransformIndex {
        self.base
    }

    pub fn moving(&self) -> TransformIndex {
        self.moving
    }

    /// Hinge axis in the base frame, sign flipped for inverted joints
    pub fn axis(&self) -> Vector3<f64> {
        self.axis
    }

    pub fn perpendicular(&self) -> Vector3<f64> {
        self.perpendicular
    }

    pub fn is_inverted(&self) -> bool {
        self.is_inverted
    }

    /// Call [KinematicJoint::update_axis] afterwards.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.is_inverted = inverted;
    }

    pub fn rotate_to_direction(&self) -> bool {
        self.rotate_to_direction
    }

    /// Orientation-matching (`true`) instead of pointing toward the target position
    pub fn set_rotate_to_direction(&mut self, rotate_to_direction: bool) {
        self.rotate_to_direction = rotate_to_direction;
    }

    /// Angle of the moving node about the axis, in degrees
    pub fn angle(&self, hierarchy: &TransformHierarchy) -> Result<f64, HierarchyError> {
        let local = hierarchy.local_rotation(self.moving)?;
        Ok(signed_angle(&self.perpendicular, &(local * self.perpendicular), &self.axis))
    }

    /// Re-reads the main axis (flipped if inverted) and puts the moving node back onto the
    /// actuator's angle about the new axis.
    pub fn update_axis(&mut self, hierarchy: &mut TransformHierarchy) -> Result<(), HierarchyError> {
        (self.axis, self.perpendicular) = hinge(&self.actuator, self.is_inverted);
        hierarchy.set_local_rotation(self.moving, axis_angle(&self.axis, self.actuator.angle()))
    }

    /// Freely rotates the moving node toward the target (position mode) or so that the effector's
    /// up axis faces the target's up axis (orientation mode).
    pub fn update_direction(
        &mut self,
        hierarchy: &mut TransformHierarchy,
        effector: TransformIndex,
        target: &Pose,
    ) -> Result<(), HierarchyError> {
        let correction = if self.rotate_to_direction {
            let effector_up = hierarchy.rotation(effector)? * Vector3::y();
            from_to_rotation(&effector_up, &-target.up())
        } else {
            let base = hierarchy.position(self.base)?;
            let to_effector = hierarchy.position(effector)? - base;
            let to_target = target.position - base;
            from_to_rotation(&to_effector, &to_target)
        };
        let rotation = hierarchy.rotation(self.moving)?;
        hierarchy.set_rotation(self.moving, compose(&correction, &rotation))
    }

    /// Removes any rotation component that is not about the hinge axis.
    pub fn constrain_to_axis(&mut self, hierarchy: &mut TransformHierarchy) -> Result<(), HierarchyError> {
        let rotation = hierarchy.rotation(self.moving)?;
        let moving_axis = rotation * self.axis;
        let base_axis = hierarchy.rotation(self.base)? * self.axis;
        let correction = from_to_rotation(&moving_axis, &base_axis);
        hierarchy.set_rotation(self.moving, compose(&correction, &rotation))
    }

    /// Clamps the angle into the soft limits and commands the actuator. Returns the angle.
    ///
    /// The moving node is only touched if the angle was out of range.
    pub fn constrain_to_min_max_angle(&mut self, hierarchy: &mut TransformHierarchy) -> Result<f64, HierarchyError> {
        let angle = self.angle(hierarchy)?;
        let (soft_min, soft_max) = self.actuator.soft_limits();
        let (min, max) = limit_range(soft_min, soft_max);
        let clamped = angle.max(min).min(max);
        if clamped != angle {
            trace!("Clamping {angle:.3}° into [{min}, {max}]");
            hierarchy.set_local_rotation(self.moving, axis_angle(&self.axis, clamped))?;
        }
        self.actuator.set_angle(clamped);
        Ok(clamped)
    }

    /// One CCD update of this joint. The order of the three steps matters.
    pub fn evaluate(
        &mut self,
        hierarchy: &mut TransformHierarchy,
        effector: TransformIndex,
        target: &Pose,
    ) -> Result<f64, HierarchyError> {
        self.update_direction(hierarchy, effector, target)?;
        self.constrain_to_axis(hierarchy)?;
        self.constrain_to_min_max_angle(hierarchy)
    }

    /// Moves the base node to `frame` and the moving node to the actuator's reported angle,
    /// e.g. after the vehicle has moved on its own.
    pub fn sync_with_actuator_frame(
        &mut self,
        hierarchy: &mut TransformHierarchy,
        frame: &Pose,
    ) -> Result<(), HierarchyError> {
        hierarchy.set_pos_and_rot(self.base, frame.position, frame.rotation)?;
        hierarchy.set_local_rotation(self.moving, axis_angle(&self.axis, self.actuator.angle()))
    }

    /// [KinematicJoint::sync_with_actuator_frame] with the frame reported by the actuator
    pub fn sync_with_actuator(&mut self, hierarchy: &mut TransformHierarchy) -> Result<(), HierarchyError> {
        let frame = self.actuator.mounting_pose();
        self.sync_with_actuator_frame(hierarchy, &frame)
    }

    /// Removes the joint's nodes from the hierarchy and hands back the actuator.
    /// Whatever hung below the joint becomes a root, keeping its world pose.
    pub fn detach(self, hierarchy: &mut TransformHierarchy) -> Result<A, HierarchyError> {
        hierarchy.remove(self.moving)?;
        hierarchy.remove(self.base)?;
        Ok(self.actuator)
    }
}

/// Normalized hinge axis and its perpendicular reference
fn hinge<A: Actuator>(actuator: &A, inverted: bool) -> (Vector3<f64>, Vector3<f64>) {
    let axis = actuator.main_axis().try_normalize(DIRECTION_EPSILON).unwrap_or_else(|| {
        warn!("Actuator reports a degenerate main axis, falling back to +Y");
        Vector3::y()
    });
    let axis = if inverted { -axis } else { axis };
    (axis, perpendicular(&axis))
}
