/*! The capability the solver needs from a servo, and a plain in-memory servo implementing it */

use crate::pose::Pose;
use nalgebra::Vector3;

/// A single-axis rotational actuator as seen by the solver.
///
/// The host decides how the values are stored (struct fields, RPC, shared memory ...).
/// All angles are in degrees.
pub trait Actuator {
    /// Currently reported angle
    fn angle(&self) -> f64;

    /// Commands a new target angle
    fn set_angle(&mut self, degrees: f64);

    /// Soft limits `(min, max)` enforced by clamping
    fn soft_limits(&self) -> (f64, f64);

    /// Rotation axis in the actuator's local frame (not necessarily normalized)
    fn main_axis(&self) -> Vector3<f64>;

    /// World pose of the frame the actuator is mounted on (its base housing)
    fn mounting_pose(&self) -> Pose;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn angle(&self) -> f64 {
        (**self).angle()
    }

    fn set_angle(&mut self, degrees: f64) {
        (**self).set_angle(degrees)
    }

    fn soft_limits(&self) -> (f64, f64) {
        (**self).soft_limits()
    }

    fn main_axis(&self) -> Vector3<f64> {
        (**self).main_axis()
    }

    fn mounting_pose(&self) -> Pose {
        (**self).mounting_pose()
    }
}

/// Servo whose state is simply stored in fields. Useful for tests and offline planning.
#[derive(Debug, Clone, PartialEq)]
pub struct Servo {
    angle: f64,
    soft_min: f64,
    soft_max: f64,
    axis: Vector3<f64>,
    mounting: Pose,
}

impl Servo {
    /// Servo at angle 0 without effective limits
    pub fn new(mounting: Pose, axis: Vector3<f64>) -> Self {
        Self {
            angle: 0.0,
            soft_min: -180.0,
            soft_max: 180.0,
            axis,
            mounting,
        }
    }

    pub fn with_angle(mut self, degrees: f64) -> Self {
        self.angle = degrees;
        self
    }

    pub fn with_limits(mut self, soft_min: f64, soft_max: f64) -> Self {
        self.soft_min = soft_min;
        self.soft_max = soft_max;
        self
    }

    /// Moves the servo as if the vehicle carrying it had moved
    pub fn set_mounting_pose(&mut self, mounting: Pose) {
        self.mounting = mounting;
    }
}

impl Actuator for Servo {
    fn angle(&self) -> f64 {
        self.angle
    }

    fn set_angle(&mut self, degrees: f64) {
        self.angle = degrees;
    }

    fn soft_limits(&self) -> (f64, f64) {
        (self.soft_min, self.soft_max)
    }

    fn main_axis(&self) -> Vector3<f64> {
        self.axis
    }

    fn mounting_pose(&self) -> Pose {
        self.mounting
    }
}
