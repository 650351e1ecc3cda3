//! Poses and the handful of rotation helpers the solver is built from.
//!
//! All angles handed in and out of this crate are in **degrees**. Rotations are unit quaternions
//! and get renormalized after every composition (see [compose]).

use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Angular limits are clamped into `(-ANGLE_LIMIT, ANGLE_LIMIT)` so that the signed angle
/// measurement never has to decide between +180° and -180°.
pub const ANGLE_LIMIT: f64 = 179.99;

/// Vectors shorter than this are treated as having no direction.
pub(crate) const DIRECTION_EPSILON: f64 = 1e-12;

/// A position and a rotation, usually in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Pose at the origin without rotation
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// The pose's local +Y axis in world coordinates.
    pub fn up(&self) -> Vector3<f64> {
        self.rotation * Vector3::y()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rotation of `degrees` around `axis` (which does not need to be normalized).
pub fn axis_angle(axis: &Vector3<f64>, degrees: f64) -> UnitQuaternion<f64> {
    match Unit::try_new(*axis, DIRECTION_EPSILON) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, degrees.to_radians()),
        None => UnitQuaternion::identity(),
    }
}

/// Concatenates two rotations (`first * second`) and renormalizes the result against drift.
pub fn compose(first: &UnitQuaternion<f64>, second: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(first.quaternion() * second.quaternion())
}

/// Shortest rotation that maps the direction of `from` onto the direction of `to`.
///
/// Degenerate (zero-length) inputs yield the identity. Opposite directions yield a half turn
/// about an arbitrary axis perpendicular to `from`.
pub fn from_to_rotation(from: &Vector3<f64>, to: &Vector3<f64>) -> UnitQuaternion<f64> {
    if from.norm_squared() < DIRECTION_EPSILON || to.norm_squared() < DIRECTION_EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::rotation_between(from, to).unwrap_or_else(|| {
        UnitQuaternion::from_axis_angle(&Unit::new_normalize(perpendicular(from)), PI)
    })
}

/// A unit vector perpendicular to `axis`. Deterministic: the result only depends on `axis`.
///
/// The cross product is taken with the basis vector along which `axis` has its smallest
/// component, which keeps the result well conditioned.
pub fn perpendicular(axis: &Vector3<f64>) -> Vector3<f64> {
    let abs = axis.abs();
    let basis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    axis.cross(&basis)
        .try_normalize(DIRECTION_EPSILON)
        .unwrap_or_else(Vector3::x)
}

/// Signed angle in degrees from `from` to `to`, measured about `axis` with the right-hand rule.
///
/// Both vectors are projected onto the plane perpendicular to `axis` first, the result is in
/// `[-180, 180]`.
pub fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let Some(axis) = axis.try_normalize(DIRECTION_EPSILON) else {
        return 0.0;
    };
    let from = from - axis * axis.dot(from);
    let to = to - axis * axis.dot(to);
    axis.dot(&from.cross(&to)).atan2(from.dot(&to)).to_degrees()
}

/// Clamp range of a joint given its soft limits.
pub fn limit_range(soft_min: f64, soft_max: f64) -> (f64, f64) {
    (soft_min.max(-ANGLE_LIMIT), soft_max.min(ANGLE_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_signed_angle() {
        let z = Vector3::z();
        assert_abs_diff_eq!(signed_angle(&Vector3::x(), &Vector3::y(), &z), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle(&Vector3::y(), &Vector3::x(), &z), -90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle(&Vector3::x(), &Vector3::y(), &-z), -90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signed_angle(&Vector3::x(), &Vector3::x(), &z), 0.0, epsilon = 1e-9);

        // components along the axis do not matter
        let tilted = Vector3::new(0.0, 1.0, 5.0);
        assert_abs_diff_eq!(signed_angle(&Vector3::x(), &tilted, &z), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_axis_angle_matches_signed_angle() {
        let axis = Vector3::new(1.0, 2.0, -0.5).normalize();
        let reference = perpendicular(&axis);
        for degrees in [-170.0, -45.0, 0.0, 12.5, 90.0, 179.0] {
            let rotated = axis_angle(&axis, degrees) * reference;
            assert_abs_diff_eq!(signed_angle(&reference, &rotated, &axis), degrees, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_from_to_rotation() {
        let from = Vector3::new(1.0, 0.0, 0.0);
        let to = Vector3::new(0.0, 3.0, 0.0);
        let rotation = from_to_rotation(&from, &to);
        assert_abs_diff_eq!(rotation * from, Vector3::y(), epsilon = 1e-12);

        // opposite directions still produce a valid half turn
        let rotation = from_to_rotation(&from, &-from);
        assert_abs_diff_eq!(rotation * from, -from, epsilon = 1e-12);

        assert_eq!(from_to_rotation(&Vector3::zeros(), &to), UnitQuaternion::identity());
    }

    #[test]
    fn test_perpendicular() {
        for axis in [Vector3::x(), Vector3::y(), Vector3::z(), Vector3::new(0.3, -0.2, 0.9)] {
            let perp = perpendicular(&axis);
            assert_abs_diff_eq!(perp.norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(perp.dot(&axis), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_limit_range() {
        assert_eq!(limit_range(-270.0, 300.0), (-ANGLE_LIMIT, ANGLE_LIMIT));
        assert_eq!(limit_range(-30.0, 45.0), (-30.0, 45.0));
    }
}
