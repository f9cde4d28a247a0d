//! Body pose representation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A body pose: translation plus unit-quaternion rotation of the body frame
/// relative to the stance frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation of the body frame origin.
    pub position: Vector3<f64>,

    /// Rotation of the body frame.
    pub rotation: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// The identity pose (no translation, no rotation).
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Build a pose from a translation and intrinsic roll/pitch/yaw angles.
    pub fn from_euler(position: Vector3<f64>, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    /// Transform a vector from the body frame into the stance frame.
    pub fn transform_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * v + self.position
    }

    /// Transform a vector from the stance frame into the body frame.
    ///
    /// This is the transform applied to walker tip positions: posing the body
    /// moves the feet the opposite way in the body frame.
    pub fn inverse_transform_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * (v - self.position)
    }

    /// Intrinsic (roll, pitch, yaw) of the rotation component.
    pub fn euler_angles(&self) -> (f64, f64, f64) {
        self.rotation.euler_angles()
    }

    /// Interpolate between this pose and a target, `t` in `[0, 1]`.
    pub fn interpolate(&self, target: &Pose, t: f64) -> Pose {
        let t = util::maths::clamp(t, 0.0, 1.0);
        Pose {
            position: self.position.lerp(&target.position, t),
            rotation: self.rotation.slerp(&target.rotation, t),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transform_round_trip() {
        let pose = Pose::from_euler(Vector3::new(0.01, -0.02, 0.03), 0.1, -0.05, 0.2);
        let v = Vector3::new(0.2, -0.1, -0.15);

        let there = pose.transform_vector(&v);
        let back = pose.inverse_transform_vector(&there);

        assert!((back - v).norm() < 1e-12);
    }

    #[test]
    fn test_identity_is_noop() {
        let pose = Pose::identity();
        let v = Vector3::new(0.3, 0.2, -0.1);
        assert_eq!(pose.transform_vector(&v), v);
        assert_eq!(pose.inverse_transform_vector(&v), v);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = Pose::identity();
        let b = Pose::from_euler(Vector3::new(0.0, 0.0, 0.02), 0.0, 0.0, 0.5);

        let at_a = a.interpolate(&b, 0.0);
        let at_b = a.interpolate(&b, 1.0);

        assert!((at_a.position - a.position).norm() < 1e-12);
        assert!((at_b.position - b.position).norm() < 1e-12);
        assert!(at_b.rotation.angle_to(&b.rotation) < 1e-12);
    }
}
