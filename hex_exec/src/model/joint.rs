//! Joint and link state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::params::{JointParams, LinkParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single actuated joint of a leg.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Fully qualified joint name, `{leg}_{joint}` (e.g. "AR_coxa"). This is
    /// the key used on the sensor and actuator buses.
    pub name: String,

    /// Measured position, with `position_offset` already removed.
    pub current_position: f64,

    /// Measured velocity, if the sensor bus reports one.
    pub current_velocity: f64,

    /// Measured effort, if the sensor bus reports one.
    pub current_effort: f64,

    /// Position demand produced by IK.
    pub desired_position: f64,

    /// Position demand of the previous tick.
    pub prev_desired_position: f64,

    /// Velocity demand derived from consecutive position demands.
    pub desired_velocity: f64,

    /// Offset subtracted from measured positions.
    pub position_offset: f64,

    /// Position when the leg is packed for transport.
    pub packed_position: f64,

    /// Position when the leg is unpacked.
    pub unpacked_position: f64,

    /// Minimum allowed position.
    pub min_position: f64,

    /// Maximum allowed position.
    pub max_position: f64,

    /// Maximum allowed angular speed.
    pub max_angular_speed: f64,

    /// True once a measurement has been assigned to `current_position`.
    pub position_initialised: bool,
}

/// A rigid link of a leg.
#[derive(Debug, Clone)]
pub struct Link {
    pub id_name: String,
    pub length: f64,
    pub mass: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Joint {
    /// Build a joint from its parameter block.
    pub fn from_params(leg_name: &str, params: &JointParams) -> Self {
        Self {
            name: format!("{}_{}", leg_name, params.id_name),
            current_position: 0.0,
            current_velocity: 0.0,
            current_effort: 0.0,
            desired_position: 0.0,
            prev_desired_position: 0.0,
            desired_velocity: 0.0,
            position_offset: params.position_offset,
            packed_position: params.packed_position,
            unpacked_position: params.unpacked_position,
            min_position: params.min_position,
            max_position: params.max_position,
            max_angular_speed: params.max_angular_speed,
            position_initialised: false,
        }
    }

    /// Derive the velocity demand from the last two position demands,
    /// clamping it (and re-deriving the position demand) when it exceeds
    /// `max_angular_speed`.
    ///
    /// Returns true if the clamp engaged.
    pub fn update_desired_velocity(&mut self, time_delta: f64, clamp_velocity: bool) -> bool {
        self.desired_velocity = (self.desired_position - self.prev_desired_position) / time_delta;

        let mut clamped = false;
        if clamp_velocity && self.desired_velocity.abs() > self.max_angular_speed {
            self.desired_velocity = self.desired_velocity.signum() * self.max_angular_speed;
            self.desired_position = self.prev_desired_position + self.desired_velocity * time_delta;
            clamped = true;
        }

        self.prev_desired_position = self.desired_position;
        clamped
    }
}

impl Link {
    pub fn from_params(params: &LinkParams) -> Self {
        Self {
            id_name: params.id_name.clone(),
            length: params.length,
            mass: params.mass,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_joint() -> Joint {
        Joint::from_params(
            "AR",
            &JointParams {
                id_name: "coxa".into(),
                position_offset: 0.0,
                packed_position: 0.0,
                unpacked_position: 0.0,
                min_position: -0.8,
                max_position: 0.8,
                max_angular_speed: 2.0,
            },
        )
    }

    #[test]
    fn test_desired_velocity_derivation() {
        let mut joint = test_joint();
        joint.prev_desired_position = 0.0;
        joint.desired_position = 0.02;

        let clamped = joint.update_desired_velocity(0.02, true);

        assert!(!clamped);
        assert!((joint.desired_velocity - 1.0).abs() < 1e-12);
        assert_eq!(joint.prev_desired_position, 0.02);
    }

    #[test]
    fn test_desired_velocity_clamp_rederives_position() {
        let mut joint = test_joint();
        joint.prev_desired_position = 0.0;
        joint.desired_position = 0.1; // 5 rad/s over 0.02 s, above the 2 rad/s limit

        let clamped = joint.update_desired_velocity(0.02, true);

        assert!(clamped);
        assert!((joint.desired_velocity - 2.0).abs() < 1e-12);
        assert!((joint.desired_position - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_desired_velocity_unclamped_when_disabled() {
        let mut joint = test_joint();
        joint.prev_desired_position = 0.0;
        joint.desired_position = 0.1;

        let clamped = joint.update_desired_velocity(0.02, false);

        assert!(!clamped);
        assert!((joint.desired_velocity - 5.0).abs() < 1e-12);
        assert_eq!(joint.desired_position, 0.1);
    }
}
